//! Configuration module for the embedding store.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `ES_` and use double underscores
//! to separate nested levels:
//! - `ES_DATABASE__BUSY_TIMEOUT_MS=10000` sets `database.busy_timeout_ms`
//! - `ES_CATEGORY__NAME=articles` sets `category.name`
//! - `ES_SEARCH__SCORING=client` sets `search.scoring`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::store::{ScoringSite, TableEngine};

/// Directory holding the settings file and, by default, the database.
pub const CONFIG_DIR: &str = ".embedstore";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Log level used when `debug` is off (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// SQLite connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Default category
    #[serde(default)]
    pub category: CategoryConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// How long a statement waits on a locked database, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// SQLite journal mode (WAL, DELETE, TRUNCATE, MEMORY, ...)
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CategoryConfig {
    /// Category name, part of the physical table name
    #[serde(default = "default_category_name")]
    pub name: String,

    /// Override of the embedder's dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,

    /// Table engine: "rowid" or "strict"
    #[serde(default)]
    pub engine: TableEngine,

    /// Prepended to the category name to form the table name
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Appended to the category name to form the table name
    #[serde(default)]
    pub table_suffix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded models are cached (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Longest chunk, in characters, handed to the model
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_false")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Result count used when the caller does not pass one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Similarity at or above which a stored text counts as a duplicate
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,

    /// Where the exact rerank is evaluated: "database" or "client"
    #[serde(default)]
    pub scoring: ScoringSite,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_database_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("vectors.db")
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_journal_mode() -> String {
    "WAL".to_string()
}
fn default_category_name() -> String {
    "general".to_string()
}
fn default_table_prefix() -> String {
    crate::store::DEFAULT_TABLE_PREFIX.to_string()
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_max_input_length() -> usize {
    crate::vector::DEFAULT_MAX_INPUT_LENGTH
}
fn default_limit() -> usize {
    crate::semantic::DEFAULT_SEARCH_LIMIT
}
fn default_duplicate_threshold() -> f32 {
    crate::semantic::thresholds::DUPLICATE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            log_level: default_log_level(),
            database: DatabaseConfig::default(),
            category: CategoryConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
        }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            name: default_category_name(),
            dimension: None,
            engine: TableEngine::default(),
            table_prefix: default_table_prefix(),
            table_suffix: String::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            max_input_length: default_max_input_length(),
            show_download_progress: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            duplicate_threshold: default_duplicate_threshold(),
            scoring: ScoringSite::default(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace config by looking for .embedstore directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Layer in environment variables with ES_ prefix
            // Use double underscore (__) to separate nested levels
            // Single underscore (_) remains as is within field names
            .merge(Env::prefixed("ES_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a .embedstore directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    /// Create a default settings file with helpful comments under `root`
    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# embedstore configuration file

# Version of the configuration schema
version = 1

# Global debug mode (forces debug-level logging)
debug = false

# Log level when debug is off: error, warn, info, debug, trace
log_level = "info"

[database]
# SQLite database file (relative to the working directory)
path = ".embedstore/vectors.db"

# How long a statement waits on a locked database, in milliseconds
busy_timeout_ms = 5000

# SQLite journal mode
journal_mode = "WAL"

[category]
# Default category; the table is named <table_prefix><name><table_suffix>
name = "general"

# Table engine: "rowid" (default) or "strict"
engine = "rowid"

table_prefix = "vectors_"
table_suffix = ""

# Override the embedder's dimension (must match the model)
# dimension = 384

[embedding]
# Model to use for embeddings
# Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15,
# BGELargeENV15, MxbaiEmbedLargeV1, MultilingualE5Small, NomicEmbedTextV15
model = "AllMiniLML6V2"

# Longest chunk, in characters, handed to the model; longer words are split
max_input_length = 512

# Show a progress bar while the model downloads
show_download_progress = false

# Where downloaded models are cached (defaults to the user cache directory)
# cache_dir = "/path/to/models"

[search]
# Number of results when no limit is given
default_limit = 10

# Similarity at or above which store() returns the existing id (0.0 to 1.0)
duplicate_threshold = 0.999

# Where the exact rerank runs: "database" (SQL function) or "client"
scoring = "database"
"#;

        std::fs::write(&config_path, template)?;

        if force {
            info!(path = %config_path.display(), "overwrote configuration");
        } else {
            info!(path = %config_path.display(), "created default configuration");
        }

        Ok(config_path)
    }
}
