//! Category description and table DDL.

use serde::{Deserialize, Serialize};

use crate::error::{VectorError, VectorResult};
use crate::vector::VectorDimension;

/// Prefix prepended to category names to form table names.
pub const DEFAULT_TABLE_PREFIX: &str = "vectors_";

/// Registry of category tables and the dimension each was created with.
pub const CATEGORY_TABLE: &str = "embedstore_categories";

/// Storage engine of a category table.
///
/// SQLite has no pluggable engines; the choice is between an ordinary rowid
/// table and a `STRICT` table that enforces column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableEngine {
    #[default]
    Rowid,
    Strict,
}

impl std::fmt::Display for TableEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rowid => f.write_str("rowid"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

/// Everything needed to address and create one category's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub dimension: VectorDimension,
    pub engine: TableEngine,
    pub table_prefix: String,
    pub table_suffix: String,
}

impl CategorySpec {
    /// A category with the default engine and table prefix.
    pub fn new(name: impl Into<String>, dimension: VectorDimension) -> Self {
        Self {
            name: name.into(),
            dimension,
            engine: TableEngine::default(),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            table_suffix: String::new(),
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: TableEngine) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: VectorDimension) -> Self {
        self.dimension = dimension;
        self
    }

    #[must_use]
    pub fn with_table_fixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self.table_suffix = suffix.into();
        self
    }

    /// Same settings under another category name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Physical table name, `prefix + name + suffix`.
    ///
    /// Fails with [`VectorError::InvalidState`] unless the result is a plain
    /// identifier, since it is interpolated into DDL.
    pub fn table_name(&self) -> VectorResult<String> {
        if self.name.is_empty() {
            return Err(VectorError::InvalidState(
                "category name cannot be empty".to_string(),
            ));
        }
        let table = format!("{}{}{}", self.table_prefix, self.name, self.table_suffix);
        validate_identifier(&table)?;
        Ok(table)
    }
}

/// Accepts `[A-Za-z0-9_]+`.
pub fn validate_identifier(ident: &str) -> VectorResult<()> {
    let valid = !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(VectorError::InvalidState(format!(
            "'{ident}' is not a valid table identifier (allowed: letters, digits, underscore)"
        )));
    }
    Ok(())
}

pub(crate) fn index_name(table: &str) -> String {
    format!("idx_{table}_binary_code")
}

pub(crate) fn create_category_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{CATEGORY_TABLE}\" (
            table_name TEXT PRIMARY KEY,
            dimension INTEGER NOT NULL,
            engine TEXT NOT NULL,
            created INTEGER NOT NULL
        )"
    )
}

/// Record table DDL. Rows whose code or vectors do not have `dimension`
/// components are rejected by a `CHECK` constraint.
pub(crate) fn create_table_sql(
    table: &str,
    dimension: VectorDimension,
    engine: TableEngine,
    if_not_exists: bool,
) -> String {
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    let options = match engine {
        TableEngine::Rowid => "",
        TableEngine::Strict => " STRICT",
    };
    let d = dimension.get();
    let code_bytes = dimension.code_bytes();

    format!(
        "CREATE TABLE {guard}\"{table}\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vector TEXT NOT NULL,
            normalized_vector TEXT NOT NULL,
            magnitude REAL NOT NULL,
            binary_code BLOB NOT NULL,
            model_tag TEXT,
            created INTEGER NOT NULL,
            CHECK (
                length(binary_code) = {code_bytes}
                AND json_array_length(vector) = {d}
                AND json_array_length(normalized_vector) = {d}
            )
        ){options}"
    )
}

pub(crate) fn create_index_sql(table: &str, if_not_exists: bool) -> String {
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    let index = index_name(table);
    format!("CREATE INDEX {guard}\"{index}\" ON \"{table}\" (binary_code)")
}

pub(crate) fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS \"{table}\"")
}
