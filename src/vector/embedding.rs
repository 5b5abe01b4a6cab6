//! Embedding generation for the vector store.
//!
//! The [`Embedder`] trait is the boundary to the neural model: it turns a batch
//! of text chunks into one raw vector per chunk and identifies the model that
//! produced them. [`FastEmbedder`] implements it with fastembed; the
//! deterministic [`MockEmbedder`] keeps tests and benchmarks offline.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::error::{VectorError, VectorResult};
use crate::vector::{ModelTag, VectorDimension};

/// Default maximum number of characters handed to the model per chunk.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 512;

/// Trait for generating embeddings from text.
///
/// Implementations of this trait should be thread-safe and
/// capable of handling batch processing efficiently.
pub trait Embedder: Send + Sync {
    /// Generate one embedding per input text, in input order.
    fn embed(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>>;

    /// Get the dimension of embeddings produced by this embedder.
    fn dimensions(&self) -> VectorDimension;

    /// Longest chunk, in characters, the model accepts.
    fn max_input_length(&self) -> usize;

    /// Stable identifier of the model, stored as the record's model tag.
    fn model_identifier(&self) -> ModelTag;
}

/// Resolve a configured model name to a fastembed model.
pub fn parse_embedding_model(name: &str) -> VectorResult<EmbeddingModel> {
    let model = match name {
        "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
        "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
        "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
        "BGEBaseENV15" => EmbeddingModel::BGEBaseENV15,
        "BGELargeENV15" => EmbeddingModel::BGELargeENV15,
        "MxbaiEmbedLargeV1" => EmbeddingModel::MxbaiEmbedLargeV1,
        "MultilingualE5Small" => EmbeddingModel::MultilingualE5Small,
        "NomicEmbedTextV15" => EmbeddingModel::NomicEmbedTextV15,
        other => {
            return Err(VectorError::Config(format!(
                "Unknown embedding model '{other}'. Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15, BGELargeENV15, MxbaiEmbedLargeV1, MultilingualE5Small, NomicEmbedTextV15"
            )));
        }
    };
    Ok(model)
}

/// Default directory for downloaded models.
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("embedstore")
        .join("models")
}

/// FastEmbed implementation of [`Embedder`].
///
/// The model is downloaded into the cache directory on first use. The
/// dimension is discovered by embedding a probe text, and the model tag is a
/// SHA-256 over the model name and that dimension.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
    max_input_length: usize,
    model_tag: ModelTag,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_input_length", &self.max_input_length)
            .field("model", &"<TextEmbedding>")
            .finish()
    }
}

impl FastEmbedder {
    /// Create an embedder with the default AllMiniLML6V2 model.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new() -> VectorResult<Self> {
        Self::from_config(&EmbeddingConfig::default())
    }

    /// Create an embedder from the `[embedding]` settings section.
    ///
    /// # Errors
    /// Returns an error for an unknown model name or if the model fails to
    /// initialize or download.
    pub fn from_config(config: &EmbeddingConfig) -> VectorResult<Self> {
        let model = parse_embedding_model(&config.model)?;
        let cache_dir = config.cache_dir.clone().unwrap_or_else(default_models_dir);

        info!(model = %config.model, cache_dir = %cache_dir.display(), "loading embedding model");

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_max_length(config.max_input_length)
                .with_show_download_progress(config.show_download_progress),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        // Get dimensions by generating a probe embedding
        let probe = text_model
            .embed(vec!["probe"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let dimension = probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| VectorError::EmbeddingFailed("Model returned no probe embedding".to_string()))?;
        let dimension = VectorDimension::new(dimension)?;

        let model_tag = ModelTag::from_parts(&[&config.model, &dimension.to_string()]);
        debug!(%dimension, %model_tag, "embedding model ready");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: config.model.clone(),
            dimension,
            max_input_length: config.max_input_length,
            model_tag,
        })
    }

    /// Configured model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects owned strings for the embed method
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}")))?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> VectorDimension {
        self.dimension
    }

    fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    fn model_identifier(&self) -> ModelTag {
        self.model_tag.clone()
    }
}

/// Deterministic embedder for tests and benchmarks.
///
/// Every text maps to a fixed pseudo-random vector derived from its SHA-256
/// digest, so identical texts always embed identically and different texts
/// are almost never similar. No model is loaded.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: VectorDimension,
    max_input_length: usize,
    model_tag: ModelTag,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    /// Create a mock embedder with standard 384 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(VectorDimension::dimension_384())
    }

    /// Create a mock embedder with a custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            model_tag: ModelTag::new("mock-model-v1"),
        }
    }

    /// Override the chunk size limit.
    #[must_use]
    pub fn with_max_input_length(mut self, max_input_length: usize) -> Self {
        self.max_input_length = max_input_length.max(1);
        self
    }

    /// Override the model tag, e.g. to simulate a model upgrade.
    #[must_use]
    pub fn with_model_tag(mut self, tag: impl Into<String>) -> Self {
        self.model_tag = ModelTag::new(tag);
        self
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut embedding = Vec::with_capacity(dim);
        let mut block = 0u32;

        while embedding.len() < dim {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            for byte in hasher.finalize() {
                if embedding.len() == dim {
                    break;
                }
                // Map 0..=255 onto [-1, 1], skipping exact zero
                let value = (f32::from(byte) - 127.5) / 127.5;
                embedding.push(value);
            }
            block += 1;
        }

        embedding
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimensions(&self) -> VectorDimension {
        self.dimension
    }

    fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    fn model_identifier(&self) -> ModelTag {
        self.model_tag.clone()
    }
}
