//! Vector primitives for the embedding store.
//!
//! This module holds everything that operates on a single vector or a pair
//! of vectors without touching the database:
//!
//! - [`math`]: magnitude, normalization, dot product, cosine, mean-pooling
//! - [`BinaryCode`]: sign-bit quantization and Hamming distance
//! - [`Embedder`]: the text-to-vector boundary, with a fastembed backend
//!
//! # Quantization
//! A normalized vector of dimension D becomes D sign bits packed into
//! `ceil(D/8)` bytes. Hamming distance over those codes is the coarse filter
//! of the two-phase search; exact scoring always runs on the float vectors.

mod embedding;
pub mod math;
mod quantize;
mod types;

pub use embedding::{
    DEFAULT_MAX_INPUT_LENGTH, Embedder, FastEmbedder, MockEmbedder, default_models_dir,
    parse_embedding_model,
};
pub use math::{
    cosine_similarity, dot, magnitude, magnitude_f64, mean_pool, normalize, normalize_default,
};
pub use quantize::{BinaryCode, hamming_distance};
pub use types::{ModelTag, VECTOR_DIMENSION_384, VectorDimension, VectorId};
