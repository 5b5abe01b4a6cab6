//! Persistent text embedding store with two-phase similarity search.
//!
//! Vectors are kept in SQLite, one table per category, next to a sign-bit
//! quantized code. Searches scan the codes by Hamming distance to pick
//! candidates, then rerank only those by exact cosine similarity.

pub mod config;
pub mod error;
pub mod logging;
pub mod semantic;
pub mod store;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{VectorError, VectorResult};
pub use semantic::{Match, VectorCollection};
pub use store::{
    CategorySpec, Database, ScoringSite, SearchHit, TableEngine, VectorRecord, VectorTable,
};
pub use vector::{
    BinaryCode, Embedder, FastEmbedder, MockEmbedder, ModelTag, VectorDimension, VectorId,
};
