//! Text-level vector storage.
//!
//! [`VectorCollection`] turns texts into pooled embeddings and maps store,
//! search and compare operations onto a category's [`VectorTable`].
//!
//! [`VectorTable`]: crate::store::VectorTable

mod collection;
pub mod pooling;

pub use collection::{Match, VectorCollection};
pub use pooling::{chunk_text, pool};

/// Result count used when the caller does not pass one.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Similarity thresholds
pub mod thresholds {
    /// At or above this, `store` treats the text as already stored
    pub const DUPLICATE: f32 = 0.999;
}
