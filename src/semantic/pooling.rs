//! Turning arbitrary-length text into one vector.
//!
//! Text is split on single spaces into words, and each word into chunks of at
//! most `max_input_length` characters. All chunks go to the embedder in one
//! batch. A word's chunk vectors are averaged into a word vector and the word
//! vectors are averaged into the text vector.

use crate::error::{VectorError, VectorResult};
use crate::vector::{Embedder, mean_pool};

/// Splits `text` into words and each word into chunks of at most `max_chars`
/// characters. Empty words (from repeated spaces) are dropped.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Vec<String>> {
    let max_chars = max_chars.max(1);

    text.split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let chars: Vec<char> = word.chars().collect();
            chars
                .chunks(max_chars)
                .map(|chunk| chunk.iter().collect())
                .collect()
        })
        .collect()
}

/// Embeds `text` through `embedder` and pools it into one vector.
///
/// Text without any chunk pools to the zero vector.
pub fn pool(embedder: &dyn Embedder, text: &str) -> VectorResult<Vec<f32>> {
    let dimension = embedder.dimensions().get();
    let words = chunk_text(text, embedder.max_input_length());

    let chunks: Vec<&str> = words.iter().flatten().map(String::as_str).collect();
    if chunks.is_empty() {
        return Ok(vec![0.0; dimension]);
    }

    let embedded = embedder.embed(&chunks)?;
    if embedded.len() != chunks.len() {
        return Err(VectorError::EmbeddingFailed(format!(
            "expected {} embeddings, got {}",
            chunks.len(),
            embedded.len()
        )));
    }

    let mut offset = 0;
    let mut word_vectors = Vec::with_capacity(words.len());
    for word in &words {
        let end = offset + word.len();
        word_vectors.push(mean_pool(&embedded[offset..end], dimension)?);
        offset = end;
    }

    mean_pool(&word_vectors, dimension)
}
