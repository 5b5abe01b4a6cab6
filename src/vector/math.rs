//! Numeric routines shared by the quantizer, the tables and the collection.
//!
//! Everything here is pure: no state, no I/O. Length mismatches fail fast
//! instead of silently truncating to the shorter vector.

use crate::error::{VectorError, VectorResult};

/// Substitute divisor used when normalizing a zero vector.
pub const DEFAULT_EPSILON: f32 = 1e-10;

/// Euclidean norm, `sqrt(sum(v_i^2))`.
///
/// Accumulated in `f64`; the result saturates to `f32::INFINITY` only when
/// the norm itself is out of `f32` range.
#[must_use]
pub fn magnitude(vector: &[f32]) -> f32 {
    magnitude_f64(vector) as f32
}

/// [`magnitude`] at double precision. Finite components never overflow it.
#[must_use]
pub fn magnitude_f64(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Scales `vector` by `1 / magnitude`.
///
/// The magnitude is computed (in `f64`) when not supplied or when the
/// supplied one is not finite. An exactly-zero magnitude is replaced by
/// `epsilon`, so the zero vector normalizes to itself instead of producing
/// NaNs.
#[must_use]
pub fn normalize(vector: &[f32], magnitude: Option<f32>, epsilon: f32) -> Vec<f32> {
    let mut divisor = match magnitude {
        Some(m) if m.is_finite() => f64::from(m),
        _ => magnitude_f64(vector),
    };
    if divisor == 0.0 {
        divisor = f64::from(epsilon);
    }
    vector
        .iter()
        .map(|&value| (f64::from(value) / divisor) as f32)
        .collect()
}

/// [`normalize`] with a computed magnitude and [`DEFAULT_EPSILON`].
#[must_use]
pub fn normalize_default(vector: &[f32]) -> Vec<f32> {
    normalize(vector, None, DEFAULT_EPSILON)
}

/// Pairwise product sum of two equal-length vectors, accumulated in `f64`.
pub fn dot(a: &[f32], b: &[f32]) -> VectorResult<f32> {
    Ok(dot_f64(a, b)? as f32)
}

fn dot_f64(a: &[f32], b: &[f32]) -> VectorResult<f64> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum())
}

/// Cosine similarity in `[-1, 1]`.
///
/// Undefined when either vector has zero magnitude, which is reported as
/// [`VectorError::ZeroMagnitude`] rather than returning a made-up score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> VectorResult<f32> {
    let dot_product = dot_f64(a, b)?;
    let norm_a = magnitude_f64(a);
    let norm_b = magnitude_f64(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(VectorError::ZeroMagnitude);
    }

    Ok((dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32)
}

/// Per-dimension arithmetic mean of `vectors`.
///
/// Returns the zero vector of length `dimension` when `vectors` is empty.
pub fn mean_pool(vectors: &[Vec<f32>], dimension: usize) -> VectorResult<Vec<f32>> {
    let mut mean = vec![0.0f32; dimension];
    if vectors.is_empty() {
        return Ok(mean);
    }

    for vector in vectors {
        if vector.len() != dimension {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        for (sum, value) in mean.iter_mut().zip(vector) {
            *sum += value;
        }
    }

    let count = vectors.len() as f32;
    for value in &mut mean {
        *value /= count;
    }
    Ok(mean)
}
