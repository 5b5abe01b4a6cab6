//! Type-safe wrappers and core types for vector storage.
//!
//! Newtypes keep record ids, dimensions and model tags from being mixed up
//! with plain integers and strings at the table and collection boundaries.

use std::num::NonZeroI64;

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VectorError;

/// Standard vector dimension for text embeddings (all-MiniLM-L6-v2 model).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Type-safe wrapper for stored record ids.
///
/// Ids are SQLite rowids of an `AUTOINCREMENT` table, so they are always
/// positive and never reused after a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VectorId(NonZeroI64);

impl VectorId {
    /// Creates a new `VectorId` from a positive rowid.
    ///
    /// Returns `None` if the provided id is zero or negative.
    #[must_use]
    pub fn new(id: i64) -> Option<Self> {
        if id < 0 {
            return None;
        }
        NonZeroI64::new(id).map(Self)
    }

    /// Returns the underlying rowid.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.get()
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for VectorId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.get()))
    }
}

impl FromSql for VectorId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        Self::new(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent dimension
/// mismatches during storage and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Number of bytes a sign-quantized code of this dimension occupies.
    #[must_use]
    pub const fn code_bytes(&self) -> usize {
        self.0.div_ceil(8)
    }

    /// Validates that a vector has the expected dimension and only finite
    /// components.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        if let Some((index, &value)) = vector.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(VectorError::NonFiniteValue { index, value });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the embedding model version that produced a vector.
///
/// Stored next to every record so that vectors from an older model can be
/// filtered out after an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTag(String);

impl ModelTag {
    /// Wraps an existing identifier verbatim.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Derives a stable tag by hashing the parts that identify a model.
    ///
    /// The same parts always yield the same 64-character hex digest.
    pub fn from_parts(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for ModelTag {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}
