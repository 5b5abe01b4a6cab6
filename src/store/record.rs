//! Stored rows and search results.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

use crate::error::VectorResult;
use crate::vector::{BinaryCode, ModelTag, VectorId, magnitude_f64, normalize_default};

/// Column list shared by every query that decodes a full record.
pub(crate) const RECORD_COLUMNS: &str =
    "id, vector, normalized_vector, magnitude, binary_code, model_tag, created";

/// One persisted vector with its derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: VectorId,
    pub vector: Vec<f32>,
    pub normalized_vector: Vec<f32>,
    pub magnitude: f32,
    pub binary_code: BinaryCode,
    pub model_tag: Option<ModelTag>,
    pub created_at: DateTime<Utc>,
}

impl VectorRecord {
    /// Decodes a row selected with [`RECORD_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let vector = json_column(row, 1)?;
        let normalized_vector = json_column(row, 2)?;
        let magnitude: f64 = row.get(3)?;

        let code_bytes: Vec<u8> = row.get(4)?;
        let binary_code = BinaryCode::from_bytes(code_bytes, vector.len())
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Blob, Box::new(e)))?;

        let model_tag: Option<String> = row.get(5)?;
        let created: i64 = row.get(6)?;
        let created_at = DateTime::from_timestamp(created, 0)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(6, created))?;

        Ok(Self {
            id: row.get(0)?,
            vector,
            normalized_vector,
            magnitude: magnitude as f32,
            binary_code,
            model_tag: model_tag.map(ModelTag::new),
            created_at,
        })
    }
}

/// One ranked result of a two-phase search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: VectorId,
    pub vector: Vec<f32>,
    pub normalized_vector: Vec<f32>,
    pub magnitude: f32,
    pub similarity: f32,
}

impl SearchHit {
    /// Decodes `id, vector, normalized_vector, magnitude` plus a similarity.
    pub(crate) fn from_row(row: &Row<'_>, similarity: f32) -> rusqlite::Result<Self> {
        let magnitude: f64 = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            vector: json_column(row, 1)?,
            normalized_vector: json_column(row, 2)?,
            magnitude: magnitude as f32,
            similarity,
        })
    }
}

/// Derived fields of a raw vector, ready to bind.
///
/// The normalized vector, magnitude and code are always computed together
/// from the same raw vector.
#[derive(Debug, Clone)]
pub(crate) struct EncodedVector {
    pub vector_json: String,
    pub normalized_json: String,
    pub magnitude: f64,
    pub binary_code: Vec<u8>,
}

impl EncodedVector {
    pub fn from_raw(raw: &[f32]) -> VectorResult<Self> {
        let magnitude = magnitude_f64(raw);
        let normalized = normalize_default(raw);
        let binary_code = BinaryCode::encode(&normalized).into_bytes();

        Ok(Self {
            vector_json: to_json(raw)?,
            normalized_json: to_json(&normalized)?,
            magnitude,
            binary_code,
        })
    }
}

pub(crate) fn to_json(vector: &[f32]) -> VectorResult<String> {
    serde_json::to_string(vector).map_err(|e| crate::error::VectorError::store("encode_vector", e))
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<f32>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
