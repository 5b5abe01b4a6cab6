//! Sign-bit quantization of normalized vectors.
//!
//! Each component contributes one bit (1 when positive, 0 otherwise), packed
//! least significant bit first into `ceil(D/8)` bytes. Hamming distance between
//! two codes approximates the angle between the original vectors, which makes
//! the codes a cheap coarse filter before exact scoring.
//!
//! Codes are never decoded back into floats.

use serde::{Deserialize, Serialize};

use crate::error::{VectorError, VectorResult};

/// Packed sign bits of a normalized vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryCode {
    bytes: Vec<u8>,
    bits: usize,
}

impl BinaryCode {
    /// Quantizes a normalized vector, one bit per component.
    #[must_use]
    pub fn encode(normalized: &[f32]) -> Self {
        let bits = normalized.len();
        let mut bytes = vec![0u8; Self::byte_len(bits)];

        for (i, &value) in normalized.iter().enumerate() {
            if value > 0.0 {
                bytes[i / 8] |= 1u8 << (i % 8);
            }
        }

        Self { bytes, bits }
    }

    /// Rebuilds a code read back from storage.
    ///
    /// The byte length must match `bits` exactly and the padding bits of the
    /// last byte must be zero.
    pub fn from_bytes(bytes: Vec<u8>, bits: usize) -> VectorResult<Self> {
        let expected = Self::byte_len(bits);
        if bytes.len() != expected {
            return Err(VectorError::DimensionMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let used = bits % 8;
        if used != 0 {
            let padding_mask = !0u8 << used;
            if bytes[expected - 1] & padding_mask != 0 {
                return Err(VectorError::InvalidState(
                    "binary code has non-zero padding bits".to_string(),
                ));
            }
        }

        Ok(Self { bytes, bits })
    }

    /// Number of bytes needed for `bits` sign bits.
    #[must_use]
    pub const fn byte_len(bits: usize) -> usize {
        bits.div_ceil(8)
    }

    /// Number of meaningful bits (the vector dimension).
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bits
    }

    /// Returns bit `index`, or `false` past the end.
    #[must_use]
    pub fn get_bit(&self, index: usize) -> bool {
        if index >= self.bits {
            return false;
        }
        self.bytes[index / 8] & (1u8 << (index % 8)) != 0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Lowercase hex rendering, two characters per byte.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Number of positions where the two codes differ.
    ///
    /// Returns `None` when the codes have different lengths.
    #[must_use]
    pub fn hamming(&self, other: &BinaryCode) -> Option<u32> {
        if self.bits != other.bits {
            return None;
        }
        hamming_distance(&self.bytes, &other.bytes)
    }
}

/// XOR + popcount over two equal-length byte strings.
///
/// Returns `None` when the lengths differ.
#[must_use]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Option<u32> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}
