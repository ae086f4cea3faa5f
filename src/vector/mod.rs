//! Vector wire encoding and distance helpers.
//!
//! Embeddings travel to the store as a packed blob: exactly
//! [`EMBEDDING_DIMENSION`] little-endian `f32` values, no header and no
//! separators. The index decodes the same layout, so the encoding must be
//! bit-exact.
//!
//! ```text
//! [f32 LE][f32 LE][f32 LE] ... (1536 × 4 = 6144 bytes)
//! ```

use anndists::dist::distances::{DistCosine, Distance};

use crate::error::{Result, StorageError};

/// Dimension of every stored and queried embedding.
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Size in bytes of one packed embedding.
pub const PACKED_VECTOR_LEN: usize = EMBEDDING_DIMENSION * std::mem::size_of::<f32>();

/// Packs a vector into densely packed little-endian `f32` bytes.
pub fn pack_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Unpacks a little-endian `f32` blob.
///
/// # Errors
///
/// Returns `StorageError::Corrupted` if the blob length is not a multiple
/// of four bytes.
pub fn unpack_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::corrupted(format!(
            "Vector blob length {} is not a multiple of 4",
            bytes.len()
        ))
        .into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine distance between two vectors of equal length.
///
/// 0.0 = same direction, 1.0 = orthogonal, 2.0 = opposite.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    DistCosine.eval(a, b)
}
