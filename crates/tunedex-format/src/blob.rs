//! Segment-vector blob codec
//!
//! A blob is the little-endian concatenation of every row's `f32` values.
//! Its float count must be an exact, non-zero multiple of the row dimension.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    #[error("blob length {bytes} is not a whole number of f32 values")]
    Truncated { bytes: usize },

    #[error("blob holds {floats} floats, not a multiple of dimension {dim}")]
    LengthMismatch { floats: usize, dim: usize },

    #[error("blob is empty")]
    Empty,

    #[error("row {row} has {got} values, expected {dim}")]
    RowLength { row: usize, got: usize, dim: usize },

    #[error("dimension must be > 0")]
    ZeroDimension,
}

/// Flatten rows into a blob. Every row must have exactly `dim` values.
pub fn encode_vectors<R: AsRef<[f32]>>(rows: &[R], dim: usize) -> Result<Vec<u8>, BlobError> {
    if dim == 0 {
        return Err(BlobError::ZeroDimension);
    }
    if rows.is_empty() {
        return Err(BlobError::Empty);
    }

    let mut bytes = Vec::with_capacity(rows.len() * dim * 4);
    for (row, values) in rows.iter().enumerate() {
        let values = values.as_ref();
        if values.len() != dim {
            return Err(BlobError::RowLength {
                row,
                got: values.len(),
                dim,
            });
        }
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }

    Ok(bytes)
}

/// Reshape a blob into `len / dim` rows of `dim` values.
pub fn decode_vectors(bytes: &[u8], dim: usize) -> Result<Vec<Vec<f32>>, BlobError> {
    if dim == 0 {
        return Err(BlobError::ZeroDimension);
    }
    if bytes.is_empty() {
        return Err(BlobError::Empty);
    }
    if bytes.len() % 4 != 0 {
        return Err(BlobError::Truncated { bytes: bytes.len() });
    }

    let floats = bytes.len() / 4;
    if floats % dim != 0 {
        return Err(BlobError::LengthMismatch { floats, dim });
    }

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(values.chunks_exact(dim).map(|row| row.to_vec()).collect())
}
