//! Embedding blob encoding — float32 little-endian, lossless.

use retake_core::{Error, Result};

/// Encode a float32 vector as little-endian bytes.
pub fn encode_f32(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian bytes back into a float32 vector.
pub fn decode_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Storage(format!(
            "Embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_lossless() {
        let original = vec![0.1f32, -0.5, 3.25e-7, f32::MAX, 0.0];
        let restored = decode_f32(&encode_f32(&original)).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        assert!(decode_f32(&[0, 0, 128]).is_err());
    }
}
