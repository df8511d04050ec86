// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/core/sha256d.rs
//
// Double SHA-256 hashing over an 80-byte header with nonce iteration. Two
// paths are provided: a scalar single-nonce function and a 4-wide batch that
// reuses the header buffer across the lane. The batch path is what the
// manager's use_sse flag selects for CPU workers.

use core::array;
use log::warn;
use sha2::{Digest, Sha256};

use crate::core::types::HEADER_LEN;

const LOG_TARGET: &str = "forgemine::sha256d";

/// Offset of the nonce inside the header template.
pub const NONCE_OFFSET: usize = 76;

/// Double SHA-256 of a complete 80-byte header.
pub fn sha256d_hash(header: &[u8]) -> [u8; 32] {
    if header.len() != HEADER_LEN {
        warn!(target: LOG_TARGET, "invalid header length: {} bytes (expected {})", header.len(), HEADER_LEN);
        return [0xFF; 32];
    }

    let first = Sha256::digest(header);
    Sha256::digest(first).into()
}

/// Hash one nonce against a header template. Scalar path.
pub fn sha256d_hash_with_nonce(header_base: &[u8], nonce: u32) -> [u8; 32] {
    if header_base.len() != HEADER_LEN {
        warn!(target: LOG_TARGET, "invalid header length: {} bytes (expected {})", header_base.len(), HEADER_LEN);
        return [0xFF; 32];
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(header_base);
    header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
    sha256d_hash(&header)
}

/// Hash four consecutive nonces against a header template, reusing the header
/// buffer across the lane. Batch (SSE) path.
pub fn sha256d_hash_with_nonce_batch(header_base: &[u8], start_nonce: u32) -> [([u8; 32], u32); 4] {
    if header_base.len() != HEADER_LEN {
        warn!(target: LOG_TARGET, "invalid header length: {} bytes (expected {})", header_base.len(), HEADER_LEN);
        return array::from_fn(|i| ([0xFF; 32], start_nonce.wrapping_add(i as u32)));
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(header_base);

    let mut results: [([u8; 32], u32); 4] = array::from_fn(|_| ([0; 32], 0));
    for (i, slot) in results.iter_mut().enumerate() {
        let nonce = start_nonce.wrapping_add(i as u32);
        header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
        *slot = (sha256d_hash(&header), nonce);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // SHA256d of 80 zero bytes
        let header = [0u8; HEADER_LEN];
        let hash = sha256d_hash(&header);
        assert_eq!(
            hex::encode(hash),
            "4be7570e8f70eb093640c8468274ba759745a7aa2b7d25ab1e0421b259845014"
        );
    }

    #[test]
    fn invalid_length_is_flagged() {
        assert_eq!(sha256d_hash(&[0u8; 79]), [0xFF; 32]);
    }

    #[test]
    fn batch_matches_scalar() {
        let mut header = vec![0u8; HEADER_LEN];
        header[0] = 0x42;
        let batch = sha256d_hash_with_nonce_batch(&header, 7);
        for (hash, nonce) in batch.iter() {
            assert_eq!(*hash, sha256d_hash_with_nonce(&header, *nonce));
        }
        assert_eq!(batch[3].1, 10);
    }

    #[test]
    fn nonce_changes_hash() {
        let header = vec![0u8; HEADER_LEN];
        assert_ne!(
            sha256d_hash_with_nonce(&header, 1),
            sha256d_hash_with_nonce(&header, 2)
        );
    }
}
