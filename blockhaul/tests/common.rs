// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared utilities for the engine integration tests.

#![allow(dead_code)]

use std::path::Path;

/// Calculate SHA256 checksum of data
///
/// # Returns
///
/// Hex-encoded SHA256 hash as a string
pub fn calculate_sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Deterministic per-block test pattern: byte `j` of block `i` is
/// `(i * 7 + j) mod 256`, so neighbouring blocks never collide.
pub fn block_data(block_id: u64, block_size: usize) -> Vec<u8> {
    (0..block_size)
        .map(|j| ((block_id as usize * 7 + j) % 256) as u8)
        .collect()
}

/// Writes an image of `blocks` consecutive patterned blocks to `path`.
pub fn write_image(path: &Path, blocks: u64, block_size: usize) {
    let mut image = Vec::with_capacity(blocks as usize * block_size);
    for id in 0..blocks {
        image.extend_from_slice(&block_data(id, block_size));
    }
    std::fs::write(path, image).expect("test image is writable");
}

/// `file://` uri for a path.
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_sha256() {
        let hash = calculate_sha256(b"test data");

        // SHA256 produces 64 hex characters
        assert_eq!(hash.len(), 64);

        // Should be deterministic
        assert_eq!(hash, calculate_sha256(b"test data"));
    }

    #[test]
    fn test_block_data_pattern_is_distinct_per_block() {
        assert_ne!(block_data(0, 64), block_data(1, 64));
        assert_eq!(block_data(3, 64), block_data(3, 64));
    }
}
