// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Size Value Object
//!
//! Validated byte size of one block. Every engine in a transfer pipeline is
//! created with the same [`BlockSize`]; file offsets are always
//! `block_id * block_size`, so a typo here corrupts an entire image. The
//! newtype keeps raw `usize`s out of the seek math.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransferError;

/// Size in bytes of one transfer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockSize {
    bytes: usize,
}

impl BlockSize {
    /// Smallest accepted block size in bytes.
    pub const MIN_BYTES: usize = 1;

    /// Largest accepted block size (512 MiB); bigger blocks make the bounded
    /// queues hold unreasonable amounts of memory.
    pub const MAX_BYTES: usize = 512 * 1024 * 1024;

    /// Creates a validated block size.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidConfiguration`] when `bytes` is zero
    /// or exceeds [`Self::MAX_BYTES`].
    pub fn new(bytes: usize) -> Result<Self, TransferError> {
        if bytes < Self::MIN_BYTES {
            return Err(TransferError::invalid_config("block size must be non-zero"));
        }
        if bytes > Self::MAX_BYTES {
            return Err(TransferError::invalid_config(format!(
                "block size {} exceeds maximum of {} bytes",
                bytes,
                Self::MAX_BYTES
            )));
        }
        Ok(Self { bytes })
    }

    /// Size in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Byte offset of the block with ordinal `block_id`.
    pub fn offset_of(&self, block_id: u64) -> u64 {
        block_id * self.bytes as u64
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sizes() {
        assert_eq!(BlockSize::new(1).unwrap().bytes(), 1);
        assert_eq!(BlockSize::new(4096).unwrap().bytes(), 4096);
        assert_eq!(
            BlockSize::new(BlockSize::MAX_BYTES).unwrap().bytes(),
            BlockSize::MAX_BYTES
        );
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(BlockSize::new(0).is_err());
        assert!(BlockSize::new(BlockSize::MAX_BYTES + 1).is_err());
    }

    #[test]
    fn test_offset_math() {
        let size = BlockSize::new(4096).unwrap();
        assert_eq!(size.offset_of(0), 0);
        assert_eq!(size.offset_of(3), 12_288);
        // Offsets are u64 even when usize is 32 bits on the target.
        assert_eq!(size.offset_of(1 << 40), 4096u64 * (1 << 40));
    }
}
