// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Hasher Port
//!
//! The content-hash function used on every file read. The choice of
//! algorithm belongs to the surrounding system (it must match what the
//! deduplication index stores), so the engines consume it as an opaque
//! service; [`Sha256BlockHasher`] is the stock implementation.

use sha2::{Digest, Sha256};

use crate::value_objects::checksum::BlockChecksum;

/// Content-hash function applied to block data on the read path.
///
/// Implementations must be cheap to share across reader workers; hashing
/// happens on the worker thread that read the block.
pub trait BlockHasher: Send + Sync {
    /// Short algorithm name, e.g. `"sha256"`.
    fn name(&self) -> &'static str;

    /// Hex digest over `data`.
    fn digest(&self, data: &[u8]) -> BlockChecksum;
}

/// SHA-256 implementation of [`BlockHasher`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256BlockHasher;

impl BlockHasher for Sha256BlockHasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, data: &[u8]) -> BlockChecksum {
        BlockChecksum::new(hex::encode(Sha256::digest(data)))
    }
}
