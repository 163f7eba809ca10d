// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Hex-encoded content hash of one block's data, as produced by the
//! configured [`BlockHasher`](crate::services::block_hasher::BlockHasher).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex digest over a block's bytes.
///
/// The algorithm is whatever hasher the engine was configured with; the
/// checksum is compared and stored as an opaque lowercase hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockChecksum(String);

impl BlockChecksum {
    /// Wraps an already hex-encoded digest.
    pub fn new(hex_digest: impl Into<String>) -> Self {
        Self(hex_digest.into())
    }

    /// The digest as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
