// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Descriptor Value Object
//!
//! A [`Block`] describes one fixed-size region of a backup image. The
//! descriptor is owned by the orchestration layer (which pairs it with the
//! deduplication index); the transfer engines only ever read it and carry it
//! through their queues so results can be correlated with requests.
//!
//! ## Correlation, Not Ordering
//!
//! Engines process blocks in parallel worker pools, so results come back in
//! no particular order. Consumers must pair a returned `(Block, data)` with
//! the request via [`Block::id`] or [`Block::uid`], never via arrival order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::object_uid::ObjectUid;

/// Descriptor for one fixed-size block of a backup image.
///
/// - `id` is the non-negative ordinal of the block along the image; byte
///   offset is `id * block_size`.
/// - `uid` names the block's bytes in the object store once it has been
///   persisted, and is absent before the first save.
/// - `valid` is a hint from the index: `false` means the block is being
///   re-read because the previously recorded data is suspect.
///
/// Engines treat the descriptor as read-only; the mutating builders below
/// exist for the orchestration layer and for tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    id: u64,
    uid: Option<ObjectUid>,
    valid: bool,
}

impl Block {
    /// Creates a descriptor for a block that has not been stored yet.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            uid: None,
            valid: true,
        }
    }

    /// Attaches the object-store uid the block's bytes live under.
    pub fn with_uid(mut self, uid: ObjectUid) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Marks the block as suspect, i.e. scheduled for a re-read.
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Ordinal of the block along the image.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Object-store uid, if the block has been persisted.
    pub fn uid(&self) -> Option<&ObjectUid> {
        self.uid.as_ref()
    }

    /// `false` when the block is being re-read because prior data was
    /// suspect.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uid {
            Some(uid) => write!(f, "block {} ({})", self.id, uid),
            None => write!(f, "block {} (unstored)", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block_is_valid_and_unstored() {
        let block = Block::new(7);
        assert_eq!(block.id(), 7);
        assert!(block.uid().is_none());
        assert!(block.is_valid());
    }

    #[test]
    fn test_builders() {
        let uid = ObjectUid::generate();
        let block = Block::new(3).with_uid(uid.clone()).invalidated();
        assert_eq!(block.uid(), Some(&uid));
        assert!(!block.is_valid());
    }

    #[test]
    fn test_serde_round_trip() {
        let block = Block::new(42).with_uid(ObjectUid::generate());
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }
}
