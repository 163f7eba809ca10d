// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Blockhaul Domain
//!
//! Pure domain layer for the blockhaul block-transfer core: the vocabulary
//! of a deduplicating block-level backup system and the ports its transfer
//! engines plug into. No I/O happens here.
//!
//! ## Core Concepts
//!
//! ### Blocks
//! A backup image is treated as a sparse array of fixed-size blocks. A
//! [`Block`] is the externally-owned descriptor the orchestration layer
//! hands to an engine: an ordinal `id` along the image, the object-store
//! `uid` once the block's bytes have been persisted, and a `valid` hint.
//! Engines read these fields; they never mutate the descriptor.
//!
//! ### Object uids
//! Every stored block is one object in an S3-semantics store, named by a
//! 32-character [`ObjectUid`] whose leading hash prefix scatters keys
//! uniformly across the store's partitioning.
//!
//! ### Ports
//! - [`BlockHasher`]: the configured content-hash function, consumed as an
//!   opaque service.
//! - [`BlockTransport`]: the capability set both transfer engines expose -
//!   submit read, submit write, get result, status, close.
//! - [`ObjectStore`] / [`ObjectStoreProvider`]: the S3-semantics surface a
//!   backend engine drives, one independent session per worker.
//!
//! ## Error Handling
//!
//! All fallible operations return [`TransferError`], a single `thiserror`
//! enum categorized to match the transfer core's retry/poison policy.

pub mod error;
pub mod services;
pub mod value_objects;

// Re-export domain types for convenient access
pub use error::TransferError;
pub use services::block_hasher::{BlockHasher, Sha256BlockHasher};
pub use services::block_transport::{
    BackendReadResult, BlockTransport, FileReadResult, QueueStatus, WorkerState,
};
pub use services::object_store::{ObjectStore, ObjectStoreProvider};
pub use value_objects::block::Block;
pub use value_objects::block_size::BlockSize;
pub use value_objects::checksum::BlockChecksum;
pub use value_objects::object_uid::ObjectUid;
pub use value_objects::worker_count::WorkerCount;
