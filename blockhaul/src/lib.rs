// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Blockhaul
//!
//! The block-transfer core of a deduplicating block-level backup system.
//! Blockhaul moves fixed-size blocks between a local block device or image
//! file and an S3-semantics object store, sustaining throughput on both
//! sides with bounded, multi-worker pipelines.
//!
//! ## The Two Engines
//!
//! - [`FileIoEngine`]: treats a local file as a sparse block array. Reader
//!   workers seek to `block_id * block_size`, transfer exactly one block,
//!   hash it on the way in, and hint the kernel to drop the range from the
//!   page cache. Writer workers share one descriptor and write positionally
//!   to disjoint offsets.
//! - [`ObjectBackendEngine`]: persists each block as one object named by a
//!   uniformly-scattered 32-character uid. Workers apply token-bucket
//!   bandwidth throttling and retry transient transport errors; permanent
//!   write failures poison the engine.
//!
//! Both expose the same shape ([`BlockTransport`]): submit jobs into an
//! input queue, retrieve completed jobs from an output queue, or drive a
//! single job synchronously. A backup wires
//! `file.read -> hash -> backend.save`; a restore wires
//! `backend.read -> file.write`.
//!
//! ## Backpressure Is Load-Bearing
//!
//! All inter-thread traffic rides bounded queues
//! ([`infrastructure::runtime::bounded_queue::BoundedQueue`]); a full
//! downstream queue blocks upstream producers, so total in-flight memory is
//! capped at `queue_capacity * block_size` per pool no matter how fast the
//! submitting side runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blockhaul::{Block, BlockSize, FileIoConfig, FileIoEngine, Sha256BlockHasher};
//!
//! # fn main() -> Result<(), blockhaul::TransferError> {
//! let mut engine = FileIoEngine::new(
//!     FileIoConfig::default(),
//!     BlockSize::new(4096)?,
//!     Arc::new(Sha256BlockHasher),
//! );
//! engine.open_r("file:///var/backup/disk.img")?;
//! engine.read(Block::new(0))?;
//! if let Some(result) = engine.get()? {
//!     println!("block 0 hashed to {}", result.checksum);
//! }
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

pub mod infrastructure;

// Re-export domain types for convenient access
pub use blockhaul_domain::{
    BackendReadResult, Block, BlockChecksum, BlockHasher, BlockSize, BlockTransport,
    FileReadResult, ObjectStore, ObjectStoreProvider, ObjectUid, QueueStatus,
    Sha256BlockHasher, TransferError, WorkerCount, WorkerState,
};

pub use infrastructure::backend::engine::ObjectBackendEngine;
pub use infrastructure::backend::memory::MemoryStoreProvider;
pub use infrastructure::backend::s3::S3StoreProvider;
pub use infrastructure::config::{AddressingStyle, BackendConfig, FileIoConfig};
pub use infrastructure::io::file_engine::FileIoEngine;
