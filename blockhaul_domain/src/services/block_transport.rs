// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Transport Port
//!
//! The capability set shared by the two transfer engines: submit read jobs,
//! submit write jobs, retrieve completed results, report operator status,
//! and shut down. The orchestration layer wires engines together through
//! this trait - `file.submit_read -> hash -> backend.submit_write` for a
//! backup, `backend.submit_read -> file.submit_write` for a restore -
//! without caring which side is which.
//!
//! ## Ordering Contract
//!
//! Jobs are processed by parallel worker pools. Enqueue order is preserved
//! per worker but not globally, so every result carries its originating
//! [`Block`]; consumers correlate by `Block::id`/`Block::uid`, never by
//! arrival order.
//!
//! ## Shutdown Contract
//!
//! `close` enqueues exactly one terminal sentinel per worker and joins the
//! pools. After it returns, no worker is alive and no further results will
//! appear. Engines are not reusable after `close`.

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::value_objects::block::Block;
use crate::value_objects::checksum::BlockChecksum;

/// What a worker thread is doing right now.
///
/// Updated monotonically by the worker and read racily by the status line;
/// stale values are tolerated by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkerState {
    /// Between jobs, or blocked on a queue.
    Nothing = 0,
    /// Positioning within the io target.
    Seeking = 1,
    /// Transferring bytes in.
    Reading = 2,
    /// Transferring bytes out.
    Writing = 3,
    /// Dropping the just-used range from the page cache.
    Fadvise = 4,
    /// Sleeping off a token-bucket debt.
    Throttling = 5,
    /// Opening a store session / preparing a fresh object key.
    NewKey = 6,
}

impl WorkerState {
    /// Lossless round trip through the atomic byte the status boards store.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Seeking,
            2 => WorkerState::Reading,
            3 => WorkerState::Writing,
            4 => WorkerState::Fadvise,
            5 => WorkerState::Throttling,
            6 => WorkerState::NewKey,
            _ => WorkerState::Nothing,
        }
    }
}

/// Fill ratios of an engine's result/write queues, `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QueueStatus {
    /// Read-result queue fill ratio.
    pub read_fill: f64,
    /// Write queue fill ratio.
    pub write_fill: f64,
}

/// Completed file-engine read: the originating block, exactly one block of
/// data, and the content hash computed on the worker that read it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReadResult {
    pub block: Block,
    pub data: Vec<u8>,
    pub checksum: BlockChecksum,
}

/// Completed backend read. `data` is `None` when the key was missing in the
/// store - the worker stays alive and the caller decides what a hole means.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReadResult {
    pub block: Block,
    pub data: Option<Vec<u8>>,
}

impl BackendReadResult {
    /// Always zero; kept for symmetry with transports that support partial
    /// object reads.
    pub fn offset(&self) -> u64 {
        0
    }

    /// Length of the returned data, zero when the key was missing.
    pub fn length(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

/// Common surface of the pipelined transfer engines.
pub trait BlockTransport: Send + Sync {
    /// What a write submission carries: `(Block, data)` for the file engine,
    /// `(ObjectUid, data)` for the backend engine.
    type WriteJob;

    /// What `get_result` yields once a read job completes.
    type ReadResult;

    /// Enqueues a read job. Returns immediately unless the submission queue
    /// applies backpressure.
    fn submit_read(&self, block: Block) -> Result<(), TransferError>;

    /// Enqueues a write job; blocks while the write queue is full.
    fn submit_write(&self, job: Self::WriteJob) -> Result<(), TransferError>;

    /// Removes and returns the next completed read. Blocks while no result
    /// is available.
    fn get_result(&self) -> Result<Self::ReadResult, TransferError>;

    /// One line of human-readable worker/queue state for a TUI.
    fn thread_status(&self) -> String;

    /// Queue fill ratios.
    fn queue_status(&self) -> QueueStatus;

    /// Stops all workers (one sentinel each) and joins them.
    fn close(&self) -> Result<(), TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_round_trip() {
        for state in [
            WorkerState::Nothing,
            WorkerState::Seeking,
            WorkerState::Reading,
            WorkerState::Writing,
            WorkerState::Fadvise,
            WorkerState::Throttling,
            WorkerState::NewKey,
        ] {
            assert_eq!(WorkerState::from_u8(state as u8), state);
        }
        // Unknown bytes decay to Nothing rather than panicking.
        assert_eq!(WorkerState::from_u8(250), WorkerState::Nothing);
    }

    #[test]
    fn test_backend_read_result_accessors() {
        let hit = BackendReadResult {
            block: Block::new(1),
            data: Some(vec![0u8; 16]),
        };
        assert_eq!(hit.offset(), 0);
        assert_eq!(hit.length(), 16);

        let miss = BackendReadResult {
            block: Block::new(2),
            data: None,
        };
        assert_eq!(miss.length(), 0);
    }
}
