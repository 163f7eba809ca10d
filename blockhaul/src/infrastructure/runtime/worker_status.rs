// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-worker state board backing the engines' one-line operator status.
//! Workers store their [`WorkerState`] with relaxed atomics; the status line
//! reads racily. Stale values are acceptable - this is a progress display,
//! not a synchronization mechanism.

use std::sync::atomic::{AtomicU8, Ordering};

use blockhaul_domain::WorkerState;

/// Fixed-size array of worker states, one slot per worker in a pool.
pub struct StatusBoard {
    states: Vec<AtomicU8>,
}

impl StatusBoard {
    /// Creates a board for `workers` slots, all starting at
    /// [`WorkerState::Nothing`].
    pub fn new(workers: usize) -> Self {
        Self {
            states: (0..workers).map(|_| AtomicU8::new(WorkerState::Nothing as u8)).collect(),
        }
    }

    /// Records what `worker` is doing. Out-of-range ids are ignored.
    pub fn set(&self, worker: usize, state: WorkerState) {
        if let Some(slot) = self.states.get(worker) {
            slot.store(state as u8, Ordering::Relaxed);
        }
    }

    /// Number of workers currently in `state`.
    pub fn count(&self, state: WorkerState) -> usize {
        self.states
            .iter()
            .filter(|slot| WorkerState::from_u8(slot.load(Ordering::Relaxed)) == state)
            .count()
    }

    /// Number of worker slots.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// `true` for a pool with no workers.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_state() {
        let board = StatusBoard::new(3);
        assert_eq!(board.count(WorkerState::Nothing), 3);

        board.set(0, WorkerState::Reading);
        board.set(1, WorkerState::Throttling);
        assert_eq!(board.count(WorkerState::Nothing), 1);
        assert_eq!(board.count(WorkerState::Reading), 1);
        assert_eq!(board.count(WorkerState::Throttling), 1);

        board.set(0, WorkerState::Nothing);
        assert_eq!(board.count(WorkerState::Reading), 0);
    }

    #[test]
    fn test_out_of_range_worker_ignored() {
        let board = StatusBoard::new(1);
        board.set(5, WorkerState::Writing);
        assert_eq!(board.count(WorkerState::Writing), 0);
    }
}
