// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bounded Backpressure Queue
//!
//! FIFO queue connecting producers and worker pools. The capacity bound is
//! what turns a fast producer into a blocked producer instead of an
//! unbounded allocation: with capacity `C` and block size `B`, a pipeline
//! can never hold more than `C * B` bytes in flight.
//!
//! Beyond `put`/`get`, the queue tracks *unfinished work* the way Python's
//! `queue.Queue` does: `put` increments a counter, workers call `task_done`
//! after fully processing an item, and `join`/`join_timeout` block until the
//! counter reaches zero. The backend engine's synchronous save path is built
//! on this - "the queue is empty" is not the same as "the last write has hit
//! the store".
//!
//! ## Variants
//!
//! - `bounded(capacity)`: `put` blocks while `len() == capacity`.
//! - `unbounded()`: `put` never blocks; used for the read-submission queues
//!   so an orchestrator can pre-queue an entire working set of descriptors
//!   (descriptors are small; block *data* only ever sits in bounded queues).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

/// FIFO queue with optional capacity, blocking semantics, and
/// unfinished-task accounting.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    all_done: Condvar,
    capacity: Option<usize>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue that blocks producers once `capacity` items are
    /// queued. A zero capacity is promoted to one so `put` can ever succeed.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    /// Creates a queue whose `put` never blocks.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            all_done: Condvar::new(),
            capacity,
        }
    }

    /// Appends `item`, blocking while the queue is at capacity.
    pub fn put(&self, item: T) {
        let mut inner = self.inner.lock();
        if let Some(capacity) = self.capacity {
            while inner.items.len() >= capacity {
                self.not_full.wait(&mut inner);
            }
        }
        inner.items.push_back(item);
        inner.unfinished += 1;
        self.not_empty.notify_one();
    }

    /// Removes and returns the oldest item, blocking while the queue is
    /// empty.
    pub fn get(&self) -> T {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Marks one previously-gotten item as fully processed.
    pub fn task_done(&self) {
        let mut inner = self.inner.lock();
        inner.unfinished = inner.unfinished.saturating_sub(1);
        if inner.unfinished == 0 {
            self.all_done.notify_all();
        }
    }

    /// Blocks until every item ever `put` has been `task_done`d.
    pub fn join(&self) {
        let mut inner = self.inner.lock();
        while inner.unfinished > 0 {
            self.all_done.wait(&mut inner);
        }
    }

    /// Like [`join`](Self::join) but gives up after `timeout`, returning
    /// whether all work had finished. Callers that must keep polling a
    /// fatal-error slot while draining use this instead of a bare `join`.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.unfinished > 0 {
            if self.all_done.wait_until(&mut inner, deadline).timed_out() {
                return inner.unfinished == 0;
            }
        }
        true
    }

    /// Number of items currently queued (not: unfinished).
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity, `None` for unbounded queues.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Fill ratio `0.0..=1.0`; unbounded queues report `0.0`.
    pub fn fill_ratio(&self) -> f64 {
        match self.capacity {
            Some(capacity) => self.len() as f64 / capacity as f64,
            None => 0.0,
        }
    }
}
