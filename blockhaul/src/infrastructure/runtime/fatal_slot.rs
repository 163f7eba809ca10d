// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Engine-scoped fatal-error slot. A worker that hits a non-retryable
//! failure records it here and exits; every later submission gets the
//! recorded error back immediately and peer workers drain out on their next
//! dequeue. The first recorded error wins - later failures are usually
//! knock-on effects of the first. There is no recovery within the engine's
//! lifetime.

use parking_lot::Mutex;

use blockhaul_domain::TransferError;

/// First-error-wins poison slot shared by an engine and its workers.
#[derive(Default)]
pub struct FatalSlot {
    error: Mutex<Option<TransferError>>,
}

impl FatalSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` unless a fatal error was already recorded.
    pub fn record(&self, error: TransferError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// `true` once the engine is poisoned.
    pub fn is_set(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Clone of the recorded error, if any.
    pub fn get(&self) -> Option<TransferError> {
        self.error.lock().clone()
    }

    /// `Err` with the recorded error once poisoned, `Ok` otherwise.
    pub fn check(&self) -> Result<(), TransferError> {
        match self.get() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
