// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Store Port
//!
//! The S3-semantics surface the backend engine drives: whole-object get,
//! put, head, delete, and prefix listing against one bucket. No multipart,
//! no versioning, no partial reads - a stored block is exactly one opaque
//! object named by its uid.
//!
//! ## Sessions
//!
//! Client sessions are not assumed safe to share across threads, so the
//! engine asks an [`ObjectStoreProvider`] for an independent
//! [`ObjectStore`] per worker (opened lazily on the worker's first job)
//! plus one for its own synchronous paths. Implementations where sessions
//! are cheap may hand out clones of shared state.
//!
//! ## Error Contract
//!
//! Implementations classify failures into the
//! [`TransferError`](crate::TransferError) taxonomy: a missing key is
//! `KeyNotFound`, timeouts are `TransportTimeout`, connection-level faults
//! are `ConnectionFailed`, anything else is `BackendFailure`. The engine's
//! retry policy keys off exactly this classification.

use crate::error::TransferError;

/// One session against the configured bucket of an S3-compatible store.
pub trait ObjectStore: Send + Sync {
    /// Fetches the full body of the object named `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, TransferError>;

    /// Stores `data` as the full body of the object named `key`,
    /// overwriting any previous body.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), TransferError>;

    /// Verifies that `key` exists without fetching its body.
    fn head(&self, key: &str) -> Result<(), TransferError>;

    /// Deletes the object named `key`.
    fn delete(&self, key: &str) -> Result<(), TransferError>;

    /// Lists all object keys, optionally restricted to a prefix.
    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, TransferError>;
}

/// Factory handing out one independent [`ObjectStore`] session per caller.
pub trait ObjectStoreProvider: Send + Sync {
    /// Opens a fresh session. Called once per worker (lazily) and once for
    /// the engine's synchronous operations.
    fn open_store(&self) -> Result<Box<dyn ObjectStore>, TransferError>;
}
