// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transfer Error Types
//!
//! This module defines the single error type used across the block-transfer
//! subsystem. Every failure an engine can surface - configuration problems,
//! missing object keys, transport hiccups, local I/O faults, and misuse of
//! the engine API - is a variant of [`TransferError`].
//!
//! ## Error Taxonomy
//!
//! The variants map onto the transfer core's handling policy:
//!
//! - **Configuration** (`InvalidConfiguration`, `InvalidUri`, `TargetExists`,
//!   `TargetTooSmall`): raised synchronously from `open`/construction, never
//!   from a worker.
//! - **Missing key** (`KeyNotFound`): propagated to the caller; workers stay
//!   alive.
//! - **Transient transport** (`TransportTimeout`, `ConnectionFailed`):
//!   retried indefinitely inside the backend's raw read loop.
//! - **Permanent transport** (`BackendFailure`): propagated; poisons the
//!   engine on the async write path.
//! - **Local I/O** (`IoError`, `ShortRead`, `ShortWrite`): fatal, never
//!   retried.
//! - **Programming error** (`ProgrammingError`): fatal assertion about API
//!   misuse, e.g. mixing synchronous and threaded reads.
//!
//! ## Design Principles
//!
//! - **Specific**: each variant represents one failure mode
//! - **Actionable**: messages carry enough context for debugging
//! - **Categorized**: `category()` groups variants for systematic handling
//! - **Classified**: `is_transient()` drives the backend retry policy

use thiserror::Error;

/// Errors surfaced by the block-transfer engines and their collaborators.
///
/// Variants carry human-readable messages rather than nested sources so the
/// error remains `Clone` - a requirement of the engine-scoped fatal-error
/// slot, which hands the same recorded error to every subsequent submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid io uri: {0}")]
    InvalidUri(String),

    #[error("Target already exists: {0}")]
    TargetExists(String),

    #[error("Target too small: {0}")]
    TargetTooSmall(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Transport timeout: {0}")]
    TransportTimeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Short read: {0}")]
    ShortRead(String),

    #[error("Short write: {0}")]
    ShortWrite(String),

    #[error("Programming error: {0}")]
    ProgrammingError(String),
}

impl TransferError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new uri error
    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        Self::InvalidUri(msg.into())
    }

    /// Creates a new missing-key error
    pub fn key_not_found(msg: impl Into<String>) -> Self {
        Self::KeyNotFound(msg.into())
    }

    /// Creates a new backend error
    pub fn backend_failure(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new programming error
    pub fn programming(msg: impl Into<String>) -> Self {
        Self::ProgrammingError(msg.into())
    }

    /// Returns `true` for failures the backend read path retries forever:
    /// socket timeouts and connection-level faults. Everything else is
    /// either propagated or poisons the engine.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::TransportTimeout(_) | TransferError::ConnectionFailed(_))
    }

    /// Returns `true` when the error signals a missing object key.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, TransferError::KeyNotFound(_))
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            TransferError::InvalidConfiguration(_) => "configuration",
            TransferError::InvalidUri(_) => "configuration",
            TransferError::TargetExists(_) => "configuration",
            TransferError::TargetTooSmall(_) => "configuration",
            TransferError::KeyNotFound(_) => "missing-key",
            TransferError::TransportTimeout(_) => "transport",
            TransferError::ConnectionFailed(_) => "transport",
            TransferError::BackendFailure(_) => "backend",
            TransferError::IoError(_) => "io",
            TransferError::ShortRead(_) => "io",
            TransferError::ShortWrite(_) => "io",
            TransferError::ProgrammingError(_) => "programming",
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::IoError(err.to_string())
    }
}
