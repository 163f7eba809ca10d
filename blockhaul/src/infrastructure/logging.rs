// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Setup
//!
//! The engines emit structured `tracing` events: `debug!` per transferred
//! block, `warn!` per retried transport error, `error!` when a worker
//! poisons its engine. Embedders that already run a subscriber keep full
//! control; binaries call [`init_tracing`] once at startup.
//!
//! `RUST_LOG` overrides the default filter, so a stuck restore can be
//! diagnosed with `RUST_LOG=blockhaul=debug` without touching config.

use tracing_subscriber::EnvFilter;

use blockhaul_domain::TransferError;

/// Installs the global `fmt` subscriber with an env-filter.
///
/// `default_filter` applies when `RUST_LOG` is unset, e.g. `"info"` or
/// `"blockhaul=debug"`.
///
/// # Errors
///
/// Returns [`TransferError::InvalidConfiguration`] when the filter cannot
/// be parsed or a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TransferError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| TransferError::invalid_config(format!("bad log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| TransferError::invalid_config(format!("cannot install subscriber: {e}")))
}
