// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Object-store side of the transfer core: the threaded [`engine`], the
//! production [`s3`] store, and the [`memory`] store used by tests and dry
//! runs.

pub mod engine;
pub mod memory;
pub mod s3;

pub use engine::ObjectBackendEngine;
pub use memory::MemoryStoreProvider;
pub use s3::S3StoreProvider;
