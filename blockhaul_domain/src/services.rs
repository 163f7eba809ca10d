// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain service ports. The transfer engines in the infrastructure layer
//! implement [`block_transport::BlockTransport`] and consume
//! [`block_hasher::BlockHasher`] and [`object_store::ObjectStore`].

pub mod block_hasher;
pub mod block_transport;
pub mod object_store;

pub use block_hasher::{BlockHasher, Sha256BlockHasher};
pub use block_transport::{BackendReadResult, BlockTransport, FileReadResult, QueueStatus, WorkerState};
pub use object_store::{ObjectStore, ObjectStoreProvider};
