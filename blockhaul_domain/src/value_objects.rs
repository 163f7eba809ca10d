// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects of the block-transfer domain: immutable, validated types
//! defined entirely by their attributes.

pub mod block;
pub mod block_size;
pub mod checksum;
pub mod object_uid;
pub mod worker_count;

pub use block::Block;
pub use block_size::BlockSize;
pub use checksum::BlockChecksum;
pub use object_uid::ObjectUid;
pub use worker_count::WorkerCount;
