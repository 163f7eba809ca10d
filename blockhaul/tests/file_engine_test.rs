// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File IO Engine Integration Tests
//!
//! Drives the threaded file engine end to end: restore-style writes, the
//! sparse-target opening matrix, backup-style reads with hash verification,
//! sentinel-terminated shutdown, and the fatal short-read path.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use blockhaul::{
    Block, BlockSize, FileIoConfig, FileIoEngine, Sha256BlockHasher, TransferError,
};
use common::{block_data, calculate_sha256, file_uri, write_image};

const BLOCK_SIZE: usize = 4096;

fn engine(reads: usize, writes: usize) -> FileIoEngine {
    FileIoEngine::new(
        FileIoConfig {
            simultaneous_reads: reads,
            simultaneous_writes: writes,
        },
        BlockSize::new(BLOCK_SIZE).unwrap(),
        Arc::new(Sha256BlockHasher),
    )
}

/// Write blocks 0..10 through the writer pool, reopen the file for reading,
/// and verify every block round-trips with a matching checksum.
#[test]
fn test_write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restore.img");
    let uri = file_uri(&path);

    let mut writer = engine(1, 4);
    writer.open_w(&uri, 10 * BLOCK_SIZE as u64, false).unwrap();
    // Out-of-order submission: offsets come from block ids, not arrival.
    for id in (0..10u64).rev() {
        writer.write(Block::new(id), block_data(id, BLOCK_SIZE)).unwrap();
    }
    writer.close().unwrap();
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        10 * BLOCK_SIZE as u64
    );

    let mut reader = engine(3, 1);
    reader.open_r(&uri).unwrap();
    assert_eq!(reader.size().unwrap(), 10 * BLOCK_SIZE as u64);
    for id in 0..10u64 {
        reader.read(Block::new(id)).unwrap();
    }

    let mut seen = BTreeSet::new();
    for _ in 0..10 {
        let result = reader.get().unwrap().expect("a result, not a sentinel");
        let expected = block_data(result.block.id(), BLOCK_SIZE);
        assert_eq!(result.data, expected);
        assert_eq!(result.checksum.as_str(), calculate_sha256(&expected));
        assert!(seen.insert(result.block.id()), "duplicate result");
    }
    // Results may arrive in any order, but the set matches the submissions.
    assert_eq!(seen, (0..10u64).collect::<BTreeSet<_>>());

    reader.close().unwrap();
}

/// The sparse-creation / force / size matrix of opening a restore target.
#[test]
fn test_open_w_target_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("target.img");
    let uri = file_uri(&path);
    let size = 1_048_576u64;

    // Missing path: created sparse with exactly the requested length.
    let mut first = engine(1, 1);
    first.open_w(&uri, size, false).unwrap();
    first.close().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size);

    // Existing path without force is refused.
    let mut unforced = engine(1, 1);
    assert!(matches!(
        unforced.open_w(&uri, size, false),
        Err(TransferError::TargetExists(_))
    ));

    // Forced reopen at the same size succeeds.
    let mut forced = engine(1, 1);
    forced.open_w(&uri, size, true).unwrap();
    forced.close().unwrap();

    // Forced reopen needing more room than the target has is refused.
    let mut too_small = engine(1, 1);
    assert!(matches!(
        too_small.open_w(&uri, size + 1, true),
        Err(TransferError::TargetTooSmall(_))
    ));
}

/// Submit 100 reads, close while a consumer drains: the consumer sees
/// exactly 100 results followed by one sentinel per reader thread.
#[test]
fn test_close_emits_one_sentinel_per_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.img");
    write_image(&path, 100, BLOCK_SIZE);

    let mut engine = engine(4, 1);
    engine.open_r(&file_uri(&path)).unwrap();
    for id in 0..100u64 {
        engine.read(Block::new(id)).unwrap();
    }

    let (results, sentinels) = std::thread::scope(|scope| {
        let consumer = scope.spawn(|| {
            let mut results = 0u32;
            let mut sentinels = 0u32;
            while sentinels < 4 {
                match engine.get().unwrap() {
                    Some(_) => results += 1,
                    None => sentinels += 1,
                }
            }
            (results, sentinels)
        });
        engine.close().unwrap();
        consumer.join().unwrap()
    });

    assert_eq!(results, 100);
    assert_eq!(sentinels, 4);
    // The engine refuses further work once closed.
    assert!(matches!(
        engine.read(Block::new(0)),
        Err(TransferError::ProgrammingError(_))
    ));
}

/// A synchronous read returns the requested block's bytes directly.
#[test]
fn test_read_sync_returns_matching_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.img");
    write_image(&path, 4, BLOCK_SIZE);

    let mut engine = engine(2, 1);
    engine.open_r(&file_uri(&path)).unwrap();
    assert_eq!(engine.read_sync(Block::new(2)).unwrap(), block_data(2, BLOCK_SIZE));
    assert_eq!(engine.read_sync(Block::new(0)).unwrap(), block_data(0, BLOCK_SIZE));
    engine.close().unwrap();
}

/// EOF inside an in-bounds block is fatal: the error reaches the consumer
/// and the engine still shuts down cleanly.
#[test]
fn test_short_read_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.img");
    // One and a half blocks: block 1 exists but cannot be read in full.
    std::fs::write(&path, vec![0xabu8; BLOCK_SIZE + BLOCK_SIZE / 2]).unwrap();

    let mut engine = engine(1, 1);
    engine.open_r(&file_uri(&path)).unwrap();
    engine.read(Block::new(1)).unwrap();

    match engine.get() {
        Err(TransferError::ShortRead(_)) => {}
        other => panic!("expected a fatal short read, got {other:?}"),
    }
    engine.close().unwrap();
}

/// Backpressure: with a tiny result queue and no consumer, readers park and
/// the submission side still accepts descriptors (they are small), while
/// the engine keeps at most `capacity` results in memory.
#[test]
fn test_result_queue_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.img");
    write_image(&path, 64, BLOCK_SIZE);

    let mut engine = engine(1, 1);
    engine.open_r(&file_uri(&path)).unwrap();
    for id in 0..64u64 {
        engine.read(Block::new(id)).unwrap();
    }

    // Give the reader time to fill the bounded result queue (1 + 20 slots).
    std::thread::sleep(std::time::Duration::from_millis(300));
    let status = engine.queue_status();
    assert!(
        status.read_fill >= 0.99,
        "result queue should be full, was {}",
        status.read_fill
    );

    // Draining everything still yields every block exactly once.
    let mut seen = BTreeSet::new();
    for _ in 0..64 {
        let result = engine.get().unwrap().expect("a result");
        seen.insert(result.block.id());
    }
    assert_eq!(seen.len(), 64);
    engine.close().unwrap();
}
