// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Backend Engine
//!
//! Threaded block transfer against an S3-semantics object store. Each block
//! is one object named by a freshly generated
//! [`ObjectUid`](blockhaul_domain::ObjectUid); worker pools for reads and
//! writes are spawned at construction and live until `close`.
//!
//! ## Queues
//!
//! - write queue: bounded at `simultaneous_writes + 20`, carries
//!   `(uid, data)` pairs.
//! - read queue: unbounded, carries block descriptors so an orchestrator
//!   can pre-queue the full working set of a restore.
//! - read-data queue: bounded at `simultaneous_reads + 20`, carries
//!   completed reads back; a stalled consumer blocks the readers.
//!
//! ## Throttling
//!
//! Each pool debits its own [`TokenBucket`] per transfer and sleeps off the
//! returned debt, so long-term bandwidth stays under the configured caps
//! regardless of pool size.
//!
//! ## Failure Model
//!
//! Reads retry transient transport errors forever (operators cancel
//! externally - a flaky provider must not fail a terabyte restore at 99%).
//! A missing key is not an error of the pipeline: the result carries
//! `data: None` and the worker stays alive. Writes are never retried; the
//! first permanent failure - on either path - is recorded in the engine's
//! fatal slot, after which every submission fails immediately and workers
//! drain out. A permanent read failure additionally rides the result queue
//! as an `Err`, so the caller already blocked in `read_get` observes it
//! instead of waiting on a result that will never come.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use blockhaul_domain::{
    BackendReadResult, Block, BlockTransport, ObjectStore, ObjectStoreProvider, ObjectUid,
    QueueStatus, TransferError, WorkerCount, WorkerState,
};

use crate::infrastructure::config::BackendConfig;
use crate::infrastructure::runtime::bounded_queue::BoundedQueue;
use crate::infrastructure::runtime::fatal_slot::FatalSlot;
use crate::infrastructure::runtime::token_bucket::TokenBucket;
use crate::infrastructure::runtime::worker_status::StatusBoard;

/// Write-queue headroom beyond one slot per writer.
const WRITE_QUEUE_LENGTH: usize = 20;
/// Read-data-queue headroom beyond one slot per reader.
const READ_QUEUE_LENGTH: usize = 20;

/// How often the synchronous save path wakes up to poll the fatal slot
/// while waiting for the write queue to drain.
const SYNC_DRAIN_POLL: Duration = Duration::from_millis(50);

/// One slot in the read-data queue: `Err` carries a reader's permanent
/// failure to whoever is blocked in `read_get`.
type ReadSlot = Result<BackendReadResult, TransferError>;

/// Pipelined block transfer against one bucket of an object store.
pub struct ObjectBackendEngine {
    store: Box<dyn ObjectStore>,
    write_queue: Arc<BoundedQueue<Option<(ObjectUid, Vec<u8>)>>>,
    read_queue: Arc<BoundedQueue<Option<Block>>>,
    read_data_queue: Arc<BoundedQueue<ReadSlot>>,
    read_throttle: Arc<TokenBucket>,
    simultaneous_reads: WorkerCount,
    simultaneous_writes: WorkerCount,
    reader_status: Arc<StatusBoard>,
    writer_status: Arc<StatusBoard>,
    reader_handles: Mutex<Vec<JoinHandle<()>>>,
    writer_handles: Mutex<Vec<JoinHandle<()>>>,
    fatal: Arc<FatalSlot>,
    closed: AtomicBool,
}

impl ObjectBackendEngine {
    /// Spawns both worker pools against the given store provider.
    ///
    /// The engine opens one store session up front for its synchronous
    /// operations; every worker opens its own session lazily on its first
    /// job.
    pub fn new(
        config: &BackendConfig,
        provider: Arc<dyn ObjectStoreProvider>,
    ) -> Result<Self, TransferError> {
        let simultaneous_reads = WorkerCount::new(config.simultaneous_reads);
        let simultaneous_writes = WorkerCount::new(config.simultaneous_writes);

        let store = provider.open_store()?;
        let write_queue = Arc::new(BoundedQueue::bounded(
            simultaneous_writes.count() + WRITE_QUEUE_LENGTH,
        ));
        let read_queue = Arc::new(BoundedQueue::unbounded());
        let read_data_queue = Arc::new(BoundedQueue::bounded(
            simultaneous_reads.count() + READ_QUEUE_LENGTH,
        ));
        let read_throttle = Arc::new(TokenBucket::new(config.bandwidth_read));
        let write_throttle = Arc::new(TokenBucket::new(config.bandwidth_write));
        let reader_status = Arc::new(StatusBoard::new(simultaneous_reads.count()));
        let writer_status = Arc::new(StatusBoard::new(simultaneous_writes.count()));
        let fatal = Arc::new(FatalSlot::new());

        let mut writer_handles = Vec::with_capacity(simultaneous_writes.count());
        for worker in 0..simultaneous_writes.count() {
            let context = WriterContext {
                worker,
                provider: Arc::clone(&provider),
                queue: Arc::clone(&write_queue),
                throttle: Arc::clone(&write_throttle),
                status: Arc::clone(&writer_status),
                fatal: Arc::clone(&fatal),
            };
            let handle = thread::Builder::new()
                .name(format!("backend-writer-{worker}"))
                .spawn(move || writer_loop(context))
                .map_err(|e| {
                    TransferError::io_error(format!("cannot spawn backend writer: {e}"))
                })?;
            writer_handles.push(handle);
        }

        let mut reader_handles = Vec::with_capacity(simultaneous_reads.count());
        for worker in 0..simultaneous_reads.count() {
            let context = ReaderContext {
                worker,
                provider: Arc::clone(&provider),
                submit: Arc::clone(&read_queue),
                results: Arc::clone(&read_data_queue),
                throttle: Arc::clone(&read_throttle),
                status: Arc::clone(&reader_status),
                fatal: Arc::clone(&fatal),
            };
            let handle = thread::Builder::new()
                .name(format!("backend-reader-{worker}"))
                .spawn(move || reader_loop(context))
                .map_err(|e| {
                    TransferError::io_error(format!("cannot spawn backend reader: {e}"))
                })?;
            reader_handles.push(handle);
        }

        Ok(Self {
            store,
            write_queue,
            read_queue,
            read_data_queue,
            read_throttle,
            simultaneous_reads,
            simultaneous_writes,
            reader_status,
            writer_status,
            reader_handles: Mutex::new(reader_handles),
            writer_handles: Mutex::new(writer_handles),
            fatal,
            closed: AtomicBool::new(false),
        })
    }

    /// Convenience constructor wiring the S3 store from `config`.
    pub fn s3(config: &BackendConfig) -> Result<Self, TransferError> {
        let provider = Arc::new(crate::infrastructure::backend::s3::S3StoreProvider::from_config(
            config,
        )?);
        Self::new(config, provider)
    }

    /// Enqueues `data` under a freshly generated uid and returns that uid.
    ///
    /// # Errors
    ///
    /// Returns the recorded fatal error immediately once the engine is
    /// poisoned; the data is not enqueued in that case.
    pub fn save(&self, data: Vec<u8>) -> Result<ObjectUid, TransferError> {
        self.ensure_not_closed()?;
        self.fatal.check()?;
        let uid = ObjectUid::generate();
        self.write_queue.put(Some((uid.clone(), data)));
        Ok(uid)
    }

    /// Like [`save`](Self::save), but waits until the write queue has fully
    /// drained before returning.
    pub fn save_sync(&self, data: Vec<u8>) -> Result<ObjectUid, TransferError> {
        let uid = self.save(data)?;
        while !self.write_queue.join_timeout(SYNC_DRAIN_POLL) {
            self.fatal.check()?;
        }
        // A failure on the final queued write lands after the join.
        self.fatal.check()?;
        Ok(uid)
    }

    /// Enqueues a read job for `block`, which must carry a uid.
    pub fn read(&self, block: Block) -> Result<(), TransferError> {
        self.ensure_not_closed()?;
        self.fatal.check()?;
        if block.uid().is_none() {
            return Err(TransferError::programming(format!(
                "read submitted for {block} which has no uid"
            )));
        }
        self.read_queue.put(Some(block));
        Ok(())
    }

    /// Reads one block synchronously: enqueues it and drains the next
    /// result.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ProgrammingError`] when the drained result belongs
    ///   to a different block (threaded and sync reads were mixed)
    /// - [`TransferError::KeyNotFound`] when the block's uid is absent from
    ///   the store
    pub fn read_sync(&self, block: Block) -> Result<Vec<u8>, TransferError> {
        self.read(block.clone())?;
        let result = self.read_get()?;
        if result.block.id() != block.id() {
            return Err(TransferError::programming(
                "do not mix threaded reading with sync reading",
            ));
        }
        result
            .data
            .ok_or_else(|| TransferError::key_not_found(format!("{block} not found")))
    }

    /// Removes and returns the next completed read. Blocks while none is
    /// available.
    ///
    /// # Errors
    ///
    /// The permanent failure a reader worker died on, once the engine is
    /// poisoned; the same error keeps coming back for every job that was
    /// in flight when the worker stopped.
    pub fn read_get(&self) -> Result<BackendReadResult, TransferError> {
        self.ensure_not_closed()?;
        let result = self.read_data_queue.get();
        self.read_data_queue.task_done();
        result
    }

    /// Synchronous, retrying read used by non-pipelined code paths.
    ///
    /// Retries transient transport errors indefinitely (logging each
    /// attempt); a missing key or permanent provider error is returned.
    /// Read throttling applies after a successful fetch.
    pub fn read_raw(&self, uid: &ObjectUid) -> Result<Vec<u8>, TransferError> {
        let data = fetch_with_retry(self.store.as_ref(), uid)?;
        thread::sleep(self.read_throttle.consume(data.len()));
        Ok(data)
    }

    /// Deletes one object, first HEADing it so a missing key surfaces as a
    /// deterministic [`TransferError::KeyNotFound`].
    pub fn rm(&self, uid: &ObjectUid) -> Result<(), TransferError> {
        self.store.head(uid.as_str())?;
        self.store.delete(uid.as_str())
    }

    /// Deletes many objects, returning the uids that could not be deleted.
    // TODO: batch via DeleteObjects once the stores we target support it
    pub fn rm_many(&self, uids: &[ObjectUid]) -> Vec<ObjectUid> {
        let mut failed = Vec::new();
        for uid in uids {
            if let Err(e) = self.rm(uid) {
                warn!(uid = %uid, %e, "failed to delete object");
                failed.push(uid.clone());
            }
        }
        failed
    }

    /// Lists every object key in the bucket, optionally restricted to a
    /// prefix.
    pub fn get_all_blob_uids(&self, prefix: Option<&str>) -> Result<Vec<String>, TransferError> {
        self.store.list(prefix)
    }

    /// Number of read jobs not yet picked up by a reader.
    pub fn read_queue_size(&self) -> usize {
        self.read_queue.len()
    }

    /// One line of worker/queue state for a TUI.
    pub fn thread_status(&self) -> String {
        format!(
            "Backend readers N:{} R:{} QL:{}  Backend writers N:{} W:{} T:{} QL:{}",
            self.reader_status.count(WorkerState::Nothing),
            self.reader_status.count(WorkerState::Reading),
            self.read_queue.len(),
            self.writer_status.count(WorkerState::Nothing),
            self.writer_status.count(WorkerState::Writing),
            self.writer_status.count(WorkerState::Throttling),
            self.write_queue.len(),
        )
    }

    /// Fill ratios of the read-data and write queues.
    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            read_fill: self.read_data_queue.fill_ratio(),
            write_fill: self.write_queue.fill_ratio(),
        }
    }

    /// Stops all workers (one sentinel each, writers first) and joins them.
    /// Idempotent; the engine is not reusable afterwards.
    pub fn close(&self) -> Result<(), TransferError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for _ in 0..self.simultaneous_writes.count() {
            self.write_queue.put(None);
        }
        for handle in self.writer_handles.lock().drain(..) {
            let _ = handle.join();
        }
        for _ in 0..self.simultaneous_reads.count() {
            self.read_queue.put(None);
        }
        for handle in self.reader_handles.lock().drain(..) {
            let _ = handle.join();
        }
        Ok(())
    }

    fn ensure_not_closed(&self) -> Result<(), TransferError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransferError::programming("engine used after close"));
        }
        Ok(())
    }
}

impl BlockTransport for ObjectBackendEngine {
    type WriteJob = (ObjectUid, Vec<u8>);
    type ReadResult = BackendReadResult;

    fn submit_read(&self, block: Block) -> Result<(), TransferError> {
        self.read(block)
    }

    fn submit_write(&self, job: Self::WriteJob) -> Result<(), TransferError> {
        self.ensure_not_closed()?;
        self.fatal.check()?;
        self.write_queue.put(Some(job));
        Ok(())
    }

    fn get_result(&self) -> Result<Self::ReadResult, TransferError> {
        self.read_get()
    }

    fn thread_status(&self) -> String {
        ObjectBackendEngine::thread_status(self)
    }

    fn queue_status(&self) -> QueueStatus {
        ObjectBackendEngine::queue_status(self)
    }

    fn close(&self) -> Result<(), TransferError> {
        ObjectBackendEngine::close(self)
    }
}

/// The unbounded retry loop shared by `read_raw` and the reader workers.
fn fetch_with_retry(store: &dyn ObjectStore, uid: &ObjectUid) -> Result<Vec<u8>, TransferError> {
    loop {
        match store.get(uid.as_str()) {
            Ok(data) => return Ok(data),
            Err(e) if e.is_transient() => {
                warn!(uid = %uid, %e, "transient error while fetching from backend, trying again");
            }
            Err(e) => return Err(e),
        }
    }
}

struct WriterContext {
    worker: usize,
    provider: Arc<dyn ObjectStoreProvider>,
    queue: Arc<BoundedQueue<Option<(ObjectUid, Vec<u8>)>>>,
    throttle: Arc<TokenBucket>,
    status: Arc<StatusBoard>,
    fatal: Arc<FatalSlot>,
}

fn writer_loop(ctx: WriterContext) {
    let worker = ctx.worker;
    let mut session: Option<Box<dyn ObjectStore>> = None;
    loop {
        let entry = ctx.queue.get();

        // Once the engine is poisoned, jobs already accepted by save() are
        // drained and accounted for (the recorded error covers them), and
        // the worker only exits on its close() sentinel.
        if ctx.fatal.is_set() {
            match entry {
                Some((uid, _)) => {
                    warn!(worker, uid = %uid, "backend writer dropping job queued before poisoning");
                    ctx.queue.task_done();
                    continue;
                }
                None => {
                    debug!(worker, "backend writer finishing");
                    break;
                }
            }
        }
        let Some((uid, data)) = entry else {
            debug!(worker, "backend writer finishing");
            break;
        };

        if session.is_none() {
            ctx.status.set(worker, WorkerState::NewKey);
            match ctx.provider.open_store() {
                Ok(store) => session = Some(store),
                Err(e) => {
                    error!(worker, uid = %uid, %e, "backend writer cannot open store session");
                    ctx.fatal.record(e);
                    ctx.queue.task_done();
                    continue;
                }
            }
            ctx.status.set(worker, WorkerState::Nothing);
        }
        let Some(store) = session.as_deref() else {
            break;
        };

        ctx.status.set(worker, WorkerState::Throttling);
        thread::sleep(ctx.throttle.consume(data.len()));
        ctx.status.set(worker, WorkerState::Nothing);

        ctx.status.set(worker, WorkerState::Writing);
        if let Err(e) = store.put(uid.as_str(), &data) {
            ctx.status.set(worker, WorkerState::Nothing);
            error!(worker, uid = %uid, %e, "backend write failed; poisoning engine");
            ctx.fatal.record(e);
            ctx.queue.task_done();
            continue;
        }
        ctx.status.set(worker, WorkerState::Nothing);

        ctx.queue.task_done();
        debug!(worker, uid = %uid, queued = ctx.queue.len(), "backend writer stored object");
    }
}

struct ReaderContext {
    worker: usize,
    provider: Arc<dyn ObjectStoreProvider>,
    submit: Arc<BoundedQueue<Option<Block>>>,
    results: Arc<BoundedQueue<ReadSlot>>,
    throttle: Arc<TokenBucket>,
    status: Arc<StatusBoard>,
    fatal: Arc<FatalSlot>,
}

fn reader_loop(ctx: ReaderContext) {
    let worker = ctx.worker;
    let mut session: Option<Box<dyn ObjectStore>> = None;
    loop {
        let entry = ctx.submit.get();

        // Once the engine is poisoned, every remaining job still gets a
        // result - the recorded error - so a caller blocked in read_get is
        // woken instead of stranded. The worker only exits on its close()
        // sentinel.
        if ctx.fatal.is_set() {
            match entry {
                Some(block) => {
                    let err = ctx
                        .fatal
                        .get()
                        .unwrap_or_else(|| TransferError::backend_failure("engine poisoned"));
                    warn!(worker, block = block.id(), "backend reader failing job queued before poisoning");
                    ctx.results.put(Err(err));
                    ctx.submit.task_done();
                    continue;
                }
                None => {
                    debug!(worker, "backend reader finishing");
                    break;
                }
            }
        }
        let Some(block) = entry else {
            debug!(worker, "backend reader finishing");
            break;
        };

        if session.is_none() {
            ctx.status.set(worker, WorkerState::NewKey);
            match ctx.provider.open_store() {
                Ok(store) => session = Some(store),
                Err(e) => {
                    error!(worker, %e, "backend reader cannot open store session");
                    ctx.fatal.record(e.clone());
                    ctx.results.put(Err(e));
                    ctx.submit.task_done();
                    continue;
                }
            }
            ctx.status.set(worker, WorkerState::Nothing);
        }
        let Some(store) = session.as_deref() else {
            break;
        };

        // Submission requires a uid, so this only trips on a descriptor
        // forged without one.
        let Some(uid) = block.uid().cloned() else {
            let err = TransferError::programming(format!("{block} has no uid"));
            ctx.fatal.record(err.clone());
            ctx.results.put(Err(err));
            ctx.submit.task_done();
            continue;
        };

        ctx.status.set(worker, WorkerState::Reading);
        let outcome = fetch_with_retry(store, &uid);
        ctx.status.set(worker, WorkerState::Nothing);

        match outcome {
            Ok(data) => {
                ctx.status.set(worker, WorkerState::Throttling);
                thread::sleep(ctx.throttle.consume(data.len()));
                ctx.status.set(worker, WorkerState::Nothing);
                debug!(worker, uid = %uid, len = data.len(), "backend reader fetched object");
                ctx.results.put(Ok(BackendReadResult {
                    block,
                    data: Some(data),
                }));
                ctx.submit.task_done();
            }
            Err(e) if e.is_missing_key() => {
                debug!(worker, uid = %uid, "backend reader found no object");
                ctx.results.put(Ok(BackendReadResult { block, data: None }));
                ctx.submit.task_done();
            }
            Err(e) => {
                error!(worker, uid = %uid, %e, "backend read failed; poisoning engine");
                ctx.fatal.record(e.clone());
                ctx.results.put(Err(e));
                ctx.submit.task_done();
                continue;
            }
        }
    }
}
