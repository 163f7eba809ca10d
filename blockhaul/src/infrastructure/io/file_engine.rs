// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File IO Engine
//!
//! Threaded block transfer against a local file treated as a sparse block
//! array. One engine instance is opened either for reading (backup source)
//! or for writing (restore target):
//!
//! - **Read mode** (`open_r`): an unbounded submission queue feeds
//!   `simultaneous_reads` reader threads. Each reader owns its descriptor,
//!   reads exactly one block per job at `block_id * block_size`, computes
//!   the content hash while the data is hot, drops the range from the page
//!   cache, and pushes the result into a bounded output queue. A full
//!   output queue blocks the readers, which in turn parks the producer -
//!   backpressure end to end.
//! - **Write mode** (`open_w`): a bounded queue feeds `simultaneous_writes`
//!   writer threads sharing one read+write descriptor. Writes are
//!   positional, so disjoint block offsets never contend; callers must not
//!   enqueue two writes for the same block id.
//!
//! ## Failure Model
//!
//! Local I/O is never retried. A short read on an in-bounds block or a
//! short write is fatal: the worker parks the error (readers push it into
//! the result stream, writers poison the engine) and stops. Mixing
//! synchronous and threaded reads is detected by an id mismatch and
//! reported as a programming error.
//!
//! ## Shutdown
//!
//! `close` pushes one `None` sentinel per worker and joins the pool.
//! Readers forward one sentinel each into the result queue, so a consumer
//! draining `get` sees every completed block followed by exactly
//! `simultaneous_reads` end-of-stream markers.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, error};

use blockhaul_domain::{
    Block, BlockHasher, BlockSize, BlockTransport, FileReadResult, QueueStatus, TransferError,
    WorkerCount, WorkerState,
};

use crate::infrastructure::config::FileIoConfig;
use crate::infrastructure::io::platform;
use crate::infrastructure::runtime::bounded_queue::BoundedQueue;
use crate::infrastructure::runtime::fatal_slot::FatalSlot;
use crate::infrastructure::runtime::worker_status::StatusBoard;

/// Result-queue headroom beyond one slot per reader.
const READ_QUEUE_LENGTH: usize = 20;
/// Write-queue headroom beyond one slot per writer.
const WRITE_QUEUE_LENGTH: usize = 20;

static FILE_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new("^file://(.+)$").expect("file uri regex is valid"));

/// One slot in the reader result queue: `None` is the end-of-stream
/// sentinel, `Some(Err(_))` carries a reader's fatal error to the consumer.
type ResultSlot = Option<Result<FileReadResult, TransferError>>;

struct ReadPipeline {
    submit: Arc<BoundedQueue<Option<Block>>>,
    results: Arc<BoundedQueue<ResultSlot>>,
    status: Arc<StatusBoard>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

struct WritePipeline {
    queue: Arc<BoundedQueue<Option<(Block, Vec<u8>)>>>,
    status: Arc<StatusBoard>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    file: Arc<File>,
}

/// Pipelined block IO against a local file or block-device image.
pub struct FileIoEngine {
    block_size: BlockSize,
    hasher: Arc<dyn BlockHasher>,
    simultaneous_reads: WorkerCount,
    simultaneous_writes: WorkerCount,
    path: Option<PathBuf>,
    readers: Option<ReadPipeline>,
    writers: Option<WritePipeline>,
    fatal: Arc<FatalSlot>,
    closed: AtomicBool,
}

impl FileIoEngine {
    /// Creates an engine; no worker runs until `open_r` or `open_w`.
    pub fn new(config: FileIoConfig, block_size: BlockSize, hasher: Arc<dyn BlockHasher>) -> Self {
        Self {
            block_size,
            hasher,
            simultaneous_reads: WorkerCount::new(config.simultaneous_reads),
            simultaneous_writes: WorkerCount::new(config.simultaneous_writes),
            path: None,
            readers: None,
            writers: None,
            fatal: Arc::new(FatalSlot::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a `file://` source for reading and starts the reader pool.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidUri`] when `uri` is not a `file://` uri
    /// - [`TransferError::IoError`] when the source cannot be opened
    /// - [`TransferError::ProgrammingError`] when the engine is already open
    pub fn open_r(&mut self, uri: &str) -> Result<(), TransferError> {
        self.ensure_unopened()?;
        let path = parse_file_uri(uri)?;
        // Fail here, not in every worker, when the source is absent.
        File::open(&path).map_err(|e| {
            TransferError::io_error(format!("cannot open source {}: {e}", path.display()))
        })?;

        let submit = Arc::new(BoundedQueue::unbounded());
        let results = Arc::new(BoundedQueue::bounded(
            self.simultaneous_reads.count() + READ_QUEUE_LENGTH,
        ));
        let status = Arc::new(StatusBoard::new(self.simultaneous_reads.count()));

        let mut handles = Vec::with_capacity(self.simultaneous_reads.count());
        for worker in 0..self.simultaneous_reads.count() {
            let context = ReaderContext {
                worker,
                path: path.clone(),
                block_size: self.block_size,
                hasher: Arc::clone(&self.hasher),
                submit: Arc::clone(&submit),
                results: Arc::clone(&results),
                status: Arc::clone(&status),
            };
            let spawned = std::thread::Builder::new()
                .name(format!("io-reader-{worker}"))
                .spawn(move || reader_loop(context));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for _ in &handles {
                        submit.put(None);
                    }
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(TransferError::io_error(format!(
                        "cannot spawn reader thread: {e}"
                    )));
                }
            }
        }

        self.path = Some(path);
        self.readers = Some(ReadPipeline {
            submit,
            results,
            status,
            handles: Mutex::new(handles),
        });
        Ok(())
    }

    /// Opens a `file://` restore target for writing and starts the writer
    /// pool.
    ///
    /// The target must end up with length >= `size`: a missing path is
    /// created as a sparse file of exactly `size` bytes; an existing path
    /// requires `force` and must not be smaller than `size`.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidUri`] when `uri` is not a `file://` uri
    /// - [`TransferError::TargetExists`] when the path exists and `force`
    ///   is unset
    /// - [`TransferError::TargetTooSmall`] when the existing target is
    ///   shorter than `size`
    pub fn open_w(&mut self, uri: &str, size: u64, force: bool) -> Result<(), TransferError> {
        self.ensure_unopened()?;
        let path = parse_file_uri(uri)?;

        if path.exists() {
            if !force {
                return Err(TransferError::TargetExists(format!(
                    "{}; restore into an existing target must be forced",
                    path.display()
                )));
            }
            let current = std::fs::metadata(&path)?.len();
            if current < size {
                return Err(TransferError::TargetTooSmall(format!(
                    "{} holds {current} bytes, need {size}",
                    path.display()
                )));
            }
        } else {
            let mut file = File::create(&path)?;
            if size > 0 {
                file.seek(SeekFrom::Start(size - 1))?;
                file.write_all(&[0])?;
            }
        }

        let file = Arc::new(OpenOptions::new().read(true).write(true).open(&path)?);
        let queue = Arc::new(BoundedQueue::bounded(
            self.simultaneous_writes.count() + WRITE_QUEUE_LENGTH,
        ));
        let status = Arc::new(StatusBoard::new(self.simultaneous_writes.count()));

        let mut handles = Vec::with_capacity(self.simultaneous_writes.count());
        for worker in 0..self.simultaneous_writes.count() {
            let context = WriterContext {
                worker,
                file: Arc::clone(&file),
                block_size: self.block_size,
                queue: Arc::clone(&queue),
                status: Arc::clone(&status),
                fatal: Arc::clone(&self.fatal),
            };
            let spawned = std::thread::Builder::new()
                .name(format!("io-writer-{worker}"))
                .spawn(move || writer_loop(context));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for _ in &handles {
                        queue.put(None);
                    }
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(TransferError::io_error(format!(
                        "cannot spawn writer thread: {e}"
                    )));
                }
            }
        }

        self.path = Some(path);
        self.writers = Some(WritePipeline {
            queue,
            status,
            handles: Mutex::new(handles),
            file,
        });
        Ok(())
    }

    /// Enqueues a read job for `block`.
    pub fn read(&self, block: Block) -> Result<(), TransferError> {
        self.ensure_not_closed()?;
        let readers = self.require_readers()?;
        readers.submit.put(Some(block));
        Ok(())
    }

    /// Reads one block synchronously: enqueues it and drains the next
    /// result.
    ///
    /// # Errors
    ///
    /// [`TransferError::ProgrammingError`] when the drained result belongs
    /// to a different block - synchronous reads must not be mixed with
    /// threaded ones.
    pub fn read_sync(&self, block: Block) -> Result<Vec<u8>, TransferError> {
        self.read(block.clone())?;
        match self.get()? {
            Some(result) if result.block.id() == block.id() => Ok(result.data),
            Some(_) => Err(TransferError::programming(
                "do not mix threaded reading with sync reading",
            )),
            None => Err(TransferError::programming(
                "result stream ended while a sync read was pending",
            )),
        }
    }

    /// Removes and returns the next completed read.
    ///
    /// `Ok(None)` is one reader's end-of-stream sentinel; after
    /// `simultaneous_reads` of them no further result will ever appear.
    pub fn get(&self) -> Result<Option<FileReadResult>, TransferError> {
        let readers = self.require_readers()?;
        match readers.results.get() {
            None => Ok(None),
            Some(Ok(result)) => Ok(Some(result)),
            Some(Err(e)) => Err(e),
        }
    }

    /// Enqueues a write job; blocks while the write queue is full.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ProgrammingError`] when no writer is open or the
    ///   data exceeds the block size
    /// - the recorded fatal error when a writer has already failed
    pub fn write(&self, block: Block, data: Vec<u8>) -> Result<(), TransferError> {
        self.ensure_not_closed()?;
        let writers = self
            .writers
            .as_ref()
            .ok_or_else(|| TransferError::programming("file not open for writing"))?;
        if data.len() > self.block_size.bytes() {
            return Err(TransferError::programming(format!(
                "write of {} bytes exceeds block size {}",
                data.len(),
                self.block_size
            )));
        }
        self.fatal.check()?;
        writers.queue.put(Some((block, data)));
        Ok(())
    }

    /// Current byte length of the io target.
    pub fn size(&self) -> Result<u64, TransferError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| TransferError::programming("engine has no open target"))?;
        Ok(std::fs::metadata(path)?.len())
    }

    /// Block size this engine was created with.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// Stops all workers and joins them. Idempotent; the engine is not
    /// reusable afterwards.
    pub fn close(&self) -> Result<(), TransferError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(readers) = &self.readers {
            for _ in 0..self.simultaneous_reads.count() {
                readers.submit.put(None);
            }
            for handle in readers.handles.lock().drain(..) {
                let _ = handle.join();
            }
        }
        if let Some(writers) = &self.writers {
            for _ in 0..self.simultaneous_writes.count() {
                writers.queue.put(None);
            }
            for handle in writers.handles.lock().drain(..) {
                let _ = handle.join();
            }
            let _ = writers.file.sync_all();
        }
        Ok(())
    }

    /// One line of worker/queue state for a TUI.
    pub fn thread_status(&self) -> String {
        let (rn, rr, rs, rf) = match &self.readers {
            Some(p) => (
                p.status.count(WorkerState::Nothing),
                p.status.count(WorkerState::Reading),
                p.status.count(WorkerState::Seeking),
                p.status.count(WorkerState::Fadvise),
            ),
            None => (0, 0, 0, 0),
        };
        let (wn, ww, ws, wf, wq) = match &self.writers {
            Some(p) => (
                p.status.count(WorkerState::Nothing),
                p.status.count(WorkerState::Writing),
                p.status.count(WorkerState::Seeking),
                p.status.count(WorkerState::Fadvise),
                p.queue.len(),
            ),
            None => (0, 0, 0, 0, 0),
        };
        format!(
            "IO readers N:{rn} R:{rr} S:{rs} F:{rf}  IO writers N:{wn} W:{ww} S:{ws} F:{wf} QL:{wq}"
        )
    }

    /// Fill ratios of the result and write queues.
    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            read_fill: self
                .readers
                .as_ref()
                .map_or(0.0, |p| p.results.fill_ratio()),
            write_fill: self.writers.as_ref().map_or(0.0, |p| p.queue.fill_ratio()),
        }
    }

    fn require_readers(&self) -> Result<&ReadPipeline, TransferError> {
        self.readers
            .as_ref()
            .ok_or_else(|| TransferError::programming("file not open for reading"))
    }

    fn ensure_unopened(&self) -> Result<(), TransferError> {
        if self.readers.is_some() || self.writers.is_some() {
            return Err(TransferError::programming("engine is already open"));
        }
        self.ensure_not_closed()
    }

    fn ensure_not_closed(&self) -> Result<(), TransferError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransferError::programming("engine used after close"));
        }
        Ok(())
    }
}

impl BlockTransport for FileIoEngine {
    type WriteJob = (Block, Vec<u8>);
    type ReadResult = Option<FileReadResult>;

    fn submit_read(&self, block: Block) -> Result<(), TransferError> {
        self.read(block)
    }

    fn submit_write(&self, job: Self::WriteJob) -> Result<(), TransferError> {
        self.write(job.0, job.1)
    }

    fn get_result(&self) -> Result<Self::ReadResult, TransferError> {
        self.get()
    }

    fn thread_status(&self) -> String {
        FileIoEngine::thread_status(self)
    }

    fn queue_status(&self) -> QueueStatus {
        FileIoEngine::queue_status(self)
    }

    fn close(&self) -> Result<(), TransferError> {
        FileIoEngine::close(self)
    }
}

fn parse_file_uri(uri: &str) -> Result<PathBuf, TransferError> {
    match FILE_URI.captures(uri).and_then(|c| c.get(1)) {
        Some(path) => Ok(PathBuf::from(path.as_str())),
        None => Err(TransferError::invalid_uri(format!(
            "{uri}; need a file path, e.g. file:///somepath/image"
        ))),
    }
}

struct ReaderContext {
    worker: usize,
    path: PathBuf,
    block_size: BlockSize,
    hasher: Arc<dyn BlockHasher>,
    submit: Arc<BoundedQueue<Option<Block>>>,
    results: Arc<BoundedQueue<ResultSlot>>,
    status: Arc<StatusBoard>,
}

fn reader_loop(ctx: ReaderContext) {
    let worker = ctx.worker;
    // Each reader owns its descriptor so seeks never contend.
    let file = match File::open(&ctx.path) {
        Ok(file) => file,
        Err(e) => {
            ctx.results.put(Some(Err(TransferError::io_error(format!(
                "reader {worker} cannot open {}: {e}",
                ctx.path.display()
            )))));
            return;
        }
    };

    loop {
        let Some(block) = ctx.submit.get() else {
            debug!(worker, "io reader finishing");
            // Let the result stream end too.
            ctx.results.put(None);
            break;
        };

        let offset = ctx.block_size.offset_of(block.id());
        let mut data = vec![0u8; ctx.block_size.bytes()];

        ctx.status.set(worker, WorkerState::Seeking);
        ctx.status.set(worker, WorkerState::Reading);
        if let Err(e) = platform::read_exact_at(&file, &mut data, offset) {
            ctx.status.set(worker, WorkerState::Nothing);
            let err = if e.kind() == io::ErrorKind::UnexpectedEof {
                TransferError::ShortRead(format!(
                    "EOF on source at block {} while data was expected",
                    block.id()
                ))
            } else {
                TransferError::io_error(format!("read of block {} failed: {e}", block.id()))
            };
            error!(worker, %err, "io reader failed");
            ctx.results.put(Some(Err(err)));
            break;
        }

        ctx.status.set(worker, WorkerState::Fadvise);
        platform::drop_page_cache(&file, offset, ctx.block_size.bytes());
        ctx.status.set(worker, WorkerState::Nothing);

        let checksum = ctx.hasher.digest(&data);
        if block.is_valid() {
            debug!(
                worker,
                block = block.id(),
                len = data.len(),
                queued = ctx.submit.len(),
                "io reader read block"
            );
        } else {
            debug!(
                worker,
                block = block.id(),
                checksum = %checksum,
                "io reader re-read invalid block"
            );
        }

        ctx.results.put(Some(Ok(FileReadResult {
            block,
            data,
            checksum,
        })));
        ctx.submit.task_done();
    }
}

struct WriterContext {
    worker: usize,
    file: Arc<File>,
    block_size: BlockSize,
    queue: Arc<BoundedQueue<Option<(Block, Vec<u8>)>>>,
    status: Arc<StatusBoard>,
    fatal: Arc<FatalSlot>,
}

fn writer_loop(ctx: WriterContext) {
    let worker = ctx.worker;
    loop {
        let Some((block, data)) = ctx.queue.get() else {
            debug!(worker, "io writer finishing");
            break;
        };

        let offset = ctx.block_size.offset_of(block.id());
        ctx.status.set(worker, WorkerState::Seeking);
        ctx.status.set(worker, WorkerState::Writing);
        if let Err(e) = platform::write_all_at(&ctx.file, &data, offset) {
            ctx.status.set(worker, WorkerState::Nothing);
            let err = if e.kind() == io::ErrorKind::WriteZero {
                TransferError::ShortWrite(format!(
                    "wrote fewer bytes than offered at block {}",
                    block.id()
                ))
            } else {
                TransferError::io_error(format!("write of block {} failed: {e}", block.id()))
            };
            error!(worker, %err, "io writer failed; poisoning engine");
            ctx.fatal.record(err);
            ctx.queue.task_done();
            break;
        }

        ctx.status.set(worker, WorkerState::Fadvise);
        platform::drop_page_cache(&ctx.file, offset, data.len());
        ctx.status.set(worker, WorkerState::Nothing);
        ctx.queue.task_done();
        debug!(worker, block = block.id(), len = data.len(), "io writer wrote block");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockhaul_domain::Sha256BlockHasher;

    fn engine(reads: usize, writes: usize) -> FileIoEngine {
        FileIoEngine::new(
            FileIoConfig {
                simultaneous_reads: reads,
                simultaneous_writes: writes,
            },
            BlockSize::new(512).unwrap(),
            Arc::new(Sha256BlockHasher),
        )
    }

    #[test]
    fn test_parse_file_uri() {
        assert_eq!(
            parse_file_uri("file:///tmp/image.img").unwrap(),
            PathBuf::from("/tmp/image.img")
        );
        assert_eq!(
            parse_file_uri("file://relative/image.img").unwrap(),
            PathBuf::from("relative/image.img")
        );
        assert!(matches!(
            parse_file_uri("/tmp/image.img"),
            Err(TransferError::InvalidUri(_))
        ));
        assert!(matches!(
            parse_file_uri("file://"),
            Err(TransferError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_read_before_open_is_programming_error() {
        let engine = engine(1, 1);
        assert!(matches!(
            engine.read(Block::new(0)),
            Err(TransferError::ProgrammingError(_))
        ));
        assert!(matches!(
            engine.write(Block::new(0), vec![0; 16]),
            Err(TransferError::ProgrammingError(_))
        ));
    }

    #[test]
    fn test_open_r_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("file://{}/absent.img", dir.path().display());
        let mut engine = engine(1, 1);
        assert!(matches!(engine.open_r(&uri), Err(TransferError::IoError(_))));
    }

    #[test]
    fn test_oversized_write_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("file://{}/target.img", dir.path().display());
        let mut engine = engine(1, 1);
        engine.open_w(&uri, 4096, false).unwrap();
        assert!(matches!(
            engine.write(Block::new(0), vec![0; 513]),
            Err(TransferError::ProgrammingError(_))
        ));
        engine.close().unwrap();
    }

    #[test]
    fn test_use_after_close_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.img");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        let uri = format!("file://{}", path.display());

        let mut engine = engine(1, 1);
        engine.open_r(&uri).unwrap();
        engine.close().unwrap();
        assert!(matches!(
            engine.read(Block::new(0)),
            Err(TransferError::ProgrammingError(_))
        ));
        // close is idempotent
        engine.close().unwrap();
    }
}
