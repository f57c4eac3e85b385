//! Ingestion Pipeline - bounded queue fan-out into batching store workers
//!
//! # Architecture
//!
//! ```text
//!                                           ┌──────────────┐
//!                                     ┌───▶ │  Worker 0    │ ──batch──▶ store()
//! ┌──────────────┐   record_queue     │     └──────────────┘
//! │   Producer   │ ──────────────────▶├───▶ │  Worker 1    │ ──batch──▶ store()
//! │ (caller thr) │  (ArrayQueue, cap) │     └──────────────┘
//! └──────────────┘                    └───▶ │  Worker W-1  │ ──batch──▶ store()
//!                                           └──────────────┘
//! ```
//!
//! # Key Design
//!
//! - **Single Producer, Multiple Consumers**: one reader of the source, `W` workers
//! - **Bounded**: queue capacity caps the records held in flight
//! - **Backpressure**: producer spins/yields while the queue is full
//! - **Batch atomicity only**: each worker commits `B` records per transaction;
//!   there is no ordering between batches of different workers
//! - **Fail-stop**: the first store failure aborts the run. Nothing is retried;
//!   re-running from the source is idempotent because stores overwrite.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;
use thiserror::Error;

use crate::config::IngestConfig;
use crate::error::IndexError;
use crate::security::SecurityRecord;
use crate::storage::Storer;

/// Log ingest progress every N records
const PROGRESS_LOG_INTERVAL: u64 = 100_000;

/// Spins before yielding the CPU while waiting on the queue
const SPINS_BEFORE_YIELD: u32 = 100;

// ============================================================
// ERRORS
// ============================================================

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid ingest config: {0}")]
    Config(String),

    #[error("Failed to spawn ingest worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// A worker's batch commit failed; the run was stopped
    #[error("Worker {worker} failed to store a batch of {batch_len} records: {source}")]
    Store {
        worker: usize,
        batch_len: usize,
        #[source]
        source: IndexError,
    },

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

// ============================================================
// PIPELINE STATISTICS
// ============================================================

/// Statistics for one ingestion run
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Records pushed into the queue by the producer
    pub records_ingested: AtomicU64,
    /// Records inside committed batches
    pub records_stored: AtomicU64,
    /// Committed batches
    pub batches_committed: AtomicU64,
    /// Queue full events (backpressure)
    pub backpressure_events: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_ingested(&self) {
        let count = self.records_ingested.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(
                ingested = count,
                stored = self.records_stored.load(Ordering::Relaxed),
                "Ingest progress"
            );
        }
    }

    pub fn add_committed(&self, records: usize) {
        self.records_stored
            .fetch_add(records as u64, Ordering::Relaxed);
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_backpressure(&self) {
        let count = self.backpressure_events.fetch_add(1, Ordering::Relaxed);
        if count % 10000 == 0 {
            tracing::debug!(total_backpressure = count + 1, "Backpressure detected (1/10000)");
        }
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            records_ingested: self.records_ingested.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of stats (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub records_ingested: u64,
    pub records_stored: u64,
    pub batches_committed: u64,
    pub backpressure_events: u64,
}

impl std::fmt::Display for PipelineStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ingest Stats: ingested={}, stored={}, batches={}, backpressure={}",
            self.records_ingested,
            self.records_stored,
            self.batches_committed,
            self.backpressure_events
        )
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub stats: PipelineStatsSnapshot,
    pub elapsed: Duration,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            self.stats.records_stored as f64 / secs
        } else {
            0.0
        };
        write!(f, "{} in {:.2}s ({:.0} records/s)", self.stats, secs, rate)
    }
}

// ============================================================
// SIGNALING
// ============================================================

/// Producer → worker signals
#[derive(Debug, Default)]
pub struct PipelineSignal {
    /// Producer has pushed its last record
    input_closed: AtomicBool,
    /// A worker failed; everyone stops
    aborted: AtomicBool,
}

impl PipelineSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close_input(&self) {
        self.input_closed.store(true, Ordering::SeqCst);
    }

    pub fn is_input_closed(&self) -> bool {
        self.input_closed.load(Ordering::SeqCst)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Closes the input when the producer leaves, including by panic.
struct CloseInputOnDrop<'a>(&'a PipelineSignal);

impl Drop for CloseInputOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close_input();
    }
}

/// Aborts the run if a worker unwinds, so the producer does not wait forever.
struct AbortOnPanic<'a>(&'a PipelineSignal);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

// ============================================================
// QUEUE OPERATIONS WITH BACKPRESSURE
// ============================================================

#[inline]
fn idle(spin_count: &mut u32) {
    *spin_count += 1;
    if *spin_count > SPINS_BEFORE_YIELD {
        thread::yield_now();
        *spin_count = 0;
    } else {
        std::hint::spin_loop();
    }
}

/// Push with spin/yield backpressure.
///
/// Returns `false` (dropping the record) if the run was aborted while waiting.
fn push_with_backpressure(
    queue: &ArrayQueue<SecurityRecord>,
    record: SecurityRecord,
    stats: &PipelineStats,
    signal: &PipelineSignal,
) -> bool {
    let mut record = record;
    let mut spin_count = 0u32;
    loop {
        match queue.push(record) {
            Ok(()) => return true,
            Err(returned) => {
                if signal.is_aborted() {
                    return false;
                }
                record = returned;
                stats.incr_backpressure();
                idle(&mut spin_count);
            }
        }
    }
}

// ============================================================
// WORKER
// ============================================================

struct Worker<S> {
    id: usize,
    store: Arc<S>,
    queue: Arc<ArrayQueue<SecurityRecord>>,
    signal: Arc<PipelineSignal>,
    stats: Arc<PipelineStats>,
    batch_size: usize,
}

impl<S: Storer> Worker<S> {
    fn run(self) -> Result<(), PipelineError> {
        let _guard = AbortOnPanic(&self.signal);
        let mut batch: Vec<SecurityRecord> = Vec::with_capacity(self.batch_size);
        let mut spin_count = 0u32;

        loop {
            if self.signal.is_aborted() {
                tracing::debug!(worker = self.id, pending = batch.len(), "Worker stopping on abort");
                return Ok(());
            }

            match self.queue.pop() {
                Some(record) => {
                    spin_count = 0;
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        self.commit(&mut batch)?;
                    }
                }
                None => {
                    // Flag first, then emptiness: once closed is seen, every push is visible
                    if self.signal.is_input_closed() && self.queue.is_empty() {
                        break;
                    }
                    idle(&mut spin_count);
                }
            }
        }

        // Final partial batch
        if !batch.is_empty() {
            self.commit(&mut batch)?;
        }
        tracing::debug!(worker = self.id, "Worker drained");
        Ok(())
    }

    fn commit(&self, batch: &mut Vec<SecurityRecord>) -> Result<(), PipelineError> {
        if let Err(source) = self.store.store(batch) {
            self.signal.abort();
            tracing::error!(worker = self.id, batch_len = batch.len(), error = %source, "Batch commit failed, aborting ingest");
            return Err(PipelineError::Store {
                worker: self.id,
                batch_len: batch.len(),
                source,
            });
        }
        self.stats.add_committed(batch.len());
        batch.clear();
        Ok(())
    }
}

// ============================================================
// PIPELINE RUNNER
// ============================================================

/// Run a full ingestion: stream `records` into `store` with `config.workers`
/// parallel batch writers.
///
/// The producer runs on the calling thread. Returns once every worker has
/// committed its final partial batch, or with the first failure.
pub fn run_ingestion<S, I>(
    store: Arc<S>,
    records: I,
    config: &IngestConfig,
) -> Result<IngestReport, PipelineError>
where
    S: Storer + 'static,
    I: IntoIterator<Item = SecurityRecord>,
{
    config.validate().map_err(PipelineError::Config)?;

    let started = Instant::now();
    let queue = Arc::new(ArrayQueue::new(config.queue_capacity));
    let signal = Arc::new(PipelineSignal::new());
    let stats = Arc::new(PipelineStats::new());

    tracing::info!(
        workers = config.workers,
        batch_size = config.batch_size,
        queue_capacity = config.queue_capacity,
        "Starting ingestion"
    );

    let mut handles: Vec<JoinHandle<Result<(), PipelineError>>> =
        Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        let worker = Worker {
            id,
            store: store.clone(),
            queue: queue.clone(),
            signal: signal.clone(),
            stats: stats.clone(),
            batch_size: config.batch_size,
        };
        match thread::Builder::new()
            .name(format!("ingest-{}", id))
            .spawn(move || worker.run())
        {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                signal.abort();
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(PipelineError::Spawn(e));
            }
        }
    }

    // ================================================================
    // Producer
    // ================================================================
    {
        let _close = CloseInputOnDrop(&signal);
        for record in records {
            if !push_with_backpressure(&queue, record, &stats, &signal) {
                tracing::warn!("Producer stopping: ingest aborted");
                break;
            }
            stats.incr_ingested();
        }
    }

    // ================================================================
    // Join all workers
    // ================================================================
    let mut first_error: Option<PipelineError> = None;
    for (id, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(PipelineError::WorkerPanicked(id)),
        };
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    let report = IngestReport {
        stats: stats.snapshot(),
        elapsed: started.elapsed(),
    };
    tracing::info!("{}", report);
    Ok(report)
}

// ============================================================
// TESTS
// ============================================================
