use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{error, info};
use upload_meter_common::config::{LimitsConfig, StreamConfig};
use upload_meter_common::report::{UploadResult, UploadStatus};

use crate::capture::{FrameEncoder, FrameSource};
use crate::producer::{run_producer, ProducerError};
use crate::queue::FrameQueue;
use crate::uploader::Uploader;
use crate::worker::{run_worker, WorkerConfig};

/// Cooperative shutdown signal: set at most meaningfully once, observed
/// by producer, workers, and monitor. Nothing is ever interrupted
/// mid-flight; each loop notices the flag at its own checkpoint.
pub struct ShutdownSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Set the signal. Idempotent; only the first call logs and wakes waiters.
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("shutdown signal set");
            self.notify.notify_waiters();
        }
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until the signal is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        if self.is_set() {
            return;
        }
        let notified = self.notify.notified();
        // Re-check after registering, the trigger may have raced us.
        if self.is_set() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for one streaming session, passed explicitly to the
/// producer, workers, and monitor. The queue and the shutdown signal
/// are the only coordination points; everything else is counters and
/// the append-only result log.
pub struct SessionContext {
    pub queue: FrameQueue,
    pub shutdown: Arc<ShutdownSignal>,
    /// Cumulative payload bytes of successful uploads.
    bytes_sent: AtomicU64,
    /// Frames dropped at enqueue time because the queue was full.
    frames_dropped: AtomicU64,
    results: Mutex<Vec<UploadResult>>,
}

impl SessionContext {
    pub fn new(queue_size: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: FrameQueue::new(queue_size),
            shutdown: Arc::new(ShutdownSignal::new()),
            bytes_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            results: Mutex::new(Vec::new()),
        })
    }

    /// Append one upload result; successful uploads also advance the
    /// cumulative byte counter the stop criteria read.
    pub async fn record(&self, result: UploadResult) {
        if result.status == UploadStatus::Ok {
            self.bytes_sent.fetch_add(result.size_bytes, Ordering::Relaxed);
        }
        self.results.lock().await.push(result);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn count_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Take the full result log. Call only after all workers have stopped.
    pub async fn take_results(&self) -> Vec<UploadResult> {
        std::mem::take(&mut *self.results.lock().await)
    }
}

/// Run the producer and the worker pool to completion.
///
/// Returns once the producer has exited and every worker has drained
/// the queue. The resource monitor runs outside this function so the
/// caller can take its final sample after the join.
pub async fn run_pipeline(
    ctx: Arc<SessionContext>,
    source: Box<dyn FrameSource>,
    encoder: Box<dyn FrameEncoder>,
    uploader: Arc<dyn Uploader>,
    stream: StreamConfig,
    limits: LimitsConfig,
    prefix: String,
) -> Result<(), ProducerError> {
    let worker_config = WorkerConfig {
        prefix,
        max_retries: stream.retries,
        attempt_timeout: Duration::from_secs(stream.timeout_s),
    };

    let mut workers = Vec::with_capacity(stream.concurrency);
    for id in 0..stream.concurrency {
        workers.push(tokio::spawn(run_worker(
            id,
            ctx.clone(),
            uploader.clone(),
            worker_config.clone(),
        )));
    }

    let producer = tokio::spawn(run_producer(ctx.clone(), source, encoder, stream, limits));

    let produced = producer.await;
    // The producer triggers shutdown on every exit path; re-trigger here
    // so a panicked producer task cannot leave the workers waiting.
    ctx.shutdown.trigger();

    for worker in workers {
        if let Err(e) = worker.await {
            error!(error = %e, "worker task failed");
        }
    }

    match produced {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "producer task failed");
            Ok(())
        }
    }
}
