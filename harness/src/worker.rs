use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use upload_meter_common::frame::Frame;
use upload_meter_common::report::{UploadResult, UploadStatus};

use crate::session::SessionContext;
use crate::uploader::Uploader;

/// How long a worker waits on an empty queue before re-checking shutdown.
const DEQUEUE_WAIT: Duration = Duration::from_millis(500);
/// Backoff between attempts is capped here regardless of attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Destination prefix for blob names.
    pub prefix: String,
    pub max_retries: u32,
    pub attempt_timeout: Duration,
}

/// One upload worker: drain the queue, upload with retry, record results.
///
/// Exits only when the shutdown signal is set and the queue is observed
/// empty — frames enqueued before shutdown are never discarded.
pub async fn run_worker(
    id: usize,
    ctx: Arc<SessionContext>,
    uploader: Arc<dyn Uploader>,
    config: WorkerConfig,
) {
    loop {
        if ctx.shutdown.is_set() && ctx.queue.is_empty().await {
            break;
        }
        let frame = match ctx.queue.dequeue(DEQUEUE_WAIT).await {
            Some(frame) => frame,
            None => continue,
        };

        let blob = frame.blob_name(&config.prefix);
        let result = upload_with_retry(
            uploader.as_ref(),
            &frame,
            &blob,
            config.max_retries,
            config.attempt_timeout,
        )
        .await;

        info!(
            worker = id,
            blob = result.blob,
            status = result.status.as_str(),
            duration_s = format!("{:.2}", result.duration_s),
            retries = result.retries,
            "frame upload finished"
        );
        ctx.record(result).await;
    }
    debug!(worker = id, "queue drained, worker exiting");
}

/// Run the attempt sequence for one frame: up to `max_retries + 1`
/// attempts with bounded exponential backoff in between. The outcome is
/// always a result value — upload errors never propagate past here.
pub async fn upload_with_retry(
    uploader: &dyn Uploader,
    frame: &Frame,
    blob: &str,
    max_retries: u32,
    attempt_timeout: Duration,
) -> UploadResult {
    let start = Instant::now();
    let mut attempt: u32 = 0;
    let (status, retries, error) = loop {
        match uploader.upload(&frame.data, blob, attempt_timeout).await {
            Ok(()) => break (UploadStatus::Ok, attempt, String::new()),
            Err(e) => {
                if attempt >= max_retries {
                    break (UploadStatus::Fail, attempt, e.to_string());
                }
                attempt += 1;
                let backoff =
                    Duration::from_secs(1u64 << attempt.min(10)).min(MAX_BACKOFF);
                debug!(blob, attempt, backoff_s = backoff.as_secs(), error = %e, "upload failed, backing off");
                tokio::time::sleep(backoff).await;
            }
        }
    };

    UploadResult {
        blob: blob.to_string(),
        size_bytes: frame.size_bytes() as u64,
        duration_s: start.elapsed().as_secs_f64(),
        retries,
        status,
        error,
    }
}
