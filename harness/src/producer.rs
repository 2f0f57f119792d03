use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use upload_meter_common::config::{LimitsConfig, StreamConfig};
use upload_meter_common::frame::Frame;

use crate::capture::{CaptureError, FrameEncoder, FrameSource};
use crate::queue::Enqueue;
use crate::rate::RateController;
use crate::session::SessionContext;

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("frame capture failed: {0}")]
    Capture(#[from] CaptureError),
}

/// Capture loop: one frame per cycle, paced by the rate controller.
///
/// capture -> encode -> enqueue -> rate adjust -> stop check -> sleep.
/// A capture error is fatal (a dead source cannot be retried into
/// existence); an encode error skips the cycle; a full queue drops the
/// frame and moves on. The shutdown signal is triggered on every exit
/// path so the workers always get to drain and stop.
pub async fn run_producer(
    ctx: Arc<SessionContext>,
    mut source: Box<dyn FrameSource>,
    encoder: Box<dyn FrameEncoder>,
    stream: StreamConfig,
    limits: LimitsConfig,
) -> Result<(), ProducerError> {
    let mut rate = RateController::new(stream.init_fps, stream.min_fps, stream.max_fps);
    let max_duration = Duration::from_secs(limits.max_seconds);
    let max_bytes = limits.max_mb * 1024 * 1024;
    let started = Instant::now();
    let mut seq: u64 = 0;

    let result = loop {
        if ctx.shutdown.is_set() {
            break Ok(());
        }
        let cycle_start = Instant::now();

        let raw = match source.capture().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!(produced = seq, "frame source exhausted, stopping");
                break Ok(());
            }
            Err(e) => {
                error!(error = %e, "frame capture failed, stopping");
                break Err(e.into());
            }
        };

        match encoder.encode(&raw) {
            Ok(data) => {
                let frame = Frame::new(data, Utc::now(), seq);
                if ctx.queue.enqueue(frame).await == Enqueue::Dropped {
                    ctx.count_dropped_frame();
                    debug!(seq, "queue full, dropped frame");
                }
                seq += 1;
            }
            Err(e) => {
                warn!(error = %e, "encode failed, skipping frame");
            }
        }

        let occupancy = ctx.queue.occupancy().await;
        if rate.update(occupancy, ctx.queue.capacity()) {
            debug!(fps = rate.current_fps(), occupancy, "adjusted capture rate");
        }

        if started.elapsed() >= max_duration {
            info!(produced = seq, "time limit reached, stopping");
            break Ok(());
        }
        if ctx.bytes_sent() > max_bytes {
            info!(produced = seq, sent = ctx.bytes_sent(), "size limit reached, stopping");
            break Ok(());
        }

        // Pace against the target interval, net of this cycle's own cost.
        let elapsed = cycle_start.elapsed();
        let interval = rate.interval();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    };

    ctx.shutdown.trigger();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::EncodeError;
    use async_trait::async_trait;

    struct FailingSource;

    #[async_trait]
    impl FrameSource for FailingSource {
        async fn capture(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
            Err(CaptureError::HttpStatus(503))
        }
    }

    struct Passthrough;

    impl FrameEncoder for Passthrough {
        fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
            Ok(raw.to_vec())
        }
    }

    struct EndlessSource;

    #[async_trait]
    impl FrameSource for EndlessSource {
        async fn capture(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
            Ok(Some(vec![0u8; 8]))
        }
    }

    fn stream(queue_size: usize) -> StreamConfig {
        StreamConfig {
            concurrency: 1,
            retries: 0,
            timeout_s: 5,
            init_fps: 30,
            min_fps: 1,
            max_fps: 30,
            queue_size,
        }
    }

    #[tokio::test]
    async fn capture_error_is_fatal_and_triggers_shutdown() {
        let ctx = SessionContext::new(4);
        let err = run_producer(
            ctx.clone(),
            Box::new(FailingSource),
            Box::new(Passthrough),
            stream(4),
            LimitsConfig {
                max_seconds: 60,
                max_mb: 500,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProducerError::Capture(_)));
        assert!(ctx.shutdown.is_set());
    }

    #[tokio::test]
    async fn overflow_frames_are_counted_as_dropped() {
        let ctx = SessionContext::new(2);
        // No workers draining: only the first two frames fit.
        run_producer(
            ctx.clone(),
            Box::new(ScriptedN { left: 5 }),
            Box::new(Passthrough),
            stream(2),
            LimitsConfig {
                max_seconds: 60,
                max_mb: 500,
            },
        )
        .await
        .unwrap();
        assert_eq!(ctx.queue.occupancy().await, 2);
        assert_eq!(ctx.frames_dropped(), 3);
    }

    struct ScriptedN {
        left: usize,
    }

    #[async_trait]
    impl FrameSource for ScriptedN {
        async fn capture(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
            if self.left == 0 {
                return Ok(None);
            }
            self.left -= 1;
            Ok(Some(vec![1u8; 4]))
        }
    }

    #[tokio::test]
    async fn external_shutdown_stops_the_producer() {
        let ctx = SessionContext::new(4);
        ctx.shutdown.trigger();
        run_producer(
            ctx.clone(),
            Box::new(EndlessSource),
            Box::new(Passthrough),
            stream(4),
            LimitsConfig {
                max_seconds: 60,
                max_mb: 500,
            },
        )
        .await
        .unwrap();
        assert_eq!(ctx.queue.occupancy().await, 0);
    }
}
