mod capture;
mod monitor;
mod producer;
mod queue;
mod rate;
mod report;
mod session;
mod summary;
mod uploader;
mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use upload_meter_common::config::Config;

use capture::{FrameEncoder, FrameSource, HttpFrameSource, JpegEncoder};
use monitor::ResourceMonitor;
use session::{run_pipeline, SessionContext};
use uploader::S3Uploader;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        bucket = config.storage.bucket,
        prefix = config.storage.prefix,
        camera = config.camera.url,
        concurrency = config.stream.concurrency,
        init_fps = config.stream.init_fps,
        queue_size = config.stream.queue_size,
        max_seconds = config.limits.max_seconds,
        max_mb = config.limits.max_mb,
        "starting upload-meter streaming session"
    );

    let outdir = Path::new(&config.output.dir);
    if let Err(e) = std::fs::create_dir_all(outdir) {
        error!(error = %e, dir = config.output.dir, "failed to create output directory");
        std::process::exit(1);
    }

    let uploader = Arc::new(S3Uploader::new(&config.storage).await);
    if let Err(e) = uploader.ensure_bucket().await {
        error!(error = %e, "failed to ensure destination bucket exists");
        std::process::exit(1);
    }

    let source = match HttpFrameSource::new(&config.camera) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to set up camera source");
            std::process::exit(1);
        }
    };
    let encoder = JpegEncoder::new(config.camera.quality);
    info!(
        source = source.name(),
        encoder = encoder.name(),
        "capture backends initialized"
    );

    let monitor = match ResourceMonitor::create(
        &outdir.join("sys_metrics.csv"),
        Duration::from_secs_f64(config.monitor.sys_interval_s),
        config.monitor.nic.clone(),
    ) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "failed to start resource monitor");
            std::process::exit(1);
        }
    };

    let ctx = SessionContext::new(config.stream.queue_size);
    let started = std::time::Instant::now();
    let monitor_task = tokio::spawn(monitor.run(ctx.shutdown.clone()));

    let pipeline_result = run_pipeline(
        ctx.clone(),
        Box::new(source),
        Box::new(encoder),
        uploader,
        config.stream.clone(),
        config.limits.clone(),
        config.storage.prefix.clone(),
    )
    .await;
    let wall_seconds = started.elapsed().as_secs_f64();

    if let Err(e) = &pipeline_result {
        error!(error = %e, "pipeline terminated on a fatal capture error");
    }

    // Producer and workers are done; take the final counter sample so the
    // last sys_metrics row spans the whole session.
    match monitor_task.await {
        Ok(mut monitor) => {
            monitor.sample_once();
        }
        Err(e) => warn!(error = %e, "resource monitor task failed"),
    }

    let results = ctx.take_results().await;
    let summary = summary::aggregate(&results, wall_seconds, &config);

    if let Err(e) = report::write_uploads_log(&outdir.join("uploads_log.csv"), &results) {
        error!(error = %e, "failed to write uploads log");
    }
    if let Err(e) = report::write_summary(&outdir.join("summary.json"), &summary) {
        error!(error = %e, "failed to write summary");
    }

    info!(
        frames_total = summary.frames_total,
        frames_failed = summary.frames_failed,
        frames_dropped = ctx.frames_dropped(),
        bytes_total = summary.bytes_total,
        wall_seconds = format!("{:.1}", summary.wall_seconds),
        throughput_mbps = format!("{:.3}", summary.throughput_mbps_wall),
        outdir = config.output.dir,
        "session summary written"
    );

    if pipeline_result.is_err() {
        std::process::exit(1);
    }
}
