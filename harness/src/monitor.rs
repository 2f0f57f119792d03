use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sysinfo::{Networks, System};
use tracing::{debug, warn};
use upload_meter_common::report::SysSample;

use crate::session::ShutdownSignal;

pub const AGGREGATE_NIC: &str = "aggregate";

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("failed to open metrics file: {0}")]
    Open(std::io::Error),
    #[error("failed to write metrics row: {0}")]
    Write(std::io::Error),
}

/// Samples CPU, RAM, and cumulative NIC counters at a fixed cadence and
/// appends one CSV row per sample. Shares nothing with the pipeline
/// except the shutdown signal.
pub struct ResourceMonitor {
    system: System,
    networks: Networks,
    nic: Option<String>,
    writer: BufWriter<File>,
    interval: Duration,
}

impl ResourceMonitor {
    /// Open the metrics file, write the header, and prime the CPU
    /// measurement so the first sampled value is meaningful.
    pub fn create(
        path: &Path,
        interval: Duration,
        nic: Option<String>,
    ) -> Result<Self, MonitorError> {
        let file = File::create(path).map_err(MonitorError::Open)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", SysSample::CSV_HEADER).map_err(MonitorError::Write)?;
        writer.flush().map_err(MonitorError::Write)?;

        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        let networks = Networks::new_with_refreshed_list();

        Ok(Self {
            system,
            networks,
            nic,
            writer,
            interval,
        })
    }

    /// Sample until the shutdown signal is set, then hand the monitor
    /// back so the caller can take one final post-drain sample.
    pub async fn run(mut self, shutdown: Arc<ShutdownSignal>) -> Self {
        while !shutdown.is_set() {
            self.sample_once();
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => {}
            }
        }
        debug!("resource monitor stopped");
        self
    }

    /// Take one sample and append its CSV row. Write failures are logged
    /// and skipped — metrics must never take the pipeline down.
    pub fn sample_once(&mut self) -> SysSample {
        let sample = self.sample();
        if let Err(e) = self.write_row(&sample) {
            warn!(error = %e, "failed to append metrics row");
        }
        sample
    }

    fn sample(&mut self) -> SysSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.networks.refresh();

        let total = self.system.total_memory();
        let ram_percent = if total > 0 {
            self.system.used_memory() as f32 / total as f32 * 100.0
        } else {
            0.0
        };

        let (bytes_sent, bytes_recv, packets_sent, packets_recv, nic) = self.net_counters();

        SysSample {
            ts: Utc::now(),
            cpu_percent: self.system.global_cpu_usage(),
            ram_percent,
            bytes_sent,
            bytes_recv,
            packets_sent,
            packets_recv,
            nic,
        }
    }

    /// Counters for the configured interface, or the sum over all
    /// interfaces when none is configured or the named one is absent.
    fn net_counters(&self) -> (u64, u64, u64, u64, String) {
        if let Some(name) = &self.nic {
            if let Some((iface, data)) = self.networks.iter().find(|(n, _)| n.as_str() == name.as_str()) {
                return (
                    data.total_transmitted(),
                    data.total_received(),
                    data.total_packets_transmitted(),
                    data.total_packets_received(),
                    iface.clone(),
                );
            }
            warn!(nic = name, "interface not found, using aggregate counters");
        }

        let mut sent = 0;
        let mut recv = 0;
        let mut packets_sent = 0;
        let mut packets_recv = 0;
        for (_, data) in &self.networks {
            sent += data.total_transmitted();
            recv += data.total_received();
            packets_sent += data.total_packets_transmitted();
            packets_recv += data.total_packets_received();
        }
        (sent, recv, packets_sent, packets_recv, AGGREGATE_NIC.to_string())
    }

    fn write_row(&mut self, sample: &SysSample) -> Result<(), MonitorError> {
        writeln!(self.writer, "{}", sample.csv_row()).map_err(MonitorError::Write)?;
        // Flush per row so a crash still leaves usable metrics behind.
        self.writer.flush().map_err(MonitorError::Write)
    }
}
