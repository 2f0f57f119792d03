use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal outcome of one upload attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Ok,
    Fail,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Ok => "ok",
            UploadStatus::Fail => "fail",
        }
    }
}

/// One row of the upload log, recorded by a worker after the attempt
/// sequence for a frame completes. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub blob: String,
    pub size_bytes: u64,
    pub duration_s: f64,
    pub retries: u32,
    pub status: UploadStatus,
    /// Error detail for failed uploads, empty on success.
    pub error: String,
}

impl UploadResult {
    pub const CSV_HEADER: &'static str = "blob,size_bytes,duration_s,retries,status,error";

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{:.6},{},{},{}",
            csv_field(&self.blob),
            self.size_bytes,
            self.duration_s,
            self.retries,
            self.status.as_str(),
            csv_field(&self.error)
        )
    }
}

/// One system metrics sample taken by the resource monitor.
#[derive(Debug, Clone, Serialize)]
pub struct SysSample {
    pub ts: DateTime<Utc>,
    pub cpu_percent: f32,
    pub ram_percent: f32,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    /// Interface name, or "aggregate" when counters span all interfaces.
    pub nic: String,
}

impl SysSample {
    pub const CSV_HEADER: &'static str =
        "ts,cpu_percent,ram_percent,bytes_sent,bytes_recv,packets_sent,packets_recv,nic";

    pub fn csv_row(&self) -> String {
        format!(
            "{},{:.1},{:.1},{},{},{},{},{}",
            self.ts.to_rfc3339(),
            self.cpu_percent,
            self.ram_percent,
            self.bytes_sent,
            self.bytes_recv,
            self.packets_sent,
            self.packets_recv,
            csv_field(&self.nic)
        )
    }
}

/// Latency percentiles over successful upload durations.
/// All fields are None when no upload succeeded.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyPercentiles {
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl LatencyPercentiles {
    pub fn none() -> Self {
        Self {
            p50: None,
            p90: None,
            p95: None,
            p99: None,
        }
    }
}

/// Session-level aggregate, computed once after shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub frames_total: usize,
    pub frames_failed: usize,
    pub bytes_total: u64,
    pub wall_seconds: f64,
    pub throughput_mbps_wall: f64,
    pub per_frame_latency_s: LatencyPercentiles,
    pub concurrency: usize,
    pub prefix: String,
    pub nic: String,
    pub sys_interval: f64,
    pub timestamp: DateTime<Utc>,
}

impl Summary {
    pub fn to_json(&self) -> String {
        // Serialize on plain structs cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Quote a CSV field if it contains a comma, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_result_csv_row_ok() {
        let r = UploadResult {
            blob: "stream/20260218T093000000Z_000001.jpg".into(),
            size_bytes: 123456,
            duration_s: 0.5,
            retries: 0,
            status: UploadStatus::Ok,
            error: String::new(),
        };
        assert_eq!(
            r.csv_row(),
            "stream/20260218T093000000Z_000001.jpg,123456,0.500000,0,ok,"
        );
    }

    #[test]
    fn upload_result_csv_row_quotes_error() {
        let r = UploadResult {
            blob: "a.jpg".into(),
            size_bytes: 1,
            duration_s: 2.0,
            retries: 3,
            status: UploadStatus::Fail,
            error: "timeout, after 60s".into(),
        };
        assert!(r.csv_row().ends_with(",fail,\"timeout, after 60s\""));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&UploadStatus::Ok).unwrap(), "\"ok\"");
        assert_eq!(serde_json::to_string(&UploadStatus::Fail).unwrap(), "\"fail\"");
    }

    #[test]
    fn summary_json_has_null_percentiles_when_empty() {
        let summary = Summary {
            frames_total: 0,
            frames_failed: 0,
            bytes_total: 0,
            wall_seconds: 1.0,
            throughput_mbps_wall: 0.0,
            per_frame_latency_s: LatencyPercentiles::none(),
            concurrency: 4,
            prefix: "stream".into(),
            nic: "aggregate".into(),
            sys_interval: 1.0,
            timestamp: Utc::now(),
        };
        let json = summary.to_json();
        assert!(json.contains("\"p50\": null"));
        assert!(json.contains("\"frames_total\": 0"));
    }

    #[test]
    fn sys_sample_header_column_order() {
        assert!(SysSample::CSV_HEADER.starts_with("ts,cpu_percent,ram_percent,bytes_sent"));
        assert!(SysSample::CSV_HEADER.ends_with("packets_recv,nic"));
    }
}
