use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use upload_meter_common::report::{Summary, UploadResult};

/// Write the per-frame upload log CSV.
pub fn write_uploads_log(path: &Path, results: &[UploadResult]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", UploadResult::CSV_HEADER)?;
    for result in results {
        writeln!(writer, "{}", result.csv_row())?;
    }
    writer.flush()
}

/// Write the session summary JSON.
pub fn write_summary(path: &Path, summary: &Summary) -> std::io::Result<()> {
    std::fs::write(path, summary.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use upload_meter_common::report::{LatencyPercentiles, UploadStatus};

    #[test]
    fn uploads_log_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!(
            "upload_meter_uploads_log_{}.csv",
            std::process::id()
        ));
        let results = vec![UploadResult {
            blob: "stream/a.jpg".into(),
            size_bytes: 42,
            duration_s: 0.25,
            retries: 1,
            status: UploadStatus::Ok,
            error: String::new(),
        }];
        write_uploads_log(&path, &results).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], UploadResult::CSV_HEADER);
        assert_eq!(lines[1], "stream/a.jpg,42,0.250000,1,ok,");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn summary_file_is_valid_json() {
        let path = std::env::temp_dir().join(format!(
            "upload_meter_summary_{}.json",
            std::process::id()
        ));
        let summary = Summary {
            frames_total: 2,
            frames_failed: 1,
            bytes_total: 42,
            wall_seconds: 1.0,
            throughput_mbps_wall: 0.000336,
            per_frame_latency_s: LatencyPercentiles::none(),
            concurrency: 4,
            prefix: "stream".into(),
            nic: "aggregate".into(),
            sys_interval: 1.0,
            timestamp: chrono::Utc::now(),
        };
        write_summary(&path, &summary).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["frames_total"], 2);
        assert_eq!(parsed["per_frame_latency_s"]["p50"], serde_json::Value::Null);
        std::fs::remove_file(&path).ok();
    }
}
