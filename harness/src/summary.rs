use chrono::Utc;
use upload_meter_common::config::Config;
use upload_meter_common::report::{LatencyPercentiles, Summary, UploadResult, UploadStatus};

use crate::monitor::AGGREGATE_NIC;

/// Reduce the full result log into the session summary.
///
/// Failed uploads count toward `frames_total` but contribute nothing to
/// `bytes_total` or the latency percentiles.
pub fn aggregate(results: &[UploadResult], wall_seconds: f64, config: &Config) -> Summary {
    let frames_failed = results
        .iter()
        .filter(|r| r.status == UploadStatus::Fail)
        .count();

    let bytes_total: u64 = results
        .iter()
        .filter(|r| r.status == UploadStatus::Ok)
        .map(|r| r.size_bytes)
        .sum();

    let mut ok_durations: Vec<f64> = results
        .iter()
        .filter(|r| r.status == UploadStatus::Ok)
        .map(|r| r.duration_s)
        .collect();
    ok_durations.sort_by(|a, b| a.total_cmp(b));

    let throughput_mbps_wall = if wall_seconds > 0.0 {
        bytes_total as f64 * 8.0 / wall_seconds / 1e6
    } else {
        0.0
    };

    Summary {
        frames_total: results.len(),
        frames_failed,
        bytes_total,
        wall_seconds,
        throughput_mbps_wall,
        per_frame_latency_s: LatencyPercentiles {
            p50: percentile(&ok_durations, 50.0),
            p90: percentile(&ok_durations, 90.0),
            p95: percentile(&ok_durations, 95.0),
            p99: percentile(&ok_durations, 99.0),
        },
        concurrency: config.stream.concurrency,
        prefix: config.storage.prefix.clone(),
        nic: config
            .monitor
            .nic
            .clone()
            .unwrap_or_else(|| AGGREGATE_NIC.to_string()),
        sys_interval: config.monitor.sys_interval_s,
        timestamp: Utc::now(),
    }
}

/// Percentile with linear interpolation between closest ranks over an
/// ascending-sorted slice. None on empty input — no data is not zero.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = rank - lower as f64;
    Some(sorted[lower] + weight * (sorted[upper] - sorted[lower]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        toml::from_str(
            r#"
                [storage]
                access_key = "ak"
                secret_key = "sk"
                bucket = "frames"
                prefix = "tests/wifi"

                [camera]
                url = "http://camera.local/frame"

                [stream]
                concurrency = 8
            "#,
        )
        .unwrap()
    }

    fn ok_result(size_bytes: u64, duration_s: f64) -> UploadResult {
        UploadResult {
            blob: "b.jpg".into(),
            size_bytes,
            duration_s,
            retries: 0,
            status: UploadStatus::Ok,
            error: String::new(),
        }
    }

    fn fail_result(size_bytes: u64) -> UploadResult {
        UploadResult {
            blob: "b.jpg".into(),
            size_bytes,
            duration_s: 60.0,
            retries: 3,
            status: UploadStatus::Fail,
            error: "timed out".into(),
        }
    }

    #[test]
    fn percentile_of_empty_is_none() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn percentile_of_single_value() {
        assert_eq!(percentile(&[3.5], 99.0), Some(3.5));
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 50.0), Some(2.5));
        assert_eq!(percentile(&data, 0.0), Some(1.0));
        assert_eq!(percentile(&data, 100.0), Some(4.0));
        // numpy: percentile([1,2,3,4], 90) == 3.7
        let p90 = percentile(&data, 90.0).unwrap();
        assert!((p90 - 3.7).abs() < 1e-9);
    }

    #[test]
    fn failed_results_excluded_from_bytes_and_latency() {
        let results = vec![
            ok_result(100, 1.0),
            ok_result(200, 2.0),
            fail_result(300),
        ];
        let summary = aggregate(&results, 10.0, &test_config());
        assert_eq!(summary.frames_total, 3);
        assert_eq!(summary.frames_failed, 1);
        assert_eq!(summary.bytes_total, 300);
        // p50 over the two ok durations only
        assert_eq!(summary.per_frame_latency_s.p50, Some(1.5));
    }

    #[test]
    fn throughput_is_bits_per_wall_second() {
        let results = vec![ok_result(1_000_000, 1.0)];
        let summary = aggregate(&results, 8.0, &test_config());
        // 1 MB * 8 bits / 8 s = 1 Mbit/s
        assert!((summary.throughput_mbps_wall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_session_has_absent_percentiles() {
        let summary = aggregate(&[], 5.0, &test_config());
        assert_eq!(summary.frames_total, 0);
        assert_eq!(summary.bytes_total, 0);
        assert!(summary.per_frame_latency_s.p50.is_none());
        assert!(summary.per_frame_latency_s.p99.is_none());
        assert_eq!(summary.throughput_mbps_wall, 0.0);
    }

    #[test]
    fn config_fields_carried_into_summary() {
        let summary = aggregate(&[], 1.0, &test_config());
        assert_eq!(summary.concurrency, 8);
        assert_eq!(summary.prefix, "tests/wifi");
        assert_eq!(summary.nic, "aggregate");
        assert_eq!(summary.sys_interval, 1.0);
    }
}
