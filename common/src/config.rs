use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub camera: CameraConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Custom S3-compatible endpoint. None means the default AWS endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// URL returning one JPEG frame per GET.
    pub url: String,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

/// Tunables for the adaptive streaming pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_init_fps")]
    pub init_fps: u32,
    #[serde(default = "default_min_fps")]
    pub min_fps: u32,
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

/// Stop criteria for the streaming session.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,
    #[serde(default = "default_max_mb")]
    pub max_mb: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_sys_interval_s")]
    pub sys_interval_s: f64,
    /// Interface to monitor (e.g. "wlan0"). None means aggregate counters.
    #[serde(default)]
    pub nic: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_outdir")]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retries: default_retries(),
            timeout_s: default_timeout_s(),
            init_fps: default_init_fps(),
            min_fps: default_min_fps(),
            max_fps: default_max_fps(),
            queue_size: default_queue_size(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_seconds: default_max_seconds(),
            max_mb: default_max_mb(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sys_interval_s: default_sys_interval_s(),
            nic: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_outdir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.min_fps == 0 {
            return Err(ConfigError::Invalid("stream.min_fps must be at least 1".into()));
        }
        if self.stream.min_fps > self.stream.max_fps {
            return Err(ConfigError::Invalid(
                "stream.min_fps must not exceed stream.max_fps".into(),
            ));
        }
        if self.stream.concurrency == 0 {
            return Err(ConfigError::Invalid("stream.concurrency must be at least 1".into()));
        }
        if self.stream.queue_size == 0 {
            return Err(ConfigError::Invalid("stream.queue_size must be at least 1".into()));
        }
        if self.monitor.sys_interval_s <= 0.0 {
            return Err(ConfigError::Invalid("monitor.sys_interval_s must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_region() -> String {
    "us-east-1".into()
}
fn default_prefix() -> String {
    "stream".into()
}
fn default_quality() -> u8 {
    80
}
fn default_concurrency() -> usize {
    4
}
fn default_retries() -> u32 {
    3
}
fn default_timeout_s() -> u64 {
    60
}
fn default_init_fps() -> u32 {
    5
}
fn default_min_fps() -> u32 {
    1
}
fn default_max_fps() -> u32 {
    30
}
fn default_queue_size() -> usize {
    20
}
fn default_max_seconds() -> u64 {
    300
}
fn default_max_mb() -> u64 {
    500
}
fn default_sys_interval_s() -> f64 {
    1.0
}
fn default_outdir() -> String {
    "results_stream".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> String {
        r#"
            [storage]
            access_key = "ak"
            secret_key = "sk"
            bucket = "frames"

            [camera]
            url = "http://camera.local/frame"
        "#
        .to_string()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(&minimal()).unwrap();
        assert_eq!(config.stream.concurrency, 4);
        assert_eq!(config.stream.init_fps, 5);
        assert_eq!(config.stream.queue_size, 20);
        assert_eq!(config.limits.max_seconds, 300);
        assert_eq!(config.limits.max_mb, 500);
        assert_eq!(config.monitor.sys_interval_s, 1.0);
        assert!(config.monitor.nic.is_none());
        assert_eq!(config.output.dir, "results_stream");
        assert_eq!(config.storage.prefix, "stream");
    }

    #[test]
    fn fps_bounds_validated() {
        let toml_str = minimal() + "\n[stream]\nmin_fps = 10\nmax_fps = 2\n";
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_min_fps_rejected() {
        let toml_str = minimal() + "\n[stream]\nmin_fps = 0\n";
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.validate().is_err());
    }
}
