use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::ImageReader;
use tracing::debug;
use upload_meter_common::config::CameraConfig;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP request failed: {0}")]
    HttpRequest(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to decode captured frame: {0}")]
    Decode(String),
    #[error("failed to encode JPEG: {0}")]
    Encode(String),
}

/// Source of raw frames, one per call.
#[async_trait]
pub trait FrameSource: Send {
    /// Capture one raw frame. `Ok(None)` means the source is exhausted;
    /// an error means the source is dead and the pipeline must stop.
    async fn capture(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Turns a raw captured frame into the payload that gets uploaded.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, EncodeError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Polls a camera's single-frame HTTP endpoint.
pub struct HttpFrameSource {
    client: reqwest::Client,
    url: String,
}

impl HttpFrameSource {
    pub fn new(config: &CameraConfig) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(CaptureError::HttpConnect)?;
        let url = format!("{}?quality={}", config.url, config.quality);
        Ok(Self { client, url })
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn capture(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::HttpRequest)?;
        if !resp.status().is_success() {
            return Err(CaptureError::HttpStatus(resp.status().as_u16()));
        }
        let data = resp.bytes().await.map_err(CaptureError::HttpRequest)?;
        debug!(bytes = data.len(), "captured frame");
        Ok(Some(data.to_vec()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Re-encodes captured frames as JPEG at a fixed quality.
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let img = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()
            .map_err(|e| EncodeError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| EncodeError::Decode(e.to_string()))?;

        let mut buf = Vec::new();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.quality);
        img.write_with_encoder(encoder)
            .map_err(|e| EncodeError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn name(&self) -> &str {
        "jpeg"
    }
}
