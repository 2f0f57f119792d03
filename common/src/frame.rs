use chrono::{DateTime, Utc};

/// One encoded frame waiting for upload.
///
/// Immutable once produced: the producer hands it to the queue, the
/// queue hands it to exactly one worker.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded payload (JPEG bytes).
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    /// Capture sequence number, monotonically increasing per session.
    pub seq: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, captured_at: DateTime<Utc>, seq: u64) -> Self {
        Self {
            data,
            captured_at,
            seq,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Destination blob name under the given prefix.
    ///
    /// Keys look like `stream/20260218T093000123Z_000042.jpg` — sortable
    /// by capture time, with the sequence number breaking ties at high fps.
    pub fn blob_name(&self, prefix: &str) -> String {
        let ts = self.captured_at.format("%Y%m%dT%H%M%S%3fZ");
        if prefix.is_empty() {
            format!("{ts}_{seq:06}.jpg", seq = self.seq)
        } else {
            format!("{prefix}/{ts}_{seq:06}.jpg", seq = self.seq)
        }
    }
}
