use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use upload_meter_common::frame::Frame;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    /// The queue was at capacity; the frame is gone. Dropping instead of
    /// blocking the producer is the backpressure policy — the rate
    /// controller reacts to occupancy before this point is reached.
    Dropped,
}

/// Fixed-capacity FIFO between the frame producer and the upload workers.
///
/// The only synchronization point in the pipeline: enqueue never waits,
/// dequeue waits up to a timeout so workers can re-check the shutdown
/// signal without busy-looping.
pub struct FrameQueue {
    items: Mutex<VecDeque<Frame>>,
    capacity: usize,
    ready: Notify,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ready: Notify::new(),
        }
    }

    /// Enqueue a frame, or drop it if the queue is full.
    pub async fn enqueue(&self, frame: Frame) -> Enqueue {
        let mut items = self.items.lock().await;
        if items.len() >= self.capacity {
            return Enqueue::Dropped;
        }
        items.push_back(frame);
        drop(items);
        self.ready.notify_one();
        Enqueue::Accepted
    }

    /// Dequeue the oldest frame, waiting up to `timeout` for one to arrive.
    pub async fn dequeue(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.items.lock().await.pop_front() {
                return Some(frame);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if tokio::time::timeout(remaining, self.ready.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    pub async fn occupancy(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
