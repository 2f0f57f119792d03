use std::time::Duration;

/// Queue occupancy above this fraction of capacity slows production.
const SLOW_DOWN_ABOVE: f64 = 0.8;
/// Queue occupancy below this fraction of capacity speeds production up.
const SPEED_UP_BELOW: f64 = 0.2;

/// Hysteresis controller for the capture rate.
///
/// One fps step per producer cycle, with a dead zone between the two
/// thresholds so single-sample noise does not cause oscillation. Holds
/// the invariant `min_fps <= fps <= max_fps` at all times.
#[derive(Debug)]
pub struct RateController {
    fps: u32,
    min_fps: u32,
    max_fps: u32,
}

impl RateController {
    pub fn new(init_fps: u32, min_fps: u32, max_fps: u32) -> Self {
        Self {
            fps: init_fps.clamp(min_fps, max_fps),
            min_fps,
            max_fps,
        }
    }

    /// Re-evaluate the target rate from queue occupancy.
    /// Returns true if the rate changed.
    pub fn update(&mut self, occupancy: usize, capacity: usize) -> bool {
        if capacity == 0 {
            return false;
        }
        let fill = occupancy as f64 / capacity as f64;
        if fill > SLOW_DOWN_ABOVE && self.fps > self.min_fps {
            self.fps -= 1;
            true
        } else if fill < SPEED_UP_BELOW && self.fps < self.max_fps {
            self.fps += 1;
            true
        } else {
            false
        }
    }

    pub fn current_fps(&self) -> u32 {
        self.fps
    }

    /// Target interval between captures at the current rate.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }
}
