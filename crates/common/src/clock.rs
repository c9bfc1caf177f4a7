//! Clock and pacing utilities for frame streams.
//!
//! Frame timestamps are monotonic nanoseconds relative to stream start.
//! Alert captions use local wall-clock time.

use std::time::{Duration, Instant};

/// Format used in alert messages and evidence captions.
pub const CAPTION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format safe for file names (no colons).
pub const FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A monotonic clock anchored to the moment a stream started.
#[derive(Debug, Clone)]
pub struct StreamClock {
    epoch: Instant,
}

impl StreamClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since stream start.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// Current local time formatted for alert captions.
pub fn caption_timestamp() -> String {
    chrono::Local::now().format(CAPTION_TIME_FORMAT).to_string()
}

/// Current local time formatted for file names.
pub fn file_timestamp() -> String {
    chrono::Local::now().format(FILE_TIME_FORMAT).to_string()
}

/// Frame rate controller used to pace replays at a nominal cadence.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Pace at `fps` frames per second.
    pub fn new(fps: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / fps.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Whether the next frame is due at `current_ns`; records the tick
    /// when it is. The first frame is always due.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// How long to wait from `current_ns` until the next tick is due.
    pub fn time_until_next(&self, current_ns: u64) -> Duration {
        match self.last_tick_ns {
            None => Duration::ZERO,
            Some(last) => {
                Duration::from_nanos((last + self.target_interval_ns).saturating_sub(current_ns))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = StreamClock::start();
        assert!(clock.elapsed_ns() < 1_000_000_000);
    }

    #[test]
    fn test_rate_controller() {
        let mut pacer = RateController::new(30);
        assert!(pacer.should_tick(0));
        assert!(!pacer.should_tick(20_000_000));
        assert!(pacer.should_tick(34_000_000));
    }

    #[test]
    fn test_time_until_next() {
        let mut ctrl = RateController::new(10);
        assert_eq!(ctrl.time_until_next(0), Duration::ZERO);
        ctrl.should_tick(0);
        assert_eq!(ctrl.time_until_next(40_000_000), Duration::from_millis(60));
        assert_eq!(ctrl.time_until_next(200_000_000), Duration::ZERO);
    }

    #[test]
    fn test_caption_timestamp_shape() {
        let stamp = caption_timestamp();
        assert_eq!(stamp.len(), "2026-01-01 00:00:00".len());
        assert!(!file_timestamp().contains(':'));
    }
}
