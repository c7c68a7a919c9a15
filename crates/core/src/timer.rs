//! Frame timer producing per-frame delta time.

use std::time::{Duration, Instant};

/// Measures the time between consecutive frames.
///
/// The first [`tick`](Self::tick) reports zero, so the frame after startup does not
/// see the time spent loading resources.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Option<Instant>,
    frame_count: u64,
}

impl FrameTimer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_tick: None,
            frame_count: 0,
        }
    }

    /// Total elapsed time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Mark the end of a frame and return the time since the previous mark.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = self.last_tick.map_or(Duration::ZERO, |last| now - last);
        self.last_tick = Some(now);
        self.frame_count += 1;
        delta
    }

    /// [`tick`](Self::tick) in seconds.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Number of ticks since creation or reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Reset to a freshly created state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_tick_is_zero() {
        let mut timer = FrameTimer::new();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(timer.tick(), Duration::ZERO);
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn test_second_tick_measures_gap() {
        let mut timer = FrameTimer::new();
        timer.tick();
        thread::sleep(Duration::from_millis(5));
        assert!(timer.delta_secs() >= 0.004);
    }

    #[test]
    fn test_reset() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.tick();
        timer.reset();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.tick(), Duration::ZERO);
    }
}
