//! Frame timing and the adjustable inter-frame delay.
//!
//! [`FrameClock`] tracks elapsed time, per-frame delta, and the frame count.
//! [`TimeConstant`] is a cloneable handle on the scalar that scales the
//! base frame interval; a UI thread can adjust it while the loop runs, and
//! the loop reads it fresh on every tick.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Base inter-frame interval before the time constant is applied;
/// a constant of 1.0 yields roughly 60 frames per second.
pub const BASE_FRAME_INTERVAL: Duration = Duration::from_millis(17);

/// Time tracking for the simulation loop.
#[derive(Debug)]
pub struct FrameClock {
    /// When the session started.
    start: Instant,
    /// When the last frame occurred.
    last_frame: Instant,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames since start.
    frame_count: u64,
}

impl FrameClock {
    /// Create a clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta_secs: 0.0,
            frame_count: 0,
        }
    }

    /// Advance the clock by one frame. Call once per tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_secs = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Milliseconds since the session started, for the clock uniform.
    #[inline]
    pub fn elapsed_millis(&self) -> f32 {
        self.start.elapsed().as_secs_f32() * 1000.0
    }

    /// Seconds between the last two frames.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared, externally adjustable scalar on the frame interval.
///
/// Stored as f32 bits in an atomic so controllers on other threads can
/// adjust the pace without locking. Changing it only ever changes when the
/// next tick fires, never what a tick does.
#[derive(Debug, Clone)]
pub struct TimeConstant {
    scale: Arc<AtomicU32>,
}

impl TimeConstant {
    /// Create a handle with the given initial scale.
    pub fn new(scale: f32) -> Self {
        Self {
            scale: Arc::new(AtomicU32::new(scale.max(0.0).to_bits())),
        }
    }

    /// Current scale value.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.scale.load(Ordering::Relaxed))
    }

    /// Replace the scale. Negative values clamp to zero.
    pub fn set(&self, scale: f32) {
        self.scale.store(scale.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Delay before the next tick at the current scale.
    pub fn frame_delay(&self) -> Duration {
        BASE_FRAME_INTERVAL.mul_f32(self.get())
    }
}

impl Default for TimeConstant {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_counts_frames() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);

        thread::sleep(Duration::from_millis(5));
        clock.tick();
        assert_eq!(clock.frame(), 1);
        assert!(clock.delta() > 0.0);
        assert!(clock.elapsed_millis() > 0.0);
    }

    #[test]
    fn test_time_constant_shared_across_clones() {
        let constant = TimeConstant::new(1.0);
        let handle = constant.clone();
        handle.set(0.5);
        assert_eq!(constant.get(), 0.5);
        assert_eq!(constant.frame_delay(), Duration::from_millis(17).mul_f32(0.5));
    }

    #[test]
    fn test_time_constant_clamps_negative() {
        let constant = TimeConstant::new(-2.0);
        assert_eq!(constant.get(), 0.0);
        constant.set(-1.0);
        assert_eq!(constant.frame_delay(), Duration::ZERO);
    }
}
