//! Tick sources.
//!
//! The engine never reads the clock itself; a [`TickSource`] hands it the
//! elapsed time for each step.

use std::time::Instant;

/// Largest delta a wall-clock source reports, so a stall does not skip fades.
pub const MAX_FRAME_DELTA: f32 = 0.25;

/// Supplies elapsed time, one step at a time.
pub trait TickSource {
    /// Seconds since the previous step, or `None` when the source is exhausted.
    fn next_delta(&mut self) -> Option<f32>;
}

/// Deterministic fixed-size steps.
#[derive(Debug, Clone)]
pub struct FixedTicks {
    dt: f32,
    remaining: Option<u64>,
}

impl FixedTicks {
    /// Endless steps of `dt` seconds.
    #[must_use]
    pub fn endless(dt: f32) -> Self {
        Self {
            dt: dt.max(0.0),
            remaining: None,
        }
    }

    /// `count` steps of `dt` seconds.
    #[must_use]
    pub fn count(dt: f32, count: u64) -> Self {
        Self {
            dt: dt.max(0.0),
            remaining: Some(count),
        }
    }

    /// Enough steps of `dt` to cover `seconds`.
    #[must_use]
    pub fn covering(dt: f32, seconds: f32) -> Self {
        let dt = dt.max(f32::EPSILON);
        Self::count(dt, (seconds / dt).ceil().max(0.0) as u64)
    }
}

impl TickSource for FixedTicks {
    fn next_delta(&mut self) -> Option<f32> {
        match self.remaining.as_mut() {
            Some(0) => None,
            Some(left) => {
                *left -= 1;
                Some(self.dt)
            },
            None => Some(self.dt),
        }
    }
}

/// Wall-clock deltas, clamped to [`MAX_FRAME_DELTA`].
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    max_dt: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Starts the clock now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            max_dt: MAX_FRAME_DELTA,
        }
    }

    /// Overrides the delta clamp.
    #[must_use]
    pub fn with_max_dt(mut self, max_dt: f32) -> Self {
        self.max_dt = max_dt.max(0.001);
        self
    }
}

impl TickSource for FrameClock {
    fn next_delta(&mut self) -> Option<f32> {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        Some(dt.min(self.max_dt))
    }
}
