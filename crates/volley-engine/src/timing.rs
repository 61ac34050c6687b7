//! Session pacing.
//!
//! The engine wants fixed ticks. Wall-clock frames are fed into an
//! accumulator which releases whole ticks and carries the remainder, with
//! frame deltas clamped so a stall cannot queue up an avalanche of ticks.

use std::time::{Duration, Instant};

use volley_kernel::MAX_FRAME_DELTA;

/// Fixed-timestep accumulator.
#[derive(Debug, Clone)]
pub struct FixedStep {
    /// Seconds per tick
    step: f32,
    /// Unspent time
    accumulator: f32,
    /// Longest frame delta accepted
    max_dt: f32,
}

impl FixedStep {
    /// Creates an accumulator releasing `rate` ticks per second.
    #[must_use]
    pub fn new(rate: u32) -> Self {
        Self {
            step: 1.0 / rate.max(1) as f32,
            accumulator: 0.0,
            max_dt: MAX_FRAME_DELTA,
        }
    }

    /// Seconds per tick.
    #[must_use]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Adds a frame delta and returns how many ticks are due.
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.clamp(0.0, self.max_dt);
        let mut ticks = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            ticks += 1;
        }
        ticks
    }

    /// Fraction of a tick left over (0.0-1.0).
    #[must_use]
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.step).clamp(0.0, 1.0)
    }
}

/// Measures wall-clock frames and sleeps to hold a target rate.
#[derive(Debug)]
pub struct FramePacer {
    budget: Duration,
    last: Instant,
}

impl FramePacer {
    /// Paces frames at `rate` per second.
    #[must_use]
    pub fn new(rate: u32) -> Self {
        Self {
            budget: Duration::from_secs_f64(1.0 / f64::from(rate.max(1))),
            last: Instant::now(),
        }
    }

    /// Sleeps out the rest of the frame budget, then returns the frame's delta.
    pub fn wait(&mut self) -> f32 {
        let spent = self.last.elapsed();
        if spent < self.budget {
            std::thread::sleep(self.budget - spent);
        }
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step_carries_remainder() {
        let mut step = FixedStep::new(10);
        assert_eq!(step.advance(0.05), 0);
        assert!((step.alpha() - 0.5).abs() < 1e-5);
        assert_eq!(step.advance(0.06), 1);
        assert_eq!(step.advance(0.2), 2);
    }

    #[test]
    fn test_fixed_step_clamps_stalls() {
        let mut step = FixedStep::new(100);
        // a 5 second hitch counts as MAX_FRAME_DELTA
        let ticks = step.advance(5.0);
        assert!(ticks <= 25, "{ticks}");
        assert!(ticks >= 24, "{ticks}");
    }

    #[test]
    fn test_negative_delta_ignored() {
        let mut step = FixedStep::new(60);
        assert_eq!(step.advance(-1.0), 0);
        assert!(step.alpha().abs() < f32::EPSILON);
    }

    #[test]
    fn test_pacer_reports_elapsed() {
        let mut pacer = FramePacer::new(1000);
        let dt = pacer.wait();
        assert!(dt > 0.0);
    }
}
