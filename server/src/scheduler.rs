//! Fixed-timestep accumulator.
//!
//! Real time (scaled by the dev time multiplier) is poured into an
//! accumulator and drained in whole simulation steps, capped per tick so a
//! long stall cannot trigger a spiral of catch-up work.

use log::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Fixed steps the caller must run this tick.
    pub steps: u32,
    /// Steps dropped because the backlog exceeded the cap.
    pub discarded: u32,
    /// The real delta after applying the time scale, in seconds.
    pub scaled_delta: f64,
}

#[derive(Debug, Clone)]
pub struct FixedStepScheduler {
    accumulator: f64,
    step: f64,
    max_steps: u32,
    time_scale: f64,
}

impl FixedStepScheduler {
    pub fn new(step: f32, max_steps: u32, time_scale: f32) -> Self {
        Self {
            accumulator: 0.0,
            step: step as f64,
            max_steps: max_steps.max(1),
            time_scale: time_scale.max(0.0) as f64,
        }
    }

    /// Feeds `real_delta` seconds in and reports how many steps are due.
    pub fn plan(&mut self, real_delta: f64) -> TickReport {
        let scaled_delta = real_delta.max(0.0) * self.time_scale;
        self.accumulator += scaled_delta;

        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps {
            self.accumulator -= self.step;
            steps += 1;
        }

        let mut discarded = 0;
        if self.accumulator >= self.step {
            discarded = (self.accumulator / self.step).floor() as u32;
            warn!(
                "Simulation fell behind: discarding {} steps ({:.1} ms backlog)",
                discarded,
                self.accumulator * 1000.0
            );
            self.accumulator = (self.accumulator - discarded as f64 * self.step).max(0.0);
        }

        TickReport {
            steps,
            discarded,
            scaled_delta,
        }
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    pub fn pending(&self) -> f64 {
        self.accumulator
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_whole_steps_are_drained() {
        let mut scheduler = FixedStepScheduler::new(0.25, 24, 1.0);
        let report = scheduler.plan(0.875);
        assert_eq!(report.steps, 3);
        assert_eq!(report.discarded, 0);
        assert_approx_eq!(scheduler.pending(), 0.125, 1e-9);

        let report = scheduler.plan(0.125);
        assert_eq!(report.steps, 1);
        assert_eq!(scheduler.pending(), 0.0);
    }

    #[test]
    fn test_step_cap_discards_backlog() {
        let mut scheduler = FixedStepScheduler::new(0.01, 24, 1.0);
        let report = scheduler.plan(1.0);
        assert_eq!(report.steps, 24);
        assert!(report.discarded > 0);
        assert!(scheduler.pending() < 0.01);
    }

    #[test]
    fn test_time_scale_multiplies_delta() {
        let mut scheduler = FixedStepScheduler::new(0.125, 100, 2.0);
        let report = scheduler.plan(0.5);
        assert_eq!(report.scaled_delta, 1.0);
        assert_eq!(report.steps, 8);
    }

    #[test]
    fn test_zero_delta_runs_nothing() {
        let mut scheduler = FixedStepScheduler::new(0.01, 24, 1.0);
        let report = scheduler.plan(0.0);
        assert_eq!(report.steps, 0);
        assert_eq!(report.scaled_delta, 0.0);
    }
}
