//! Fixed tick timing.
//!
//! Converts wall-clock frame time into a whole number of fixed scheduler
//! ticks.

use std::time::{Duration, Instant};

/// Default scheduler tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(32);

/// Most ticks run for a single frame.
const MAX_TICKS_PER_FRAME: u32 = 8;

/// Fixed-step tick accumulator.
#[derive(Debug)]
pub struct TickTimer {
    /// Length of one tick
    tick: Duration,
    /// Time not yet consumed by ticks
    accumulator: Duration,
    /// Longest frame counted, to prevent a spiral of death
    max_frame: Duration,
    /// Time of the last `advance`
    last_frame: Instant,
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl TickTimer {
    /// Create a timer with the given tick length (at least 1 ms).
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        let tick = tick.max(Duration::from_millis(1));
        Self {
            tick,
            accumulator: Duration::ZERO,
            max_frame: tick * MAX_TICKS_PER_FRAME,
            last_frame: Instant::now(),
        }
    }

    /// Create a timer from a tick length in milliseconds.
    #[must_use]
    pub fn from_millis(tick_ms: u64) -> Self {
        Self::new(Duration::from_millis(tick_ms))
    }

    /// Length of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        self.tick
    }

    /// Add `dt` and return how many ticks are due.
    pub fn accumulate(&mut self, dt: Duration) -> u32 {
        self.accumulator += dt.min(self.max_frame);

        let mut count = 0;
        while self.accumulator >= self.tick && count < MAX_TICKS_PER_FRAME {
            self.accumulator -= self.tick;
            count += 1;
        }

        // Still behind after the cap: drop the backlog.
        if self.accumulator > self.tick * 2 {
            self.accumulator = Duration::ZERO;
        }

        count
    }

    /// Measure wall-clock time since the last call and return the ticks due.
    pub fn advance(&mut self) -> u32 {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;
        self.accumulate(dt)
    }

    /// Time left until the next tick is due.
    #[must_use]
    pub fn until_next_tick(&self) -> Duration {
        self.tick.saturating_sub(self.accumulator)
    }

    /// Forget accumulated time (after a pause or a long load).
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.last_frame = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tick() {
        let timer = TickTimer::default();
        assert_eq!(timer.tick_duration(), Duration::from_millis(32));
    }

    #[test]
    fn test_minimum_tick() {
        assert_eq!(TickTimer::from_millis(0).tick_duration(), Duration::from_millis(1));
    }

    #[test]
    fn test_accumulate_whole_ticks() {
        let mut timer = TickTimer::from_millis(32);
        assert_eq!(timer.accumulate(Duration::from_millis(20)), 0);
        assert_eq!(timer.accumulate(Duration::from_millis(20)), 1);
        assert_eq!(timer.until_next_tick(), Duration::from_millis(24));
        assert_eq!(timer.accumulate(Duration::from_millis(64)), 2);
    }

    #[test]
    fn test_lag_spike_is_capped() {
        let mut timer = TickTimer::from_millis(32);
        let ticks = timer.accumulate(Duration::from_secs(5));
        assert!(ticks <= MAX_TICKS_PER_FRAME);
        assert!(timer.until_next_tick() > Duration::ZERO);
    }

    #[test]
    fn test_reset() {
        let mut timer = TickTimer::from_millis(32);
        timer.accumulate(Duration::from_millis(31));
        timer.reset();
        assert_eq!(timer.until_next_tick(), Duration::from_millis(32));
    }

    #[test]
    fn test_advance_measures_wall_clock() {
        let mut timer = TickTimer::from_millis(5);
        std::thread::sleep(Duration::from_millis(12));
        assert!(timer.advance() >= 1);
    }
}
