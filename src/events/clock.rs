//! Monotonic time sources used to drive schedulers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic elapsed-time source. `elapsed` never goes backwards.
pub trait Clock: Send + Sync {
    fn elapsed(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = now.saturating_add(by);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Turns a [`Clock`] into per-frame deltas for `EventScheduler::update`.
#[derive(Debug)]
pub struct Ticker<C> {
    clock: C,
    last: Duration,
}

impl<C: Clock> Ticker<C> {
    pub fn new(clock: C) -> Self {
        let last = clock.elapsed();
        Self { clock, last }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Time elapsed since the previous call (or since construction).
    pub fn tick(&mut self) -> Duration {
        let now = self.clock.elapsed();
        let delta = now.saturating_sub(self.last);
        self.last = now;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_reports_deltas_of_manual_clock() {
        let mut ticker = Ticker::new(ManualClock::new());
        assert_eq!(ticker.tick(), Duration::ZERO);
        ticker.clock().advance(Duration::from_millis(250));
        ticker.clock().advance(Duration::from_millis(50));
        assert_eq!(ticker.tick(), Duration::from_millis(300));
        assert_eq!(ticker.tick(), Duration::ZERO);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.elapsed();
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
