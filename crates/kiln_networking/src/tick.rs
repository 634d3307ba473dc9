//! # Host Tick Pacing
//!
//! Fixed-rate pacing for the loop that drives [`Client::update`] and
//! [`Server::update`].
//!
//! The core never sleeps; a host that wants a steady rate without burning a
//! core calls [`TickPacer::wait`] once per iteration.
//!
//! [`Client::update`]: crate::Client::update
//! [`Server::update`]: crate::Server::update

use std::time::{Duration, Instant};

/// Sleeps the calling thread until the next tick is due.
#[derive(Debug)]
pub struct TickPacer {
    period: Duration,
    next_tick: Instant,
    ticks: u64,
    /// Ticks that started after their deadline had already passed.
    late_ticks: u64,
}

impl TickPacer {
    /// Creates a pacer running `rate_hz` ticks per second (at least 1).
    #[must_use]
    pub fn new(rate_hz: u32) -> Self {
        let period = Duration::from_micros(1_000_000 / u64::from(rate_hz.max(1)));
        Self {
            period,
            next_tick: Instant::now(),
            ticks: 0,
            late_ticks: 0,
        }
    }

    /// Blocks until the next tick is due, then schedules the one after.
    ///
    /// A loop that falls behind is not made to catch up: the schedule
    /// restarts from now and the tick is counted as late.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next_tick {
            std::thread::sleep(self.next_tick - now);
            self.next_tick += self.period;
        } else {
            if self.ticks > 0 && now - self.next_tick > self.period {
                self.late_ticks += 1;
            }
            self.next_tick = now + self.period;
        }
        self.ticks += 1;
    }

    /// Returns the tick period.
    #[inline]
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Returns the number of ticks waited for.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Returns the number of ticks that started a full period late.
    #[inline]
    #[must_use]
    pub const fn late_ticks(&self) -> u64 {
        self.late_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_rate() {
        assert_eq!(TickPacer::new(60).period(), Duration::from_micros(16_666));
        assert_eq!(TickPacer::new(0).period(), Duration::from_secs(1));
    }

    #[test]
    fn test_wait_paces_ticks() {
        let mut pacer = TickPacer::new(500);
        let start = Instant::now();
        for _ in 0..6 {
            pacer.wait();
        }

        assert_eq!(pacer.tick_count(), 6);
        // First tick is immediate, the other five are one period apart
        assert!(start.elapsed() >= pacer.period() * 5);
    }

    #[test]
    fn test_late_tick_counted() {
        let mut pacer = TickPacer::new(1000);
        pacer.wait();
        std::thread::sleep(Duration::from_millis(10));
        pacer.wait();
        assert_eq!(pacer.late_ticks(), 1);
    }
}
