//! Wall clock and tick source
//!
//! The scheduler never calls `Local::now()` or `tokio::time` directly for its
//! timing decisions; it goes through a [`Clock`]. [`SystemClock`] is the real
//! thing. [`ManualClock`] holds a simulated instant that only moves when a
//! sleep or a tick asks it to, which makes whole runs replayable in tests.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of the current instant, timed waits and tickers
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Wait until `deadline`; returns at once if it already passed
    async fn sleep_until(&self, deadline: DateTime<Local>);

    /// Fixed-interval tick source
    fn ticker(&self, period: Duration) -> Box<dyn Ticker>;
}

/// A fixed-interval tick stream
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick and return the instant it fired at
    async fn tick(&mut self) -> DateTime<Local>;
}

/// Local wall clock backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Local>) {
        let remaining = (deadline - Local::now()).to_std().unwrap_or(Duration::ZERO);
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
    }

    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        let mut interval = tokio::time::interval(period);
        // A late tick must not be followed by a burst of catch-up requests.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Box::new(SystemTicker { interval })
    }
}

struct SystemTicker {
    interval: Interval,
}

#[async_trait]
impl Ticker for SystemTicker {
    async fn tick(&mut self) -> DateTime<Local> {
        self.interval.tick().await;
        Local::now()
    }
}

/// Simulated clock for deterministic runs
///
/// Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, t: DateTime<Local>) {
        *self.lock() = t;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Local>> {
        // A poisoned lock still holds a valid instant.
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.lock()
    }

    async fn sleep_until(&self, deadline: DateTime<Local>) {
        {
            let mut now = self.lock();
            if *now < deadline {
                *now = deadline;
            }
        }
        tokio::task::yield_now().await;
    }

    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        Box::new(ManualTicker {
            clock: self.clone(),
            period,
            started: false,
        })
    }
}

/// Mirrors a tokio interval: the first tick fires at once
struct ManualTicker {
    clock: ManualClock,
    period: Duration,
    started: bool,
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> DateTime<Local> {
        if self.started {
            self.clock.advance(self.period);
        }
        self.started = true;
        tokio::task::yield_now().await;
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn test_manual_sleep_jumps_forward_only() {
        let clock = ManualClock::new(at(19, 0, 0));
        clock.sleep_until(at(19, 59, 45)).await;
        assert_eq!(clock.now(), at(19, 59, 45));

        clock.sleep_until(at(19, 0, 0)).await;
        assert_eq!(clock.now(), at(19, 59, 45));
    }

    #[tokio::test]
    async fn test_manual_ticker_advances_shared_clock() {
        let clock = ManualClock::new(at(20, 0, 0));
        let mut ticker = clock.ticker(Duration::from_millis(500));

        assert_eq!(ticker.tick().await, at(20, 0, 0));
        ticker.tick().await;
        let third = ticker.tick().await;
        assert_eq!(third, at(20, 0, 1));
        assert_eq!(clock.now(), at(20, 0, 1));
    }

    #[tokio::test]
    async fn test_system_sleep_until_past_returns() {
        let clock = SystemClock;
        let before = std::time::Instant::now();
        clock.sleep_until(Local::now() - TimeDelta::seconds(5)).await;
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_ticker_ticks() {
        let mut ticker = SystemClock.ticker(Duration::from_millis(500));
        let first = ticker.tick().await;
        let second = ticker.tick().await;
        assert!(second >= first);
    }
}
