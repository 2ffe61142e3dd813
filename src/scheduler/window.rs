//! Attack and fallback windows around the daily release instant

use chrono::{DateTime, Local, NaiveTime, TimeDelta};
use std::fmt;
use std::time::Duration;

use crate::utils::local_instant;

/// Grace period after the release instant covered by the fallback phase
pub const DEFAULT_FALLBACK_WINDOW: Duration = Duration::from_secs(15);

/// Closed interval of instants, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl TimeWindow {
    /// Build a window, swapping the bounds if they arrive reversed
    pub fn new(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, t: DateTime<Local>) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn not_yet_open(&self, t: DateTime<Local>) -> bool {
        t < self.start
    }

    pub fn has_closed(&self, t: DateTime<Local>) -> bool {
        t > self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.start.format("%H:%M:%S"),
            self.end.format("%H:%M:%S")
        )
    }
}

/// The three instants of one day's run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleasePlan {
    pub attack_start: DateTime<Local>,
    pub release: DateTime<Local>,
    pub fallback_end: DateTime<Local>,
}

impl ReleasePlan {
    /// Primary seat only, from the lead instant to the release instant
    pub fn attack_window(&self) -> TimeWindow {
        TimeWindow::new(self.attack_start, self.release)
    }

    /// Every seat, from the release instant to the end of the grace period
    pub fn fallback_window(&self) -> TimeWindow {
        TimeWindow::new(self.release, self.fallback_end)
    }

    pub fn has_passed(&self, now: DateTime<Local>) -> bool {
        now > self.fallback_end
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Compute today's plan
///
/// Inputs are assumed validated upstream (hour 0-23, minute 0-59). The release
/// instant is `now`'s date at `release_hour:release_minute` local time.
pub fn plan(
    release_hour: u32,
    release_minute: u32,
    preempt_lead: Duration,
    fallback_window: Duration,
    now: DateTime<Local>,
) -> ReleasePlan {
    let time = NaiveTime::from_hms_opt(release_hour.min(23), release_minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);
    let release = local_instant(now.date_naive().and_time(time));

    ReleasePlan {
        attack_start: release - to_delta(preempt_lead),
        release,
        fallback_end: release + to_delta(fallback_window),
    }
}
