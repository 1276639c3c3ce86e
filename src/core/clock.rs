//! Injected time source
//!
//! Engines never read the system time directly; aging, due dates and SLA
//! deadlines are all computed against a [`Clock`] so tests and replays can
//! pin "now" to a fixed instant.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt::Debug;
use std::sync::RwLock;

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a settable instant
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Clock fixed at midnight UTC of `date`
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(start_of_day(date))
    }

    /// Move the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    /// Move the clock forward by whole days
    pub fn advance_days(&self, days: i64) {
        let mut guard = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Midnight UTC of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
