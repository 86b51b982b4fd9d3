//! Time source for scheduling.
//!
//! Due dates are calendar dates in UTC. Everything that needs "today" asks a
//! [`Clock`] so tests and collaborators can pin the date.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  fn today(&self) -> NaiveDate {
    self.now().date_naive()
  }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
  now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self { now: Mutex::new(now) }
  }

  /// Clock pinned to noon UTC on the given date.
  pub fn on(date: NaiveDate) -> Self {
    Self::new(noon(date))
  }

  pub fn set_date(&self, date: NaiveDate) {
    if let Ok(mut now) = self.now.lock() {
      *now = noon(date);
    }
  }

  pub fn advance_days(&self, days: i64) {
    if let Ok(mut now) = self.now.lock() {
      *now += Duration::days(days);
    }
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    match self.now.lock() {
      Ok(now) => *now,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }
}

fn noon(date: NaiveDate) -> DateTime<Utc> {
  date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc()
}
