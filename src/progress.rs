//! XP, levels and daily streaks.
//!
//! Progress is a consumer of study events: it never blocks or fails the
//! operation that produced the event.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::{RetryPolicy, XP_PER_LEVEL};
use crate::db::{self, DbPool, LogOnError};
use crate::events::{EventSink, StudyEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
  pub xp: i64,
  /// Consecutive days with at least one XP award
  pub streak: i64,
  pub last_xp_date: Option<NaiveDate>,
}

impl Default for Progress {
  /// Same starting values as a fresh `user_state` row
  fn default() -> Self {
    Self {
      xp: 0,
      streak: 1,
      last_xp_date: None,
    }
  }
}

impl Progress {
  /// Add XP earned on `today`, updating the streak.
  pub fn award(&mut self, amount: i64, today: NaiveDate) {
    if amount <= 0 {
      return;
    }
    self.streak = match self.last_xp_date {
      Some(last) if last == today => self.streak.max(1),
      Some(last) if last.succ_opt() == Some(today) => self.streak + 1,
      _ => 1,
    };
    self.last_xp_date = Some(today);
    self.xp += amount;
  }

  pub fn level(&self) -> (i64, i64, i64) {
    level_from_xp(self.xp)
  }
}

/// `(level, xp into the current level, xp per level)`. Every
/// `XP_PER_LEVEL` points is one level, starting from level 0.
pub fn level_from_xp(xp: i64) -> (i64, i64, i64) {
  let xp = xp.max(0);
  (xp / XP_PER_LEVEL, xp % XP_PER_LEVEL, XP_PER_LEVEL)
}

/// XP granted for an event.
fn xp_for(event: &StudyEvent) -> i64 {
  match event {
    StudyEvent::ItemCreated { .. } | StudyEvent::ItemUpdated { .. } | StudyEvent::GradeSubmitted { .. } => 1,
    // Earned XP is never taken back
    StudyEvent::ItemDeleted { .. } => 0,
  }
}

/// Persists progress in response to study events.
pub struct ProgressTracker {
  pool: DbPool,
  retry: RetryPolicy,
  clock: Arc<dyn Clock>,
}

impl ProgressTracker {
  pub fn new(pool: DbPool, retry: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
    Self { pool, retry, clock }
  }

  pub fn current(&self) -> crate::Result<Progress> {
    db::with_retry(&self.retry, "load progress", || {
      let conn = db::try_lock(&self.pool)?;
      Ok(db::get_progress(&conn)?)
    })
  }

  /// Make sure XP is at least the number of items in the notebook.
  pub fn reconcile_with_item_count(&self) -> crate::Result<Progress> {
    db::with_retry(&self.retry, "reconcile progress", || {
      let conn = db::try_lock(&self.pool)?;
      let items = db::count_items(&conn)?;
      let mut progress = db::get_progress(&conn)?;
      if progress.xp < items {
        tracing::info!("Raising XP from {} to item count {}", progress.xp, items);
        progress.xp = items;
        db::save_progress(&conn, &progress)?;
      }
      Ok(progress)
    })
  }

  fn award(&self, amount: i64, today: NaiveDate) -> crate::Result<Progress> {
    db::with_retry(&self.retry, "award xp", || {
      let conn = db::try_lock(&self.pool)?;
      let mut progress = db::get_progress(&conn)?;
      progress.award(amount, today);
      db::save_progress(&conn, &progress)?;
      Ok(progress)
    })
  }
}

impl EventSink for ProgressTracker {
  fn publish(&self, event: &StudyEvent, _at: DateTime<Utc>) {
    let amount = xp_for(event);
    if amount <= 0 {
      return;
    }
    // Same calendar as due dates
    let today = self.clock.today();
    if let Some(progress) = self.award(amount, today).log_warn("Failed to record XP") {
      tracing::debug!("XP now {} (streak {})", progress.xp, progress.streak);
    }
  }
}
