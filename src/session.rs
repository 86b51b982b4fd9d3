//! Review session: a walk over the items due when the session started.
//!
//! The queue is fixed at start. Grading an item reschedules it but does not
//! remove it, so a later round shows it again until the session is dropped
//! or restarted from a fresh queue. The session is a plain value owned by
//! the caller.

use chrono::NaiveDate;

use crate::domain::{DueItem, ReviewState, UserDifficulty};
use crate::error::{Error, Result};
use crate::services::StudyService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
  /// Nothing was due when the session started
  NothingDue,
  /// `position` is 0-based
  InProgress { position: usize, total: usize },
}

/// Result of moving through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  NothingDue,
  Moved { position: usize },
  /// The end of the queue was reached and the position wrapped to 0.
  /// Returned once per wrap.
  Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graded {
  pub item_id: i64,
  /// None when the item vanished before it could be graded
  pub state: Option<ReviewState>,
  pub step: Step,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewSession {
  queue: Vec<i64>,
  position: usize,
  rounds_completed: u32,
}

impl ReviewSession {
  /// Build the queue from the items due on `as_of`.
  pub fn start(svc: &StudyService, as_of: NaiveDate) -> Result<Self> {
    let queue: Vec<i64> = svc.due_items(as_of)?.iter().map(|due| due.item.id).collect();
    tracing::debug!("Review session started with {} items due by {}", queue.len(), as_of);
    Ok(Self::from_queue(queue))
  }

  pub fn from_queue(queue: Vec<i64>) -> Self {
    Self {
      queue,
      position: 0,
      rounds_completed: 0,
    }
  }

  pub fn status(&self) -> SessionStatus {
    if self.queue.is_empty() {
      SessionStatus::NothingDue
    } else {
      SessionStatus::InProgress {
        position: self.position,
        total: self.queue.len(),
      }
    }
  }

  pub fn queue(&self) -> &[i64] {
    &self.queue
  }

  pub fn rounds_completed(&self) -> u32 {
    self.rounds_completed
  }

  pub fn current_id(&self) -> Option<i64> {
    self.queue.get(self.position).copied()
  }

  /// Load the current item. `Ok(None)` if nothing is due or the item was
  /// deleted since the session started; callers should `skip()` past it.
  pub fn current(&self, svc: &StudyService) -> Result<Option<DueItem>> {
    match self.current_id() {
      Some(id) => svc.get_item_with_review(id),
      None => Ok(None),
    }
  }

  /// Grade the current item and move to the next one.
  ///
  /// A vanished item is skipped rather than reported. Any other failure
  /// leaves the position unchanged. Returns None when nothing is due.
  pub fn grade(&mut self, svc: &StudyService, difficulty: UserDifficulty) -> Result<Option<Graded>> {
    let Some(item_id) = self.current_id() else {
      return Ok(None);
    };

    let state = match svc.grade(item_id, difficulty) {
      Ok(state) => Some(state),
      Err(Error::NotFound(_)) => {
        tracing::info!("Item {} was deleted during the session, skipping", item_id);
        None
      }
      Err(e) => return Err(e),
    };

    let step = self.advance();
    Ok(Some(Graded { item_id, state, step }))
  }

  /// Move on without grading.
  pub fn skip(&mut self) -> Step {
    self.advance()
  }

  /// Go back one item, stopping at the first.
  pub fn back(&mut self) -> Step {
    if self.queue.is_empty() {
      return Step::NothingDue;
    }
    self.position = self.position.saturating_sub(1);
    Step::Moved {
      position: self.position,
    }
  }

  pub fn restart(&mut self) {
    self.position = 0;
  }

  fn advance(&mut self) -> Step {
    if self.queue.is_empty() {
      return Step::NothingDue;
    }
    self.position += 1;
    if self.position >= self.queue.len() {
      self.position = 0;
      self.rounds_completed += 1;
      Step::Completed
    } else {
      Step::Moved {
        position: self.position,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::Clock;
  use crate::domain::ItemFields;
  use crate::testing::TestEnv;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn d(value: i64) -> UserDifficulty {
    UserDifficulty::new(value).unwrap()
  }

  fn env_with_items(fronts: &[&str]) -> (TestEnv, Vec<i64>) {
    let env = TestEnv::on(date(2024, 1, 1));
    let svc = env.service();
    let ids = fronts
      .iter()
      .map(|f| svc.create_item(&ItemFields::new(*f, "x")).unwrap())
      .collect();
    (env, ids)
  }

  #[test]
  fn test_empty_session_reports_nothing_due() {
    let env = TestEnv::new();
    let svc = env.service();
    let mut session = ReviewSession::start(&svc, env.clock.today()).unwrap();

    assert_eq!(session.status(), SessionStatus::NothingDue);
    assert!(session.current(&svc).unwrap().is_none());
    assert_eq!(session.grade(&svc, d(1)).unwrap(), None);
    assert_eq!(session.skip(), Step::NothingDue);
    assert_eq!(session.back(), Step::NothingDue);
  }

  #[test]
  fn test_grade_advances_and_persists() {
    let (env, ids) = env_with_items(&["un", "deux"]);
    let svc = env.service();
    let mut session = ReviewSession::start(&svc, date(2024, 1, 1)).unwrap();
    assert_eq!(session.status(), SessionStatus::InProgress { position: 0, total: 2 });
    assert_eq!(session.current(&svc).unwrap().unwrap().item.id, ids[0]);

    let graded = session.grade(&svc, d(2)).unwrap().unwrap();
    assert_eq!(graded.item_id, ids[0]);
    assert_eq!(graded.step, Step::Moved { position: 1 });
    let state = graded.state.unwrap();
    assert_eq!(state.due_date, date(2024, 1, 2));
    assert_eq!(svc.get_item_with_review(ids[0]).unwrap().unwrap().review, state);
  }

  #[test]
  fn test_completion_signalled_once_per_wrap() {
    let (env, _) = env_with_items(&["un", "deux"]);
    let svc = env.service();
    let mut session = ReviewSession::start(&svc, date(2024, 1, 1)).unwrap();

    assert_eq!(session.skip(), Step::Moved { position: 1 });
    assert_eq!(session.grade(&svc, d(3)).unwrap().unwrap().step, Step::Completed);
    assert_eq!(session.status(), SessionStatus::InProgress { position: 0, total: 2 });
    assert_eq!(session.rounds_completed(), 1);

    // Further movement is ordinary until the next wrap
    assert_eq!(session.skip(), Step::Moved { position: 1 });
    assert_eq!(session.skip(), Step::Completed);
    assert_eq!(session.rounds_completed(), 2);
  }

  #[test]
  fn test_back_floors_at_zero_and_skip_does_not_mutate() {
    let (env, ids) = env_with_items(&["un", "deux", "trois"]);
    let svc = env.service();
    let mut session = ReviewSession::start(&svc, date(2024, 1, 1)).unwrap();

    assert_eq!(session.back(), Step::Moved { position: 0 });
    session.skip();
    session.skip();
    assert_eq!(session.current_id(), Some(ids[2]));
    assert_eq!(session.back(), Step::Moved { position: 1 });

    for id in &ids {
      let review = svc.get_item_with_review(*id).unwrap().unwrap().review;
      assert!(review.is_new());
    }

    session.restart();
    assert_eq!(session.current_id(), Some(ids[0]));
  }

  #[test]
  fn test_queue_is_fixed_at_start() {
    let (env, ids) = env_with_items(&["un"]);
    let svc = env.service();
    let mut session = ReviewSession::start(&svc, date(2024, 1, 1)).unwrap();

    svc.create_item(&ItemFields::new("deux", "two")).unwrap();
    assert_eq!(session.queue(), &ids[..]);

    // Graded items stay in the queue for the next round
    session.grade(&svc, d(1)).unwrap();
    assert_eq!(session.current_id(), Some(ids[0]));
  }

  #[test]
  fn test_vanished_item_is_skipped() {
    let (env, ids) = env_with_items(&["un", "deux"]);
    let svc = env.service();
    let mut session = ReviewSession::start(&svc, date(2024, 1, 1)).unwrap();

    svc.delete_item(ids[0]).unwrap();
    assert!(session.current(&svc).unwrap().is_none());

    let graded = session.grade(&svc, d(1)).unwrap().unwrap();
    assert_eq!(graded.item_id, ids[0]);
    assert!(graded.state.is_none());
    assert_eq!(graded.step, Step::Moved { position: 1 });
    assert_eq!(session.current(&svc).unwrap().unwrap().item.id, ids[1]);
  }
}
