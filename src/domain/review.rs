use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Item;
use crate::error::{Error, Result};

/// Ease assigned to every new item.
pub const DEFAULT_EASE: f64 = 2.5;

/// Scheduling metadata, exactly one per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
  pub item_id: i64,
  pub due_date: NaiveDate,
  pub interval_days: i64,
  pub repetitions: i64,
  pub ease: f64,
  /// Raw user difficulty (1..5) of the most recent grade, not SM-2 quality.
  pub last_quality: Option<i64>,
  pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewState {
  /// Fresh state: due immediately, never graded.
  pub fn new(item_id: i64, today: NaiveDate) -> Self {
    Self {
      item_id,
      due_date: today,
      interval_days: 0,
      repetitions: 0,
      ease: DEFAULT_EASE,
      last_quality: None,
      last_reviewed_at: None,
    }
  }

  pub fn is_due(&self, on: NaiveDate) -> bool {
    self.due_date <= on
  }

  pub fn is_new(&self) -> bool {
    self.last_reviewed_at.is_none()
  }
}

/// An item together with its review state, as returned by the due queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueItem {
  pub item: Item,
  pub review: ReviewState,
}

/// How hard recall felt to the learner: 1 = very easy .. 5 = very hard.
///
/// This is the inverse of SM-2 quality. It is the value persisted as
/// `last_quality`; [`UserDifficulty::to_quality`] is the only place the two
/// scales are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserDifficulty(u8);

impl UserDifficulty {
  pub const VERY_EASY: Self = Self(1);
  pub const VERY_HARD: Self = Self(5);

  pub fn new(value: i64) -> Result<Self> {
    if (1..=5).contains(&value) {
      Ok(Self(value as u8))
    } else {
      Err(Error::validation(format!(
        "difficulty must be between 1 and 5, got {}",
        value
      )))
    }
  }

  pub fn value(self) -> i64 {
    self.0 as i64
  }

  /// SM-2 quality for this rating (`6 - difficulty`).
  pub fn to_quality(self) -> u8 {
    6 - self.0
  }

  pub fn label(self) -> &'static str {
    match self.0 {
      1 => "very easy",
      2 => "easy",
      3 => "okay",
      4 => "hard",
      _ => "very hard",
    }
  }

  pub fn all() -> [Self; 5] {
    [Self(1), Self(2), Self(3), Self(4), Self(5)]
  }
}

impl TryFrom<i64> for UserDifficulty {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self> {
    Self::new(value)
  }
}

impl From<UserDifficulty> for i64 {
  fn from(d: UserDifficulty) -> i64 {
    d.value()
  }
}

/// Coarse triage bucket derived from the last grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
  New,
  Easy,
  Meh,
  Difficult,
}

impl Bucket {
  pub const ALL: [Bucket; 4] = [Bucket::New, Bucket::Difficult, Bucket::Meh, Bucket::Easy];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::New => "new",
      Self::Easy => "easy",
      Self::Meh => "meh",
      Self::Difficult => "difficult",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "new" => Some(Self::New),
      "easy" => Some(Self::Easy),
      "meh" => Some(Self::Meh),
      "difficult" => Some(Self::Difficult),
      _ => None,
    }
  }
}

/// Per-bucket item counts for UI badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
  pub new: u64,
  pub easy: u64,
  pub meh: u64,
  pub difficult: u64,
}

impl BucketCounts {
  pub fn add(&mut self, bucket: Bucket) {
    match bucket {
      Bucket::New => self.new += 1,
      Bucket::Easy => self.easy += 1,
      Bucket::Meh => self.meh += 1,
      Bucket::Difficult => self.difficult += 1,
    }
  }

  pub fn get(&self, bucket: Bucket) -> u64 {
    match bucket {
      Bucket::New => self.new,
      Bucket::Easy => self.easy,
      Bucket::Meh => self.meh,
      Bucket::Difficult => self.difficult,
    }
  }

  pub fn total(&self) -> u64 {
    self.new + self.easy + self.meh + self.difficult
  }
}

/// Due date for a freshly scheduled interval.
///
/// Never later than 9999-12-31 and never before `today`.
pub fn due_after(today: NaiveDate, interval_days: i64) -> NaiveDate {
  let latest = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
  let days = u64::try_from(interval_days).unwrap_or(0);
  today
    .checked_add_days(Days::new(days))
    .map_or(latest, |due| due.min(latest))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  // ReviewState tests

  #[test]
  fn test_review_state_new_defaults() {
    let state = ReviewState::new(9, date(2024, 3, 1));
    assert_eq!(state.item_id, 9);
    assert_eq!(state.due_date, date(2024, 3, 1));
    assert_eq!(state.interval_days, 0);
    assert_eq!(state.repetitions, 0);
    assert!((state.ease - 2.5).abs() < f64::EPSILON);
    assert!(state.last_quality.is_none());
    assert!(state.last_reviewed_at.is_none());
    assert!(state.is_new());
  }

  #[test]
  fn test_review_state_is_due_by_calendar_date() {
    let state = ReviewState::new(1, date(2024, 1, 2));
    assert!(!state.is_due(date(2024, 1, 1)));
    assert!(state.is_due(date(2024, 1, 2)));
    assert!(state.is_due(date(2024, 1, 3)));
  }

  #[test]
  fn test_due_after() {
    assert_eq!(due_after(date(2024, 1, 30), 6), date(2024, 2, 5));
    assert_eq!(due_after(date(2024, 1, 30), 0), date(2024, 1, 30));
    assert_eq!(due_after(date(2024, 1, 30), -3), date(2024, 1, 30));
    assert_eq!(due_after(date(2024, 1, 30), i64::MAX), date(9999, 12, 31));
    assert_eq!(due_after(date(9999, 12, 1), 60), date(9999, 12, 31));
  }

  // UserDifficulty tests

  #[test]
  fn test_user_difficulty_range() {
    assert!(UserDifficulty::new(0).is_err());
    assert!(UserDifficulty::new(6).is_err());
    assert!(UserDifficulty::new(-3).is_err());
    for v in 1..=5 {
      assert_eq!(UserDifficulty::new(v).unwrap().value(), v);
    }
  }

  #[test]
  fn test_user_difficulty_to_quality_is_inverted() {
    assert_eq!(UserDifficulty::new(1).unwrap().to_quality(), 5);
    assert_eq!(UserDifficulty::new(2).unwrap().to_quality(), 4);
    assert_eq!(UserDifficulty::new(3).unwrap().to_quality(), 3);
    assert_eq!(UserDifficulty::new(4).unwrap().to_quality(), 2);
    assert_eq!(UserDifficulty::new(5).unwrap().to_quality(), 1);
  }

  #[test]
  fn test_user_difficulty_serde() {
    let d: UserDifficulty = serde_json::from_str("4").unwrap();
    assert_eq!(d.value(), 4);
    assert_eq!(serde_json::to_string(&d).unwrap(), "4");
    assert!(serde_json::from_str::<UserDifficulty>("9").is_err());
  }

  // Bucket tests

  #[test]
  fn test_bucket_as_str_roundtrip() {
    for bucket in Bucket::ALL {
      assert_eq!(Bucket::from_str(bucket.as_str()), Some(bucket));
    }
    assert_eq!(Bucket::from_str("hard"), None);
  }

  #[test]
  fn test_bucket_counts() {
    let mut counts = BucketCounts::default();
    counts.add(Bucket::New);
    counts.add(Bucket::New);
    counts.add(Bucket::Meh);
    counts.add(Bucket::Difficult);

    assert_eq!(counts.get(Bucket::New), 2);
    assert_eq!(counts.get(Bucket::Easy), 0);
    assert_eq!(counts.get(Bucket::Meh), 1);
    assert_eq!(counts.get(Bucket::Difficult), 1);
    assert_eq!(counts.total(), 4);
  }
}
