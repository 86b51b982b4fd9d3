//! Difficulty buckets for review triage.
//!
//! Buckets are computed from the persisted `last_quality`, which holds the raw
//! user difficulty (5 = felt very hard). High values therefore land in
//! `Difficult` even though the scheduler saw them as low SM-2 quality.

use crate::domain::Bucket;

pub fn bucket(last_quality: Option<i64>) -> Bucket {
  match last_quality {
    None => Bucket::New,
    // Not produced by the grading path; legacy rows only
    Some(q) if q <= 0 => Bucket::Difficult,
    Some(q) if q >= 4 => Bucket::Difficult,
    Some(3) => Bucket::Meh,
    Some(_) => Bucket::Easy,
  }
}
