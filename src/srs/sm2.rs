use crate::domain::{ReviewState, UserDifficulty};

pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Longest interval ever scheduled (about a century). Keeps due dates inside
/// the four-digit years the store reads back.
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// Outcome of one SM-2 step. Dates are left to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2Result {
  pub interval_days: i64,
  pub repetitions: i64,
  pub ease: f64,
}

/// Apply one graded recall to `state`.
///
/// `quality` is SM-2 quality (0 = blackout .. 5 = perfect) and is clamped into
/// that range. Intervals are rounded half away from zero and capped at
/// [`MAX_INTERVAL_DAYS`].
pub fn next_state(state: &ReviewState, quality: i64) -> Sm2Result {
  let q = quality.clamp(0, 5);
  let ease = sanitize_ease(state.ease);
  let previous_interval = state.interval_days;

  let (interval_days, repetitions) = if q < 3 {
    // Failed review: reset
    (1, 0)
  } else {
    let reps = state.repetitions.max(0) + 1;
    let interval = match reps {
      1 => 1,
      2 => 6,
      _ if previous_interval > 0 => scaled(previous_interval, ease),
      // Reset item that reached rep 3 without a real interval
      _ => scaled(6, ease),
    };
    (interval.clamp(1, MAX_INTERVAL_DAYS), reps)
  };

  // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
  let miss = (5 - q) as f64;
  let new_ease = (ease + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR);

  Sm2Result {
    interval_days,
    repetitions,
    ease: new_ease,
  }
}

/// Interval each user difficulty (1..5) would schedule, in that order.
pub fn preview_intervals(state: &ReviewState) -> [i64; 5] {
  UserDifficulty::all().map(|d| next_state(state, d.to_quality() as i64).interval_days)
}

fn scaled(interval: i64, ease: f64) -> i64 {
  let days = (interval.min(MAX_INTERVAL_DAYS) as f64 * ease).round();
  // `as` saturates, the clamp in next_state does the rest
  days as i64
}

fn sanitize_ease(ease: f64) -> f64 {
  if ease.is_finite() {
    ease.max(MIN_EASE_FACTOR)
  } else {
    MIN_EASE_FACTOR
  }
}
