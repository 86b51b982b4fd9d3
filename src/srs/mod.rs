pub mod classifier;
pub mod sm2;

pub use classifier::bucket;
pub use sm2::{next_state, preview_intervals, Sm2Result, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR};
