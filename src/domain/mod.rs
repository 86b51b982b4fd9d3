pub mod item;
pub mod review;

pub use item::{split_tags, Item, ItemFields};
pub use review::{due_after, Bucket, BucketCounts, DueItem, ReviewState, UserDifficulty, DEFAULT_EASE};
