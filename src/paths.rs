//! Project path functions - single source of truth for all file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data")
//!
//! This allows running isolated notebooks side by side:
//! ```bash
//! DATA_DIR=data/spanish charlot due
//! ```

use std::env;
use std::sync::OnceLock;

/// Config file looked up in the working directory
pub const CONFIG_FILE: &str = "config.toml";

static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Get the base data directory (from DATA_DIR env var or default "data")
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// SQLite database holding items, review states and progress
pub fn db_path() -> String {
    format!("{}/charlot.db", data_dir())
}

/// Default location of the JSONL event log
pub fn event_log_path() -> String {
    format!("{}/events.jsonl", data_dir())
}
