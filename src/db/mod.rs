pub mod items;
pub mod reviews;
pub mod schema;
pub mod user_state;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::RetryPolicy;

// Re-export all public items from submodules
pub use items::*;
pub use reviews::*;
pub use schema::run_migrations;
pub use user_state::*;

pub type DbPool = Arc<Mutex<Connection>>;

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
    /// Log the error at warn level and return the default
    fn log_warn_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_warn_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                T::default()
            }
        }
    }
}

/// Error returned when database lock cannot be acquired
#[derive(Debug)]
pub struct DbLockError;

impl std::fmt::Display for DbLockError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Database unavailable")
  }
}

impl std::error::Error for DbLockError {}

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> std::result::Result<MutexGuard<'_, Connection>, DbLockError> {
  pool.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
    DbLockError
  })
}

pub fn init_db(path: &Path) -> Result<DbPool> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).ok();
  }

  // Create backup before migrations if database exists
  if path.exists() {
    let backup_path = path.with_extension("db.backup");
    if let Err(e) = std::fs::copy(path, &backup_path) {
      tracing::warn!("Could not create database backup: {}", e);
    }
  }

  let conn = Connection::open(path)?;
  configure(&conn)?;
  run_migrations(&conn)?;
  tracing::info!("Opened database at {}", path.display());
  Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database with the full schema
pub fn open_in_memory() -> Result<DbPool> {
  let conn = Connection::open_in_memory()?;
  configure(&conn)?;
  run_migrations(&conn)?;
  Ok(Arc::new(Mutex::new(conn)))
}

fn configure(conn: &Connection) -> Result<()> {
  // journal_mode returns a row, so it cannot go through execute_batch
  let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  Ok(())
}

/// True for SQLITE_BUSY / SQLITE_LOCKED
pub fn is_transient(err: &rusqlite::Error) -> bool {
  matches!(
    err.sqlite_error_code(),
    Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
  )
}

/// Run `op`, retrying transient storage failures according to `policy`.
///
/// `op` must acquire (and release) the connection itself so the lock is not
/// held while waiting.
pub fn with_retry<T>(
  policy: &RetryPolicy,
  operation: &str,
  mut op: impl FnMut() -> crate::Result<T>,
) -> crate::Result<T> {
  let mut attempt = 1;
  loop {
    match op() {
      Ok(value) => return Ok(value),
      Err(e) if e.is_transient() && attempt < policy.max_attempts => {
        let delay = policy.delay_for(attempt);
        tracing::warn!(
          "{}: database busy (attempt {}/{}), retrying in {:?}",
          operation,
          attempt,
          policy.max_attempts,
          delay
        );
        std::thread::sleep(delay);
        attempt += 1;
      }
      Err(e) => {
        if e.is_transient() {
          tracing::error!("{}: giving up after {} attempts: {}", operation, attempt, e);
        }
        return Err(e);
      }
    }
  }
}

// ==================== Column encoding ====================

pub(crate) fn fmt_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

pub(crate) fn fmt_timestamp(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored date. Anything after the first 10 characters (a time of
/// day in older rows) is ignored.
pub(crate) fn parse_date(idx: usize, raw: &str) -> Result<NaiveDate> {
  let day = raw.get(..10).unwrap_or(raw);
  NaiveDate::parse_from_str(day, "%Y-%m-%d")
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a stored timestamp: RFC 3339, or a naive ISO timestamp taken as UTC.
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
    .map(|dt| dt.and_utc())
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;
  use std::time::Duration;

  fn busy() -> crate::Error {
    crate::Error::Storage(rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
      Some("database is locked".into()),
    ))
  }

  fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1))
  }

  #[test]
  fn test_with_retry_recovers_from_transient_failure() {
    let calls = Cell::new(0);
    let result = with_retry(&fast_policy(3), "test", || {
      calls.set(calls.get() + 1);
      if calls.get() < 3 { Err(busy()) } else { Ok(42) }
    });
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.get(), 3);
  }

  #[test]
  fn test_with_retry_surfaces_error_when_exhausted() {
    let calls = Cell::new(0);
    let result: crate::Result<()> = with_retry(&fast_policy(2), "test", || {
      calls.set(calls.get() + 1);
      Err(busy())
    });
    assert!(result.unwrap_err().is_transient());
    assert_eq!(calls.get(), 2);
  }

  #[test]
  fn test_with_retry_does_not_retry_permanent_errors() {
    let calls = Cell::new(0);
    let result: crate::Result<()> = with_retry(&fast_policy(5), "test", || {
      calls.set(calls.get() + 1);
      Err(crate::Error::NotFound(3))
    });
    assert!(matches!(result, Err(crate::Error::NotFound(3))));
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn test_parse_date_accepts_legacy_timestamps() {
    let d = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    assert_eq!(parse_date(0, "2024-01-03").unwrap(), d);
    assert_eq!(parse_date(0, "2024-01-03T08:15:00").unwrap(), d);
    assert!(parse_date(0, "soon").is_err());
  }

  #[test]
  fn test_parse_timestamp_formats() {
    let ts = parse_timestamp(0, "2024-01-03T08:15:00Z").unwrap();
    assert_eq!(fmt_timestamp(ts), "2024-01-03T08:15:00Z");
    let naive = parse_timestamp(0, "2024-01-03T08:15:00").unwrap();
    assert_eq!(naive, ts);
    assert!(parse_timestamp(0, "yesterday").is_err());
  }

  #[test]
  fn test_log_warn_default() {
    let failed: std::result::Result<i64, DbLockError> = Err(DbLockError);
    assert_eq!(failed.log_warn_default("lock"), 0);
    let ok: std::result::Result<i64, DbLockError> = Ok(5);
    assert_eq!(ok.log_warn("lock"), Some(5));
  }

  #[test]
  fn test_open_in_memory_has_schema() {
    let pool = open_in_memory().unwrap();
    let conn = try_lock(&pool).unwrap();
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
      .unwrap();
    assert_eq!(count, 0);
  }
}
