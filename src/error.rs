//! Error types shared by the store, scheduler and study service.

use thiserror::Error;

use crate::db::DbLockError;

#[derive(Debug, Error)]
pub enum Error {
    /// A required field was empty or an argument was out of range.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Item not found: {0}")]
    NotFound(i64),

    /// I/O failure, or lock contention that outlasted the retry policy.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage unavailable")]
    StorageUnavailable,
}

impl From<DbLockError> for Error {
    fn from(_: DbLockError) -> Self {
        Error::StorageUnavailable
    }
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// True for SQLite busy/locked failures that are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Storage(e) => crate::db::is_transient(e),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::NotFound(7).to_string(), "Item not found: 7");
        assert_eq!(
            Error::validation("front must not be empty").to_string(),
            "Invalid input: front must not be empty"
        );
        assert_eq!(Error::StorageUnavailable.to_string(), "Storage unavailable");
    }

    #[test]
    fn test_lock_error_converts_to_unavailable() {
        let err: Error = DbLockError.into();
        assert!(matches!(err, Error::StorageUnavailable));
    }

    #[test]
    fn test_only_busy_storage_errors_are_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(Error::Storage(busy).is_transient());
        assert!(!Error::Storage(rusqlite::Error::QueryReturnedNoRows).is_transient());
        assert!(!Error::NotFound(1).is_transient());
    }
}
