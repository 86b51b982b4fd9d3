//! Test utilities for database setup.
//!
//! Reuses the production initialization path (`init_db`) on a file in a
//! temporary directory, so tests run against the same schema and pragmas.

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use crate::clock::FixedClock;
use crate::config::RetryPolicy;
use crate::db::{self, DbPool};
use crate::services::StudyService;

/// A notebook database in a temporary directory and a pinned clock.
///
/// The directory (and database) is removed when dropped.
pub struct TestEnv {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    pub pool: DbPool,
    pub clock: Arc<FixedClock>,
}

impl TestEnv {
    /// Environment pinned to 2024-01-01.
    pub fn new() -> Self {
        Self::on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    /// Environment whose clock reads noon UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        let temp = TempDir::new().unwrap();
        let pool = db::init_db(&temp.path().join("charlot.db")).unwrap();
        Self {
            temp,
            pool,
            clock: Arc::new(FixedClock::on(date)),
        }
    }

    /// Study service on this database, without retries or sinks.
    pub fn service(&self) -> StudyService {
        StudyService::new(self.pool.clone(), self.clock.clone()).with_retry(RetryPolicy::none())
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn test_env_database_is_file_backed() {
        let env = TestEnv::new();
        assert!(env.path().join("charlot.db").exists());
        assert_eq!(env.clock.today(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(env.service().count_items().unwrap(), 0);
    }
}
