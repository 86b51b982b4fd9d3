//! Application configuration.
//!
//! Values are resolved with priority: config.toml > environment (.env is
//! loaded first) > built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

// ==================== Defaults ====================

/// Language tag applied when an item is saved without one
pub const DEFAULT_LANGUAGE: &str = "fr";

/// Attempts made for a storage operation hitting lock contention
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between storage retries (grows linearly per attempt)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 50;

/// Experience points needed per level
pub const XP_PER_LEVEL: i64 = 10;

/// Days covered by the due forecast
pub const FORECAST_DAYS: u32 = 14;

// ==================== config.toml structure ====================

#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    database: Option<DatabaseConfig>,
    retry: Option<RetryConfig>,
    events: Option<EventsConfig>,
    items: Option<ItemsConfig>,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetryConfig {
    max_attempts: Option<u32>,
    delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EventsConfig {
    log_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsConfig {
    default_language: Option<String>,
}

// ==================== Retry policy ====================

/// Bounded retry for transient storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based): linear backoff
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        )
    }
}

// ==================== Resolved settings ====================

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub retry: RetryPolicy,
    /// JSONL event log, disabled when None
    pub event_log: Option<PathBuf>,
    pub default_language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(paths::db_path()),
            retry: RetryPolicy::default(),
            event_log: None,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from ./config.toml and the environment
    pub fn load() -> Self {
        Self::load_from(Path::new(paths::CONFIG_FILE))
    }

    pub fn load_from(config_path: &Path) -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let file_config = match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Ignoring unparseable {}: {}", config_path.display(), e);
                    AppConfig::default()
                }
            },
            Err(_) => AppConfig::default(),
        };

        Self::resolve(file_config, |key| std::env::var(key).ok())
    }

    fn resolve(file: AppConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // Priority 1: config.toml, priority 2: environment
        let database_path = file
            .database
            .and_then(|db| db.path)
            .or_else(|| env("CHARLOT_DB_PATH"))
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        tracing::debug!("Using database path: {}", database_path.display());

        let (file_attempts, file_delay) = match file.retry {
            Some(r) => (r.max_attempts, r.delay_ms),
            None => (None, None),
        };
        let max_attempts = file_attempts
            .or_else(|| env("CHARLOT_RETRY_ATTEMPTS").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS);
        let delay_ms = file_delay
            .or_else(|| env("CHARLOT_RETRY_DELAY_MS").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_RETRY_DELAY_MS);

        let event_log = file
            .events
            .and_then(|e| e.log_path)
            .or_else(|| env("CHARLOT_EVENT_LOG"))
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let default_language = file
            .items
            .and_then(|i| i.default_language)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or(defaults.default_language);

        Self {
            database_path,
            retry: RetryPolicy::new(max_attempts, std::time::Duration::from_millis(delay_ms)),
            event_log,
            default_language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn parse(toml_str: &str) -> AppConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let settings = Settings::resolve(AppConfig::default(), env_from(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.delay, Duration::from_millis(50));
        assert!(settings.event_log.is_none());
        assert_eq!(settings.default_language, "fr");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = env_from(&[
            ("CHARLOT_DB_PATH", "/tmp/vocab.db"),
            ("CHARLOT_RETRY_ATTEMPTS", "5"),
            ("CHARLOT_RETRY_DELAY_MS", "10"),
            ("CHARLOT_EVENT_LOG", "/tmp/events.jsonl"),
        ]);
        let settings = Settings::resolve(AppConfig::default(), env);
        assert_eq!(settings.database_path, PathBuf::from("/tmp/vocab.db"));
        assert_eq!(settings.retry, RetryPolicy::new(5, Duration::from_millis(10)));
        assert_eq!(settings.event_log, Some(PathBuf::from("/tmp/events.jsonl")));
    }

    #[test]
    fn test_config_file_beats_env() {
        let file = parse(
            r#"
            [database]
            path = "notebook.db"

            [retry]
            max_attempts = 7

            [items]
            default_language = "en"
            "#,
        );
        let env = env_from(&[
            ("CHARLOT_DB_PATH", "/tmp/other.db"),
            ("CHARLOT_RETRY_ATTEMPTS", "2"),
            ("CHARLOT_RETRY_DELAY_MS", "20"),
        ]);
        let settings = Settings::resolve(file, env);
        assert_eq!(settings.database_path, PathBuf::from("notebook.db"));
        assert_eq!(settings.retry.max_attempts, 7);
        // delay not in file, so env applies
        assert_eq!(settings.retry.delay, Duration::from_millis(20));
        assert_eq!(settings.default_language, "en");
    }

    #[test]
    fn test_unparseable_env_values_fall_back() {
        let env = env_from(&[("CHARLOT_RETRY_ATTEMPTS", "many"), ("CHARLOT_EVENT_LOG", "  ")]);
        let settings = Settings::resolve(AppConfig::default(), env);
        assert_eq!(settings.retry.max_attempts, DEFAULT_RETRY_ATTEMPTS);
        assert!(settings.event_log.is_none());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let settings = Settings::load_from(Path::new("/nonexistent/charlot/config.toml"));
        assert!(settings.retry.max_attempts >= 1);
        assert!(!settings.default_language.is_empty());
    }

    #[test]
    fn test_retry_policy_minimum_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_retry_policy_linear_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(25));
        assert_eq!(policy.delay_for(1), Duration::from_millis(25));
        assert_eq!(policy.delay_for(3), Duration::from_millis(75));
    }
}
