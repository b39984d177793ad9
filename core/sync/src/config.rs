//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use listsync_common::{Error, Result};
use listsync_remote::http::DEFAULT_BASE_URL;
use listsync_remote::RetryConfig;

/// Database file name inside the data directory.
pub const DATABASE_FILENAME: &str = "listsync.db";

/// Configuration for the sync service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the remote list API.
    pub api_base_url: String,
    /// Path of the local SQLite database.
    pub database_path: PathBuf,
    /// Seconds between scheduled runs.
    pub interval_secs: u64,
    /// Per-request timeout for remote calls.
    pub request_timeout_secs: u64,
    /// Retries for transient transport failures.
    pub max_retries: u32,
    /// First transport retry delay; doubles per attempt.
    pub retry_initial_delay_ms: u64,
    /// Attempts per scheduled run before it is discarded.
    pub run_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            database_path: default_database_path(),
            interval_secs: 300,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_initial_delay_ms: 500,
            run_attempts: 3,
        }
    }
}

impl SyncConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::InvalidInput("API base URL is empty".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(Error::InvalidInput("Sync interval must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput("Request timeout must be positive".to_string()));
        }
        if self.run_attempts == 0 {
            return Err(Error::InvalidInput("Run attempts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Backoff for transient transport failures.
    pub fn transport_retry(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
    }

    /// Backoff between attempts of a failed scheduled run.
    pub fn run_retry(&self) -> RetryConfig {
        RetryConfig::new(self.run_attempts.saturating_sub(1))
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
    }
}

/// `<data dir>/listsync/listsync.db`, or the working directory if the
/// platform has no data directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("listsync")
        .join(DATABASE_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:4000");
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.transport_retry().max_retries, 3);
        assert_eq!(config.run_retry().max_retries, 2);
        assert!(config.database_path.ends_with("listsync/listsync.db"));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"api_base_url": "http://sync.example:8080", "interval_secs": 60}}"#).unwrap();

        let config = SyncConfig::load(file.path()).unwrap();

        assert_eq!(config.api_base_url, "http://sync.example:8080");
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.run_attempts, 3);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            SyncConfig::load("/nonexistent/listsync.json"),
            Err(Error::Io(_))
        ));
        assert!(matches!(
            SyncConfig::from_json("{not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = SyncConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            api_base_url: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SyncConfig {
            interval_secs: 42,
            ..Default::default()
        };
        let restored = SyncConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }
}
