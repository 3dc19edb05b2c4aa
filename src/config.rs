use crate::dispatch::join_url;
use crate::error::{ErrorKind, Result};
use crate::model::dtos::RequestOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "LESSON_ENROLL_BASE_URL";
pub const ENV_QUEUE_DIR: &str = "LESSON_ENROLL_QUEUE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server origin, e.g. "http://localhost:8080"
    pub base_url: String,
    /// Prefix of the enrollment endpoints
    pub api_base: String,
    pub analytics_path: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub retry_client_errors: bool,
    /// Storage key of the offline queue
    pub queue_key: String,
    /// Directory of the queue file (native only)
    pub queue_dir: Option<PathBuf>,
    pub queue_on_failure: bool,
    pub telemetry_enabled: bool,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_base: "/enrollment".to_string(),
            analytics_path: "/analytics/track".to_string(),
            max_attempts: RequestOptions::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 1000,
            retry_client_errors: false,
            queue_key: "enrollmentOfflineData".to_string(),
            queue_dir: None,
            queue_on_failure: true,
            telemetry_enabled: true,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file or fall back to defaults, then
    /// apply environment overrides
    pub fn load_or_default(path: &Path) -> Self {
        let mut config = Self::read_file(path).unwrap_or_default();

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Ok(dir) = std::env::var(ENV_QUEUE_DIR) {
            config.queue_dir = Some(PathBuf::from(dir));
        }

        log::info!(
            "client config: base_url={}, max_attempts={}, base_delay_ms={}",
            config.base_url,
            config.max_attempts,
            config.base_delay_ms
        );
        config
    }

    fn read_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<ClientConfig>(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::error!("Failed to parse {}: {}, using defaults", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::error!("Failed to read {}: {}, using defaults", path.display(), e);
                None
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ErrorKind::Config("base_url must not be empty".to_string()).into());
        }
        if self.queue_key.trim().is_empty() {
            return Err(ErrorKind::Config("queue_key must not be empty".to_string()).into());
        }
        Ok(())
    }

    /// Base URL the dispatcher resolves endpoints against
    pub fn api_url(&self) -> String {
        join_url(&self.base_url, &self.api_base)
    }

    pub fn analytics_url(&self) -> String {
        join_url(&self.base_url, &self.analytics_path)
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            retry_client_errors: self.retry_client_errors,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Queue directory, `./.lesson-enroll` when unset
    pub fn queue_dir_or_default(&self) -> PathBuf {
        self.queue_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".lesson-enroll"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_file_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(ClientConfig::read_file(&temp_dir.path().join("client.json")), None);
    }

    #[test]
    fn test_read_file_partial_uses_defaults_for_rest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("client.json");

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"base_url": "https://lms.example.edu", "max_attempts": 5}"#)
            .unwrap();

        let config = ClientConfig::read_file(&path).unwrap();
        assert_eq!(config.base_url, "https://lms.example.edu");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.queue_key, "enrollmentOfflineData");
        assert_eq!(config.api_url(), "https://lms.example.edu/enrollment");
        assert_eq!(config.analytics_url(), "https://lms.example.edu/analytics/track");
    }

    #[test]
    fn test_read_file_invalid_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("client.json");
        std::fs::write(&path, b"invalid json").unwrap();

        assert_eq!(ClientConfig::read_file(&path), None);
    }

    #[test]
    fn test_request_options_follow_config() {
        let config = ClientConfig {
            max_attempts: 4,
            base_delay_ms: 250,
            retry_client_errors: true,
            ..ClientConfig::default()
        };
        let options = config.request_options();
        assert_eq!(options.max_attempts, 4);
        assert_eq!(options.base_delay, Duration::from_millis(250));
        assert!(options.retry_client_errors);
        assert_eq!(ClientConfig::default().request_options(), RequestOptions::default());
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());
        let config = ClientConfig {
            base_url: " ".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err().kind(),
            ErrorKind::Config(_)
        ));
    }
}
