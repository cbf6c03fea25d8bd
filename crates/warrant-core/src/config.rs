//! Governance configuration.
//!
//! Construction is validation: a config with a non-HTTPS endpoint or a
//! retry budget that could outlive a confirmation cannot exist.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confirm::TokenKind;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A fatal misconfiguration (non-HTTPS endpoint, oversized retry
    /// budget, missing artifact root).
    #[error("configuration error: {detail}")]
    ConfigurationError {
        /// What was wrong.
        detail: String,
    },

    /// The config file could not be read.
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The config file did not parse.
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A platform endpoint. HTTPS is enforced at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Base URL, `https://` only.
    pub base_url: String,
    /// Platform tag this endpoint serves.
    pub platform_tag: String,
}

impl EndpointConfig {
    /// Builds an endpoint, rejecting anything that is not HTTPS.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ConfigurationError`] for non-HTTPS URLs.
    pub fn new(base_url: &str, platform_tag: &str) -> Result<Self, ConfigError> {
        let endpoint = Self {
            base_url: base_url.to_string(),
            platform_tag: platform_tag.to_string(),
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let lowered = self.base_url.to_ascii_lowercase();
        if !lowered.starts_with("https://") {
            return Err(ConfigError::ConfigurationError {
                detail: format!("endpoint {:?} is not HTTPS", self.base_url),
            });
        }
        if self.platform_tag.trim().is_empty() {
            return Err(ConfigError::ConfigurationError {
                detail: "endpoint has an empty platform tag".to_string(),
            });
        }
        Ok(())
    }
}

/// Retry policy for transient transmission failures.
///
/// The total budget must sit strictly inside a single-use token's
/// lifetime: retries never cross the consumption boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum attempts per held request slot (first try included).
    pub max_attempts: u32,
    /// Total budget in seconds across all attempts.
    pub total_budget_secs: u32,
    /// Base backoff between attempts, in milliseconds; doubles per
    /// attempt.
    #[serde(default = "default_backoff_millis")]
    pub backoff_base_millis: u64,
}

const fn default_backoff_millis() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            total_budget_secs: 120,
            backoff_base_millis: default_backoff_millis(),
        }
    }
}

impl RetryConfig {
    /// The budget as a duration.
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        Duration::seconds(i64::from(self.total_budget_secs))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ConfigurationError {
                detail: "retry max_attempts must be at least 1".to_string(),
            });
        }
        if self.total_budget() >= TokenKind::Single.max_lifetime() {
            return Err(ConfigError::ConfigurationError {
                detail: format!(
                    "retry budget of {}s is not strictly below the {}s confirmation lifetime",
                    self.total_budget_secs,
                    TokenKind::Single.max_lifetime().num_seconds()
                ),
            });
        }
        Ok(())
    }
}

/// Top-level governance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceConfig {
    /// Root directory for captured artifacts and manifests.
    pub artifact_root: PathBuf,
    /// Optional platform endpoint for transmissions.
    #[serde(default)]
    pub endpoint: Option<EndpointConfig>,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Optional durable consume-log path.
    #[serde(default)]
    pub consume_log: Option<PathBuf>,
}

impl GovernanceConfig {
    /// Builds a config rooted at `artifact_root` with defaults.
    #[must_use]
    pub fn new(artifact_root: &Path) -> Self {
        Self {
            artifact_root: artifact_root.to_path_buf(),
            endpoint: None,
            retry: RetryConfig::default(),
            consume_log: None,
        }
    }

    /// Sets the platform endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Loads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// I/O, parse, and validation failures. Validation failures are
    /// fatal at load time, never deferred to first use.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the whole config.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ConfigurationError`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.artifact_root.as_os_str().is_empty() {
            return Err(ConfigError::ConfigurationError {
                detail: "artifact_root is empty".to_string(),
            });
        }
        if let Some(ref endpoint) = self.endpoint {
            endpoint.validate()?;
        }
        self.retry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn https_endpoint_is_accepted() {
        EndpointConfig::new("https://api.example.com/v1", "generic").unwrap();
    }

    #[test]
    fn http_endpoint_is_rejected_at_construction() {
        let err = EndpointConfig::new("http://api.example.com/v1", "generic").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigurationError { .. }));
        assert!(EndpointConfig::new("ftp://files.example.com", "generic").is_err());
    }

    #[test]
    fn retry_budget_must_fit_inside_token_lifetime() {
        let config = RetryConfig {
            max_attempts: 3,
            total_budget_secs: 15 * 60,
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());

        let zero_attempts = RetryConfig {
            max_attempts: 0,
            total_budget_secs: 10,
            ..RetryConfig::default()
        };
        assert!(zero_attempts.validate().is_err());

        RetryConfig::default().validate().unwrap();
    }

    #[test]
    fn config_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("governance.json");
        let config = GovernanceConfig::new(dir.path())
            .with_endpoint(EndpointConfig::new("https://api.example.com", "generic").unwrap());
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = GovernanceConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn loading_a_non_https_config_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("governance.json");
        let raw = serde_json::json!({
            "artifact_root": dir.path(),
            "endpoint": {"base_url": "http://api.example.com", "platform_tag": "generic"},
        });
        std::fs::write(&path, raw.to_string()).unwrap();
        assert!(matches!(
            GovernanceConfig::load(&path),
            Err(ConfigError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("governance.json");
        let raw = serde_json::json!({
            "artifact_root": dir.path(),
            "auto_retry_forever": true,
        });
        std::fs::write(&path, raw.to_string()).unwrap();
        assert!(matches!(
            GovernanceConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
