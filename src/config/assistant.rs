//! Assistant tuning loaded from TOML
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below.
//!
//! ```toml
//! [session]
//! timeout_secs = 3600
//! cleanup_interval_secs = 300
//! history_limit = 50
//!
//! [matching]
//! fuzzy_threshold = 0.85
//!
//! [replies]
//! max_results = 5
//! recommend_count = 3
//! max_categories = 10
//!
//! [ordering]
//! require_phone = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::nlp::matcher::DEFAULT_FUZZY_THRESHOLD;

/// Root assistant configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub replies: RepliesConfig,

    #[serde(default)]
    pub ordering: OrderingConfig,
}

impl AssistantConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: AssistantConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matching.fuzzy_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "matching.fuzzy_threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        let counts = [
            ("session.history_limit", self.session.history_limit),
            ("replies.max_results", self.replies.max_results),
            ("replies.recommend_count", self.replies.recommend_count),
            ("replies.max_categories", self.replies.max_categories),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, n)| *n == 0) {
            return Err(ConfigError::Validation(format!("{} must be greater than 0", name)));
        }

        if self.session.cleanup_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "session.cleanup_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity after which a session is dropped
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How often the purge task runs
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Messages kept per session
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_history_limit() -> usize {
    50
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            history_limit: default_history_limit(),
        }
    }
}

/// Book-name resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum Jaro-Winkler score for a fuzzy title match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// Reply sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepliesConfig {
    /// Books listed before "... và còn N sách khác"
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_recommend_count")]
    pub recommend_count: usize,

    #[serde(default = "default_max_categories")]
    pub max_categories: usize,
}

fn default_max_results() -> usize {
    5
}

fn default_recommend_count() -> usize {
    3
}

fn default_max_categories() -> usize {
    10
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            recommend_count: default_recommend_count(),
            max_categories: default_max_categories(),
        }
    }
}

/// Order flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Reject delivery addresses that carry no phone number
    #[serde(default)]
    pub require_phone: bool,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[session]
timeout_secs = 600
history_limit = 20

[matching]
fuzzy_threshold = 0.9

[replies]
max_results = 3

[ordering]
require_phone = true
"#;

    #[test]
    fn test_parse_config() {
        let config = AssistantConfig::from_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.session.timeout(), Duration::from_secs(600));
        assert_eq!(config.session.cleanup_interval_secs, 300); // Default
        assert_eq!(config.session.history_limit, 20);
        assert_eq!(config.matching.fuzzy_threshold, 0.9);
        assert_eq!(config.replies.max_results, 3);
        assert_eq!(config.replies.recommend_count, 3);
        assert!(config.ordering.require_phone);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AssistantConfig::from_str("").unwrap();
        assert_eq!(config, AssistantConfig::default());
        assert_eq!(config.matching.fuzzy_threshold, 0.85);
        assert!(!config.ordering.require_phone);
    }

    #[test]
    fn test_validation() {
        let err = AssistantConfig::from_str("[matching]\nfuzzy_threshold = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = AssistantConfig::from_str("[replies]\nmax_results = 0").unwrap_err();
        assert!(err.to_string().contains("replies.max_results"));

        let err = AssistantConfig::from_str("[session\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AssistantConfig::from_file(Path::new("/nonexistent/assistant.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
