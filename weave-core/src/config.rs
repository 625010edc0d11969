//! Configuration
//!
//! Settings for the components that need them: the default log level and
//! the clock granularity. Every field has a default, so an empty document is
//! a valid configuration.
//!
//! ```json
//! {
//!   "log_level": "debug",
//!   "clock": { "granularity_ms": 100 }
//! }
//! ```

use serde::Deserialize;

use crate::error::ConfigError;
use crate::log::LogLevel;

/// Top level settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub clock: ClockConfig,
}

/// Settings of a [`Clock`](crate::reactive::Clock).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClockConfig {
    /// Refresh interval and truncation step, in milliseconds.
    pub granularity_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { granularity_ms: 1000 }
    }
}

impl Config {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.granularity_ms == 0 {
            return Err(ConfigError::InvalidGranularity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.clock.granularity_ms, 1000);
    }

    #[test]
    fn parses_all_fields() {
        let config = Config::from_json_str(r#"{"log_level": "warning", "clock": {"granularity_ms": 50}}"#).unwrap();
        assert_eq!(config.log_level, LogLevel::Warning);
        assert_eq!(config.clock.granularity_ms, 50);
    }

    #[test]
    fn rejects_zero_granularity() {
        let result = Config::from_json_str(r#"{"clock": {"granularity_ms": 0}}"#);
        assert!(matches!(result, Err(ConfigError::InvalidGranularity)));
    }

    #[test]
    fn rejects_unknown_level() {
        let result = Config::from_json_str(r#"{"log_level": "loud"}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
