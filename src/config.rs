//! Detector configuration.
//!
//! Detection is opt-in: a default config leaves the detector disabled and
//! every pass is skipped until the host flips the switch. Settings resolve
//! programmatic values first, then `TASKLEAK_*` environment variables, then
//! defaults.
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `TASKLEAK_ENABLED` | `bool` | `enabled` |
//! | `TASKLEAK_QUIESCE_BUDGET_MS` | `u64` | `quiesce_budget` |
//! | `TASKLEAK_PASS_BUDGET_MS` | `u64` | `pass_budget` |

use std::time::Duration;
use thiserror::Error;

/// Environment variable enabling detection.
pub const ENV_ENABLED: &str = "TASKLEAK_ENABLED";
/// Environment variable for the quiescence budget in milliseconds.
pub const ENV_QUIESCE_BUDGET_MS: &str = "TASKLEAK_QUIESCE_BUDGET_MS";
/// Environment variable for the per-pass soft budget in milliseconds.
pub const ENV_PASS_BUDGET_MS: &str = "TASKLEAK_PASS_BUDGET_MS";

/// An unparseable configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for {variable}")]
pub struct ConfigError {
    /// The environment variable that failed to parse.
    pub variable: &'static str,
    /// The raw value found.
    pub value: String,
}

/// Configuration for a [`LeakDetector`](crate::detector::LeakDetector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Master switch. When false every requested pass is skipped.
    pub enabled: bool,
    /// How long the scheduler may take to reach quiescence before the pass
    /// is abandoned.
    pub quiesce_budget: Duration,
    /// Soft wall-clock budget for a whole pass. Exceeding it aborts the pass
    /// rather than extending the host's pause.
    pub pass_budget: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            quiesce_budget: Duration::from_millis(10),
            pass_budget: Duration::from_millis(250),
        }
    }
}

impl DetectorConfig {
    /// Default configuration with detection switched on.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Sets the master switch.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the quiescence budget.
    #[must_use]
    pub fn with_quiesce_budget(mut self, budget: Duration) -> Self {
        self.quiesce_budget = budget;
        self
    }

    /// Sets the per-pass soft budget.
    #[must_use]
    pub fn with_pass_budget(mut self, budget: Duration) -> Self {
        self.pass_budget = budget;
        self
    }

    /// Builds a configuration from defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `TASKLEAK_*` environment overrides to this configuration.
    ///
    /// Unset variables leave the current values untouched.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &value)?;
        }
        if let Some(value) = read_env(ENV_QUIESCE_BUDGET_MS) {
            self.quiesce_budget = Duration::from_millis(parse_u64(ENV_QUIESCE_BUDGET_MS, &value)?);
        }
        if let Some(value) = read_env(ENV_PASS_BUDGET_MS) {
            self.pass_budget = Duration::from_millis(parse_u64(ENV_PASS_BUDGET_MS, &value)?);
        }
        Ok(())
    }
}

fn read_env(name: &'static str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            variable,
            value: value.to_string(),
        }),
    }
}

fn parse_u64(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        variable,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disabled() {
        let config = DetectorConfig::default();
        assert!(!config.enabled);
        assert!(config.pass_budget > config.quiesce_budget);
    }

    #[test]
    fn builder_setters_apply() {
        let config = DetectorConfig::enabled()
            .with_quiesce_budget(Duration::from_millis(1))
            .with_pass_budget(Duration::from_secs(1));
        assert!(config.enabled);
        assert_eq!(config.quiesce_budget, Duration::from_millis(1));
        assert_eq!(config.pass_budget, Duration::from_secs(1));
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool(ENV_ENABLED, "TRUE"), Ok(true));
        assert_eq!(parse_bool(ENV_ENABLED, "0"), Ok(false));
        assert!(parse_bool(ENV_ENABLED, "maybe").is_err());
    }

    #[test]
    fn numeric_parse_errors_carry_variable_name() {
        let error = parse_u64(ENV_PASS_BUDGET_MS, "fast").unwrap_err();
        assert_eq!(error.variable, ENV_PASS_BUDGET_MS);
        assert!(error.to_string().contains("TASKLEAK_PASS_BUDGET_MS"));
    }
}
