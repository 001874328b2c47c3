//! Settings for aggregation and refresh timing
//!
//! Settings are read from a YAML file and can be overridden per field by
//! environment variables.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`AWAITKIT_*`)
//! 2. Settings file (`--config awaitkit.yaml`)
//! 3. Defaults
//!
//! ```yaml
//! aggregate:
//!   poll_interval_ms: 10
//!   retry_delay_ms: 100
//! refresh:
//!   ttl_ms: 60000
//!   backoff_base_ms: 1000
//!   backoff_max_exponent: 6
//!   populate_on_start: true
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AwaitError, Result};

/// Default bounded wait on a single future per scan.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
/// Default pause after a scan that resolved nothing.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
pub const DEFAULT_TTL_MS: u64 = 60_000;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
/// 2^6 seconds caps the backoff at 64s.
pub const DEFAULT_BACKOFF_MAX_EXPONENT: u32 = 6;

/// Top-level settings document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub aggregate: AwaitConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Timing used by the aggregator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AwaitConfig {
    /// Per-future bounded wait during a scan
    pub poll_interval_ms: u64,
    /// Sleep between scans that made no progress
    pub retry_delay_ms: u64,
}

impl Default for AwaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl AwaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Set the per-future poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the delay between unproductive scans
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }
}

/// Staleness and backoff used by refreshing references
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    /// A value older than this is stale
    pub ttl_ms: u64,
    /// First backoff step after a failed background refresh
    pub backoff_base_ms: u64,
    /// Backoff stops doubling after this many consecutive errors
    pub backoff_max_exponent: u32,
    /// Kick off a background refresh as soon as the reference is built
    pub populate_on_start: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_exponent: DEFAULT_BACKOFF_MAX_EXPONENT,
            populate_on_start: true,
        }
    }
}

impl RefreshConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Set the time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Set the backoff base step
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self
    }

    /// Set the backoff exponent cap
    pub fn with_backoff_max_exponent(mut self, exponent: u32) -> Self {
        self.backoff_max_exponent = exponent;
        self
    }

    /// Enable or disable the populate-on-construction refresh
    pub fn with_populate_on_start(mut self, populate: bool) -> Self {
        self.populate_on_start = populate;
        self
    }
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AwaitError::Config {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over file values.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn with_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "AWAITKIT_POLL_INTERVAL_MS")? {
            self.aggregate.poll_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AWAITKIT_RETRY_DELAY_MS")? {
            self.aggregate.retry_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AWAITKIT_TTL_MS")? {
            self.refresh.ttl_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AWAITKIT_BACKOFF_BASE_MS")? {
            self.refresh.backoff_base_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AWAITKIT_BACKOFF_MAX_EXPONENT")? {
            self.refresh.backoff_max_exponent = v;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.aggregate.poll_interval_ms == 0 {
            return Err(AwaitError::Config {
                reason: "aggregate.poll_interval_ms must be greater than 0".into(),
            });
        }
        // shift width for the backoff multiplier
        if self.refresh.backoff_max_exponent > 31 {
            return Err(AwaitError::Config {
                reason: format!(
                    "refresh.backoff_max_exponent must be at most 31, got {}",
                    self.refresh.backoff_max_exponent
                ),
            });
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AwaitError::Config {
                reason: format!("{}='{}': {}", key, raw, e),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.aggregate.poll_interval(), Duration::from_millis(10));
        assert_eq!(settings.aggregate.retry_delay(), Duration::from_millis(100));
        assert_eq!(settings.refresh.ttl(), Duration::from_secs(60));
        assert_eq!(settings.refresh.backoff_base(), Duration::from_secs(1));
        assert_eq!(settings.refresh.backoff_max_exponent, 6);
        assert!(settings.refresh.populate_on_start);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml("refresh:\n  ttl_ms: 500\n").unwrap();
        assert_eq!(settings.refresh.ttl_ms, 500);
        assert_eq!(settings.refresh.backoff_base_ms, DEFAULT_BACKOFF_BASE_MS);
        assert_eq!(settings.aggregate, AwaitConfig::default());
    }

    #[test]
    fn test_yaml_roundtrip_of_custom_values() {
        let settings = Settings {
            aggregate: AwaitConfig::default().with_retry_delay(Duration::from_millis(20)),
            refresh: RefreshConfig::default().with_populate_on_start(false),
        };
        let yaml = settings.to_yaml().unwrap();
        assert!(yaml.contains("retry_delay_ms: 20"));
        assert_eq!(Settings::from_yaml(&yaml).unwrap(), settings);
    }

    #[test]
    fn test_env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("AWAITKIT_POLL_INTERVAL_MS", "5"),
            ("AWAITKIT_BACKOFF_MAX_EXPONENT", "3"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::default()
            .with_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.aggregate.poll_interval_ms, 5);
        assert_eq!(settings.refresh.backoff_max_exponent, 3);
        assert_eq!(settings.aggregate.retry_delay_ms, DEFAULT_RETRY_DELAY_MS);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let err = Settings::default()
            .with_vars(|k| (k == "AWAITKIT_TTL_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert_eq!(err.code(), "AWAIT-030");
        assert!(err.to_string().contains("AWAITKIT_TTL_MS"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = Settings::from_yaml("aggregate:\n  poll_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, AwaitError::Config { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
