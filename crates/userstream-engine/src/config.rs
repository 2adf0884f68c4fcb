//! Stream engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Reconnect policy for live streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Reconnect attempts allowed after a transport failure before the
    /// driver gives up. The budget is refilled once a connection delivers
    /// a record.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first reconnect attempt, in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for the reconnect delay, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor applied to the delay on each attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 { 5 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 30_000 }
fn default_multiplier() -> f64 { 2.0 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Top-level streaming configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Capacity of the reader → dispatcher queue. A full queue blocks the
    /// reader before it pulls the next record.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Longest accepted record, in bytes, excluding the line terminator.
    ///
    /// Connectors own framing, so `StreamDriver` does not read this field;
    /// pass it to the connector with `with_max_record_bytes`.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_queue_capacity() -> usize { 1_024 }
fn default_max_record_bytes() -> usize { 1 << 20 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_record_bytes: default_max_record_bytes(),
            retry: RetryConfig::default(),
        }
    }
}

impl StreamConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: StreamConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "queue_capacity must be at least 1".into(),
            });
        }
        if self.max_record_bytes == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_record_bytes must be at least 1".into(),
            });
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                reason: format!("retry.multiplier must be >= 1.0, got {}", self.retry.multiplier),
            });
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid {
                reason: "retry.initial_backoff_ms exceeds retry.max_backoff_ms".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = StreamConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn partial_retry_section() {
        let config = StreamConfig::from_yaml_str(
            "queue_capacity: 8\nretry:\n  max_retries: 2\n  initial_backoff_ms: 10\n",
        )
        .unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_backoff_ms, 10);
        assert_eq!(config.retry.max_backoff_ms, 30_000);
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = StreamConfig::from_yaml_str("queue_capacity: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn shrinking_multiplier_rejected() {
        assert!(StreamConfig::from_yaml_str("retry:\n  multiplier: 0.5").is_err());
    }
}
