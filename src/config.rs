//! Configuration Module
//!
//! Handles loading and managing cache sizing from environment variables.

use std::env;

use crate::error::{CacheError, Result};

/// Cache sizing parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of independent buckets (shards)
    pub buckets: usize,
    /// Maximum number of entries each bucket can hold
    pub bucket_capacity: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LRU_BUCKETS` - Number of buckets (default: 16)
    /// - `LRU_BUCKET_CAPACITY` - Entries per bucket (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            buckets: env::var("LRU_BUCKETS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.buckets),
            bucket_capacity: env::var("LRU_BUCKET_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bucket_capacity),
        }
    }

    /// Total number of entries across all buckets.
    pub fn total_capacity(&self) -> usize {
        self.buckets.saturating_mul(self.bucket_capacity)
    }

    /// Rejects configurations that cannot route keys.
    ///
    /// A zero `bucket_capacity` is allowed: every insertion becomes a no-op.
    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(CacheError::InvalidConfig(
                "bucket count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buckets: 16,
            bucket_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.buckets, 16);
        assert_eq!(config.bucket_capacity, 1024);
        assert_eq!(config.total_capacity(), 16 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the env so parallel tests can't race on it
        env::remove_var("LRU_BUCKETS");
        env::remove_var("LRU_BUCKET_CAPACITY");
        assert_eq!(Config::from_env(), Config::default());

        env::set_var("LRU_BUCKETS", "4");
        env::set_var("LRU_BUCKET_CAPACITY", "not-a-number");
        let config = Config::from_env();
        assert_eq!(config.buckets, 4);
        assert_eq!(config.bucket_capacity, 1024);

        env::remove_var("LRU_BUCKETS");
        env::remove_var("LRU_BUCKET_CAPACITY");
    }

    #[test]
    fn test_config_zero_buckets_rejected() {
        let config = Config {
            buckets: 0,
            bucket_capacity: 8,
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_zero_capacity_allowed() {
        let config = Config {
            buckets: 2,
            bucket_capacity: 0,
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.total_capacity(), 0);
    }
}
