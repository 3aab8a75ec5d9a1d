//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Lookups never fail: a miss is an ordinary `None`. The only recoverable
//! errors come from building a cache with parameters that cannot work.
//! Corrupted internal state is not represented here; it panics at the
//! point of detection.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Construction parameters that cannot produce a working cache
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = CacheError::InvalidConfig("bucket count must be non-zero".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: bucket count must be non-zero"
        );
    }
}
