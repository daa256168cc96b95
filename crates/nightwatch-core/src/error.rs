//! Error types for nightwatch-core

use thiserror::Error;

/// Error type for core domain operations (config loading, model validation).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A required environment variable or settings row was missing.
    #[error("missing configuration value: {0}")]
    MissingConfig(String),

    /// An environment variable or settings row failed to parse into its
    /// target type.
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidConfig {
        /// The configuration key in question.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A domain invariant was violated while constructing a model value.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Result type for core domain operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_display() {
        let err = Error::MissingConfig("DATABASE_URL".to_string());
        assert_eq!(err.to_string(), "missing configuration value: DATABASE_URL");
    }

    #[test]
    fn invalid_config_display() {
        let err = Error::InvalidConfig {
            key: "EVENT_WORKER_COUNT".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration value for EVENT_WORKER_COUNT: not a number"
        );
    }
}
