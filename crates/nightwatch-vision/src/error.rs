//! Error types for AI vision dispatch.

use thiserror::Error;

/// Error type for a single provider call. The dispatcher treats every
/// variant as retryable-then-fallback, never fatal to the pipeline.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The provider has no API key configured and was skipped.
    #[error("provider {0} has no API key configured")]
    NotConfigured(String),

    /// The underlying HTTP request failed (network error, timeout).
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    /// The provider returned a non-success HTTP status.
    #[error("provider {provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider's response body could not be parsed into the expected
    /// envelope shape.
    #[error("provider {provider} returned an unparseable response: {message}")]
    MalformedResponse { provider: String, message: String },

    /// A `describe_video` call reached a provider that can't take clips.
    #[error("provider {0} does not support native video upload")]
    VideoNotSupported(String),

    /// An uploaded clip never left the provider's processing state before
    /// the probe deadline.
    #[error("provider {provider} video upload stuck: {message}")]
    VideoProcessing { provider: String, message: String },

    /// Every provider in the dispatch chain failed.
    #[error("all providers exhausted: {0}")]
    AllProvidersFailed(String),
}

/// Result type for AI vision dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;
