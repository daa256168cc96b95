//! Error types for frame extraction and encoding.

use thiserror::Error;

/// Error type for frame extraction operations. The pipeline treats every
/// variant as "no usable evidence", never as fatal — callers fall back to
/// the next evidence-acquisition stage.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// `ffprobe` failed to run or returned an unparseable result.
    #[error("probing clip {path} failed: {message}")]
    Probe { path: String, message: String },

    /// `ffmpeg` failed to run, or exited without producing the expected
    /// frame file.
    #[error("extracting frame at index {index} from {path} failed: {message}")]
    Extract {
        path: String,
        index: u32,
        message: String,
    },

    /// A decoded frame buffer could not be parsed as an image.
    #[error("decoding frame {index} failed: {message}")]
    Decode { index: u32, message: String },

    /// The clip has no frames, or the requested frame count was zero.
    #[error("clip {0} has no extractable frames")]
    Empty(String),
}

/// Result type for frame extraction operations.
pub type Result<T> = std::result::Result<T, Error>;
