//! Frame extraction, quality filtering, deduplication, motion scoring and
//! JPEG encoding for evidence clips.
//!
//! [`extraction::extract_frames`] is the main entry point for multi-frame
//! analysis; [`encode_single_frame`] covers the single-frame (no clip)
//! path RTSP/USB cameras use.

pub mod encode;
pub mod error;
pub mod extraction;
pub mod ffmpeg;
pub mod motion;
pub mod quality;
pub mod selection;
pub mod similarity;

pub use error::{Error, Result};
pub use extraction::{extract_frames, extract_frames_at_offset, ExtractedFrame};

use base64::Engine;

/// Base64-encodes JPEG bytes for transport to a vision provider.
#[must_use]
pub fn to_base64(jpeg: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(jpeg)
}

/// Encodes a single already-decoded frame (no clip, no multi-frame
/// sampling) for single-frame analysis — the RTSP/USB camera path.
pub fn encode_single_frame(img: &image::DynamicImage) -> Result<Vec<u8>> {
    encode::encode_frame(img)
}

/// Encodes a frame for persisted thumbnail storage.
pub fn encode_thumbnail(img: &image::DynamicImage) -> Result<Vec<u8>> {
    encode::encode_thumbnail(img)
}
