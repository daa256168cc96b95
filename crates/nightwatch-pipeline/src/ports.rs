//! Contracts for the evidence-side collaborators the worker calls out to:
//! snapshot capture, clip download, audio transcription and embedding
//! computation. Each is a narrow async trait with a deterministic stub
//! implementation used in tests and in wiring where the real integration
//! isn't configured.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nightwatch_core::model::Camera;

use crate::error::Result;

/// Captures one JPEG still from a camera. Always consulted per event — the
/// snapshot doubles as the stored thumbnail and the single-frame input.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, camera: &Camera) -> Result<Vec<u8>>;
}

/// Downloads the clip covering `[start, end]` for a protect-style camera
/// to a local working file. Only called for protect sources.
#[async_trait]
pub trait ClipDownloader: Send + Sync {
    async fn download(
        &self,
        camera: &Camera,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PathBuf>;
}

/// Transcribes the audio track of a clip via a speech-to-text endpoint.
#[async_trait]
pub trait AudioTranscriber: Send + Sync {
    async fn transcribe(&self, clip_path: &Path) -> Result<String>;
}

/// Computes a fixed-dimension embedding for a JPEG frame, used for entity
/// matching.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, jpeg: &[u8]) -> Result<Vec<f32>>;
}

pub mod stub {
    use parking_lot::Mutex;
    use sha2::{Digest, Sha256};

    use super::{
        async_trait, AudioTranscriber, Camera, ClipDownloader, DateTime, Embedder, Path, PathBuf,
        Result, SnapshotFetcher, Utc,
    };
    use crate::error::Error;

    /// Returns the same JPEG bytes for every camera, or a configured error.
    pub struct StaticSnapshotFetcher {
        jpeg: Option<Vec<u8>>,
    }

    impl StaticSnapshotFetcher {
        #[must_use]
        pub fn returning(jpeg: Vec<u8>) -> Self {
            Self { jpeg: Some(jpeg) }
        }

        /// A fetcher whose every call fails, for exercising the
        /// no-snapshot degraded path.
        #[must_use]
        pub fn failing() -> Self {
            Self { jpeg: None }
        }
    }

    #[async_trait]
    impl SnapshotFetcher for StaticSnapshotFetcher {
        async fn fetch(&self, camera: &Camera) -> Result<Vec<u8>> {
            match &self.jpeg {
                Some(jpeg) => Ok(jpeg.clone()),
                None => Err(Error::SnapshotFailed {
                    camera_id: camera.id,
                    message: "stub configured to fail".to_string(),
                }),
            }
        }
    }

    /// Hands back a pre-arranged clip path, or fails when none is set.
    #[derive(Default)]
    pub struct StaticClipDownloader {
        clip: Mutex<Option<PathBuf>>,
    }

    impl StaticClipDownloader {
        #[must_use]
        pub fn returning(path: PathBuf) -> Self {
            Self { clip: Mutex::new(Some(path)) }
        }

        #[must_use]
        pub fn unavailable() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ClipDownloader for StaticClipDownloader {
        async fn download(
            &self,
            camera: &Camera,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<PathBuf> {
            self.clip.lock().clone().ok_or_else(|| Error::ClipFailed {
                camera_id: camera.id,
                message: "no clip available".to_string(),
            })
        }
    }

    /// Always fails: the configuration has no speech-to-text endpoint.
    pub struct NoAudioTranscriber;

    #[async_trait]
    impl AudioTranscriber for NoAudioTranscriber {
        async fn transcribe(&self, _clip_path: &Path) -> Result<String> {
            Err(Error::AudioFailed("no transcription endpoint configured".to_string()))
        }
    }

    /// Returns a fixed transcript, for doorbell-path tests.
    pub struct StaticAudioTranscriber(pub String);

    #[async_trait]
    impl AudioTranscriber for StaticAudioTranscriber {
        async fn transcribe(&self, _clip_path: &Path) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    /// Deterministic content-hash embedder: identical frames embed
    /// identically, different frames land far apart. Stands in where no
    /// real embedding model is wired up, and keeps entity matching
    /// exercisable end to end.
    pub struct HashEmbedder {
        dim: usize,
    }

    impl HashEmbedder {
        #[must_use]
        pub fn new(dim: usize) -> Self {
            Self { dim }
        }
    }

    impl Default for HashEmbedder {
        fn default() -> Self {
            Self::new(512)
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, jpeg: &[u8]) -> Result<Vec<f32>> {
            let mut out = Vec::with_capacity(self.dim);
            let mut counter: u64 = 0;
            while out.len() < self.dim {
                let mut hasher = Sha256::new();
                hasher.update(jpeg);
                hasher.update(counter.to_le_bytes());
                let digest = hasher.finalize();
                for chunk in digest.chunks_exact(4) {
                    if out.len() >= self.dim {
                        break;
                    }
                    let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    // Map into [-1, 1] so cosine similarity behaves.
                    out.push((f64::from(raw) / f64::from(u32::MAX) * 2.0 - 1.0) as f32);
                }
                counter += 1;
            }
            Ok(out)
        }
    }

    /// A stub embedder that always fails, for fan-out isolation tests.
    pub struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _jpeg: &[u8]) -> Result<Vec<f32>> {
            Err(Error::EmbeddingFailed("stub configured to fail".to_string()))
        }
    }
}
