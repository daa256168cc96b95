//! Error types for pipeline orchestration, persistence and the external
//! collaborators the pipeline calls out to.

use thiserror::Error;
use uuid::Uuid;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("camera {0} not found")]
    CameraNotFound(Uuid),

    #[error("event {0} not found")]
    EventNotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("worker count {value} out of range [{min}, {max}]")]
    WorkerCountOutOfRange { value: u32, min: u32, max: u32 },

    #[error("snapshot fetch failed for camera {camera_id}: {message}")]
    SnapshotFailed { camera_id: Uuid, message: String },

    #[error("clip download failed for camera {camera_id}: {message}")]
    ClipFailed { camera_id: Uuid, message: String },

    #[error("audio transcription failed: {0}")]
    AudioFailed(String),

    #[error("embedding computation failed: {0}")]
    EmbeddingFailed(String),

    #[error("message bus publish failed: {0}")]
    BusFailed(String),

    #[error("notification dispatch failed: {0}")]
    NotifyFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_not_found_display() {
        let id = Uuid::nil();
        assert_eq!(Error::CameraNotFound(id).to_string(), format!("camera {id} not found"));
    }

    #[test]
    fn snapshot_failure_names_the_camera() {
        let id = Uuid::nil();
        let err = Error::SnapshotFailed { camera_id: id, message: "timeout".to_string() };
        assert!(err.to_string().contains(&id.to_string()));
    }
}
