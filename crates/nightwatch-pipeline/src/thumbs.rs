//! On-disk thumbnail layout: `data/thumbnails/YYYY-MM-DD/<event-id>.jpg`
//! for events, `data/entity-images/<entity-id>.jpg` for entity reference
//! shots, and URL assembly against the API base for bus payloads.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

pub struct ThumbnailStore {
    root: PathBuf,
    api_base_url: Option<String>,
}

impl ThumbnailStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            api_base_url: None,
        }
    }

    /// Sets the API base used to assemble externally reachable thumbnail
    /// URLs (e.g. `http://host:8000`).
    #[must_use]
    pub fn with_api_base(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into());
        self
    }

    fn date_dir(timestamp: DateTime<Utc>) -> String {
        timestamp.format("%Y-%m-%d").to_string()
    }

    #[must_use]
    pub fn event_path(&self, event_id: Uuid, timestamp: DateTime<Utc>) -> PathBuf {
        self.root
            .join("thumbnails")
            .join(Self::date_dir(timestamp))
            .join(format!("{event_id}.jpg"))
    }

    #[must_use]
    pub fn entity_image_path(&self, entity_id: Uuid) -> PathBuf {
        self.root.join("entity-images").join(format!("{entity_id}.jpg"))
    }

    /// Externally reachable URL for an event's thumbnail, if an API base is
    /// configured.
    #[must_use]
    pub fn event_url(&self, event_id: Uuid, timestamp: DateTime<Utc>) -> Option<String> {
        self.api_base_url.as_ref().map(|base| {
            format!(
                "{}/thumbnails/{}/{event_id}.jpg",
                base.trim_end_matches('/'),
                Self::date_dir(timestamp)
            )
        })
    }

    /// Writes an event thumbnail, creating the dated directory as needed.
    pub async fn save_event(
        &self,
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        jpeg: &[u8],
    ) -> Result<PathBuf> {
        let path = self.event_path(event_id, timestamp);
        write_jpeg(&path, jpeg).await?;
        debug!(path = %path.display(), bytes = jpeg.len(), "thumbnail saved");
        Ok(path)
    }

    pub async fn save_entity_image(&self, entity_id: Uuid, jpeg: &[u8]) -> Result<PathBuf> {
        let path = self.entity_image_path(entity_id);
        write_jpeg(&path, jpeg).await?;
        Ok(path)
    }
}

async fn write_jpeg(path: &Path, jpeg: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(path, jpeg)
        .await
        .map_err(|e| Error::Storage(format!("write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn event_path_is_dated() {
        let store = ThumbnailStore::new("/data");
        let id = Uuid::nil();
        assert_eq!(
            store.event_path(id, ts()),
            PathBuf::from(format!("/data/thumbnails/2026-03-05/{id}.jpg"))
        );
    }

    #[test]
    fn event_url_requires_an_api_base() {
        let id = Uuid::nil();
        let bare = ThumbnailStore::new("/data");
        assert_eq!(bare.event_url(id, ts()), None);

        let with_base = ThumbnailStore::new("/data").with_api_base("http://host:8000/");
        assert_eq!(
            with_base.event_url(id, ts()),
            Some(format!("http://host:8000/thumbnails/2026-03-05/{id}.jpg"))
        );
    }

    #[tokio::test]
    async fn save_event_creates_the_dated_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let id = Uuid::new_v4();
        let path = store.save_event(id, ts(), b"jpeg-bytes").await.unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn save_entity_image_lands_in_entity_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let id = Uuid::new_v4();
        let path = store.save_entity_image(id, b"jpeg").await.unwrap();
        assert!(path.ends_with(format!("entity-images/{id}.jpg")));
        assert!(path.exists());
    }
}
