//! SQLite-backed [`EventRepository`]/[`AiUsageRepository`].
//!
//! `rusqlite::Connection` is neither `Send` nor `Sync`, so every query runs
//! on one dedicated blocking worker thread and the async side talks to it
//! over an mpsc channel of one-shot request/response pairs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use nightwatch_core::model::{Entity, EntityAdjustment, EntityEvent, StoredEvent};
use nightwatch_entities::error::{Error as EntityError, Result as EntityResult};
use nightwatch_entities::store::EntityStore;

use crate::error::{Error, Result};
use crate::repo::{AiUsageRecord, AiUsageRepository, EmbeddingRepository, EventRepository};

enum Command {
    InsertEvent {
        event: Box<StoredEvent>,
        resp: oneshot::Sender<Result<Uuid>>,
    },
    GetEvent {
        id: Uuid,
        resp: oneshot::Sender<Result<Option<StoredEvent>>>,
    },
    UpdateDescription {
        id: Uuid,
        description: String,
        resp: oneshot::Sender<Result<()>>,
    },
    CountSince {
        camera_id: Uuid,
        since: DateTime<Utc>,
        resp: oneshot::Sender<Result<u32>>,
    },
    RecordUsage {
        record: Box<AiUsageRecord>,
        resp: oneshot::Sender<Result<()>>,
    },
    StoreEmbedding {
        event_id: Uuid,
        embedding: Vec<f32>,
        resp: oneshot::Sender<Result<()>>,
    },
    LoadAllEntities {
        resp: oneshot::Sender<EntityResult<Vec<Entity>>>,
    },
    GetEntity {
        id: Uuid,
        resp: oneshot::Sender<EntityResult<Option<Entity>>>,
    },
    InsertEntity {
        entity: Box<Entity>,
        resp: oneshot::Sender<EntityResult<()>>,
    },
    DeleteEntity {
        id: Uuid,
        resp: oneshot::Sender<EntityResult<()>>,
    },
    FindBySignature {
        signature: String,
        resp: oneshot::Sender<EntityResult<Option<Uuid>>>,
    },
    TouchEntity {
        id: Uuid,
        seen_at: DateTime<Utc>,
        resp: oneshot::Sender<EntityResult<u32>>,
    },
    AdjustOccurrence {
        id: Uuid,
        delta: i32,
        resp: oneshot::Sender<EntityResult<u32>>,
    },
    LinkEntityEvent {
        link: Box<EntityEvent>,
        resp: oneshot::Sender<EntityResult<()>>,
    },
    GetLinkForEvent {
        event_id: Uuid,
        resp: oneshot::Sender<EntityResult<Option<EntityEvent>>>,
    },
    RemoveLink {
        entity_id: Uuid,
        event_id: Uuid,
        resp: oneshot::Sender<EntityResult<bool>>,
    },
    RetargetLink {
        event_id: Uuid,
        new_entity_id: Uuid,
        score: f32,
        created_at: DateTime<Utc>,
        resp: oneshot::Sender<EntityResult<()>>,
    },
    RetargetAllLinks {
        from_entity: Uuid,
        to_entity: Uuid,
        moved_at: DateTime<Utc>,
        resp: oneshot::Sender<EntityResult<u32>>,
    },
    RecordAdjustment {
        adjustment: Box<EntityAdjustment>,
        resp: oneshot::Sender<EntityResult<()>>,
    },
    EventDescription {
        event_id: Uuid,
        resp: oneshot::Sender<EntityResult<Option<String>>>,
    },
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    camera_id TEXT NOT NULL,
    timestamp_rfc3339 TEXT NOT NULL,
    description TEXT NOT NULL,
    payload_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_camera_timestamp ON events(camera_id, timestamp_rfc3339);

CREATE TABLE IF NOT EXISTS ai_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    camera_id TEXT NOT NULL,
    timestamp_rfc3339 TEXT NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_embeddings (
    event_id TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    vehicle_signature TEXT,
    payload_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_signature ON entities(vehicle_signature);

CREATE TABLE IF NOT EXISTS entity_events (
    entity_id TEXT NOT NULL,
    event_id TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    PRIMARY KEY (entity_id, event_id)
);
CREATE INDEX IF NOT EXISTS idx_entity_events_event ON entity_events(event_id);

CREATE TABLE IF NOT EXISTS entity_adjustments (
    id TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL
);
"#;

fn db_err(err: impl std::fmt::Display) -> Error {
    Error::Storage(err.to_string())
}

fn run_worker(path: String, mut rx: mpsc::Receiver<Command>, ready: oneshot::Sender<Result<()>>) {
    let conn = match rusqlite::Connection::open(&path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(db_err(err)));
            return;
        }
    };
    if let Err(err) = conn.execute_batch(SCHEMA) {
        let _ = ready.send(Err(db_err(err)));
        return;
    }
    let _ = ready.send(Ok(()));

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            Command::InsertEvent { event, resp } => {
                let result = (|| {
                    let payload = serde_json::to_string(&event).map_err(db_err)?;
                    conn.execute(
                        "INSERT OR REPLACE INTO events (id, camera_id, timestamp_rfc3339, description, payload_json) VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![
                            event.id.to_string(),
                            event.camera_id.to_string(),
                            event.timestamp.to_rfc3339(),
                            event.description,
                            payload,
                        ],
                    )
                    .map_err(db_err)?;
                    Ok(event.id)
                })();
                send_or_log(resp, result, "insert event");
            }
            Command::GetEvent { id, resp } => {
                let result = conn
                    .query_row(
                        "SELECT payload_json FROM events WHERE id = ?1",
                        [id.to_string()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional_result()
                    .and_then(|payload| match payload {
                        None => Ok(None),
                        Some(p) => serde_json::from_str(&p).map(Some).map_err(db_err),
                    });
                send_or_log(resp, result, "get event");
            }
            Command::UpdateDescription { id, description, resp } => {
                let result = (|| {
                    let payload: String = conn
                        .query_row(
                            "SELECT payload_json FROM events WHERE id = ?1",
                            [id.to_string()],
                            |row| row.get(0),
                        )
                        .map_err(|e| match e {
                            rusqlite::Error::QueryReturnedNoRows => Error::EventNotFound(id),
                            other => db_err(other),
                        })?;
                    let mut event: StoredEvent = serde_json::from_str(&payload).map_err(db_err)?;
                    event.description.clone_from(&description);
                    let rewritten = serde_json::to_string(&event).map_err(db_err)?;
                    conn.execute(
                        "UPDATE events SET description = ?1, payload_json = ?2 WHERE id = ?3",
                        rusqlite::params![description, rewritten, id.to_string()],
                    )
                    .map_err(db_err)?;
                    Ok(())
                })();
                send_or_log(resp, result, "update description");
            }
            Command::CountSince { camera_id, since, resp } => {
                let result = conn
                    .query_row(
                        "SELECT COUNT(*) FROM events WHERE camera_id = ?1 AND timestamp_rfc3339 >= ?2",
                        rusqlite::params![camera_id.to_string(), since.to_rfc3339()],
                        |row| row.get::<_, i64>(0),
                    )
                    .map(|n| n as u32)
                    .map_err(db_err);
                send_or_log(resp, result, "count since");
            }
            Command::RecordUsage { record, resp } => {
                let result = (|| {
                    let payload = serde_json::to_string(&record).map_err(db_err)?;
                    conn.execute(
                        "INSERT INTO ai_usage (camera_id, timestamp_rfc3339, payload_json) VALUES (?1, ?2, ?3)",
                        rusqlite::params![record.camera_id.to_string(), record.timestamp.to_rfc3339(), payload],
                    )
                    .map_err(db_err)?;
                    Ok(())
                })();
                send_or_log(resp, result, "record ai usage");
            }
            Command::StoreEmbedding { event_id, embedding, resp } => {
                let result = (|| {
                    let payload = serde_json::to_string(&embedding).map_err(db_err)?;
                    conn.execute(
                        "INSERT OR REPLACE INTO event_embeddings (event_id, payload_json) VALUES (?1, ?2)",
                        rusqlite::params![event_id.to_string(), payload],
                    )
                    .map_err(db_err)?;
                    Ok(())
                })();
                send_or_log(resp, result, "store embedding");
            }
            Command::LoadAllEntities { resp } => {
                let result = (|| {
                    let mut stmt = conn
                        .prepare("SELECT payload_json FROM entities")
                        .map_err(entity_err)?;
                    let rows = stmt
                        .query_map([], |row| row.get::<_, String>(0))
                        .map_err(entity_err)?;
                    let mut entities = Vec::new();
                    for payload in rows {
                        let payload = payload.map_err(entity_err)?;
                        entities.push(serde_json::from_str(&payload).map_err(entity_err)?);
                    }
                    Ok(entities)
                })();
                send_or_log_entity(resp, result, "load all entities");
            }
            Command::GetEntity { id, resp } => {
                let result = entity_by_id(&conn, id);
                send_or_log_entity(resp, result, "get entity");
            }
            Command::InsertEntity { entity, resp } => {
                let result = (|| {
                    let signature = entity
                        .vehicle
                        .as_ref()
                        .and_then(|v| v.signature.clone());
                    let payload = serde_json::to_string(&entity).map_err(entity_err)?;
                    conn.execute(
                        "INSERT OR REPLACE INTO entities (id, vehicle_signature, payload_json) VALUES (?1, ?2, ?3)",
                        rusqlite::params![entity.id.to_string(), signature, payload],
                    )
                    .map_err(entity_err)?;
                    Ok(())
                })();
                send_or_log_entity(resp, result, "insert entity");
            }
            Command::DeleteEntity { id, resp } => {
                let result = conn
                    .execute("DELETE FROM entities WHERE id = ?1", [id.to_string()])
                    .map(|_| ())
                    .map_err(entity_err);
                send_or_log_entity(resp, result, "delete entity");
            }
            Command::FindBySignature { signature, resp } => {
                let result = conn
                    .query_row(
                        "SELECT id FROM entities WHERE vehicle_signature = ?1 LIMIT 1",
                        [signature],
                        |row| row.get::<_, String>(0),
                    )
                    .optional_result()
                    .map_err(|e| entity_err(e.to_string()))
                    .and_then(|id| match id {
                        None => Ok(None),
                        Some(raw) => Uuid::parse_str(&raw).map(Some).map_err(entity_err),
                    });
                send_or_log_entity(resp, result, "find by signature");
            }
            Command::TouchEntity { id, seen_at, resp } => {
                let result = rewrite_entity(&conn, id, |entity| {
                    entity.occurrence_count += 1;
                    entity.last_seen = seen_at;
                    entity.occurrence_count
                });
                send_or_log_entity(resp, result, "touch entity");
            }
            Command::AdjustOccurrence { id, delta, resp } => {
                let result = rewrite_entity(&conn, id, |entity| {
                    let next = i64::from(entity.occurrence_count) + i64::from(delta);
                    entity.occurrence_count = next.max(0) as u32;
                    entity.occurrence_count
                });
                send_or_log_entity(resp, result, "adjust occurrence");
            }
            Command::LinkEntityEvent { link, resp } => {
                let result = (|| {
                    let payload = serde_json::to_string(&link).map_err(entity_err)?;
                    conn.execute(
                        "INSERT OR REPLACE INTO entity_events (entity_id, event_id, payload_json) VALUES (?1, ?2, ?3)",
                        rusqlite::params![link.entity_id.to_string(), link.event_id.to_string(), payload],
                    )
                    .map_err(entity_err)?;
                    Ok(())
                })();
                send_or_log_entity(resp, result, "link entity event");
            }
            Command::GetLinkForEvent { event_id, resp } => {
                let result = conn
                    .query_row(
                        "SELECT payload_json FROM entity_events WHERE event_id = ?1 LIMIT 1",
                        [event_id.to_string()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional_result()
                    .map_err(|e| entity_err(e.to_string()))
                    .and_then(|payload| match payload {
                        None => Ok(None),
                        Some(p) => serde_json::from_str(&p).map(Some).map_err(entity_err),
                    });
                send_or_log_entity(resp, result, "get link for event");
            }
            Command::RemoveLink { entity_id, event_id, resp } => {
                let result = conn
                    .execute(
                        "DELETE FROM entity_events WHERE entity_id = ?1 AND event_id = ?2",
                        rusqlite::params![entity_id.to_string(), event_id.to_string()],
                    )
                    .map(|n| n > 0)
                    .map_err(entity_err);
                send_or_log_entity(resp, result, "remove link");
            }
            Command::RetargetLink { event_id, new_entity_id, score, created_at, resp } => {
                let result = (|| {
                    let existing: Option<String> = conn
                        .query_row(
                            "SELECT payload_json FROM entity_events WHERE event_id = ?1 LIMIT 1",
                            [event_id.to_string()],
                            |row| row.get(0),
                        )
                        .optional_result()
                        .map_err(|e| entity_err(e.to_string()))?;
                    let Some(payload) = existing else {
                        return Ok(());
                    };
                    let mut link: EntityEvent = serde_json::from_str(&payload).map_err(entity_err)?;
                    conn.execute(
                        "DELETE FROM entity_events WHERE event_id = ?1",
                        [event_id.to_string()],
                    )
                    .map_err(entity_err)?;
                    link.entity_id = new_entity_id;
                    link.similarity_score = score;
                    link.created_at = created_at;
                    let rewritten = serde_json::to_string(&link).map_err(entity_err)?;
                    conn.execute(
                        "INSERT OR REPLACE INTO entity_events (entity_id, event_id, payload_json) VALUES (?1, ?2, ?3)",
                        rusqlite::params![link.entity_id.to_string(), link.event_id.to_string(), rewritten],
                    )
                    .map_err(entity_err)?;
                    Ok(())
                })();
                send_or_log_entity(resp, result, "retarget link");
            }
            Command::RetargetAllLinks { from_entity, to_entity, moved_at, resp } => {
                let result = (|| {
                    let mut stmt = conn
                        .prepare("SELECT payload_json FROM entity_events WHERE entity_id = ?1")
                        .map_err(entity_err)?;
                    let rows = stmt
                        .query_map([from_entity.to_string()], |row| row.get::<_, String>(0))
                        .map_err(entity_err)?;
                    let mut links: Vec<EntityEvent> = Vec::new();
                    for payload in rows {
                        let payload = payload.map_err(entity_err)?;
                        links.push(serde_json::from_str(&payload).map_err(entity_err)?);
                    }
                    drop(stmt);

                    conn.execute(
                        "DELETE FROM entity_events WHERE entity_id = ?1",
                        [from_entity.to_string()],
                    )
                    .map_err(entity_err)?;

                    let mut moved = 0u32;
                    for mut link in links {
                        link.entity_id = to_entity;
                        link.created_at = moved_at;
                        let rewritten = serde_json::to_string(&link).map_err(entity_err)?;
                        conn.execute(
                            "INSERT OR REPLACE INTO entity_events (entity_id, event_id, payload_json) VALUES (?1, ?2, ?3)",
                            rusqlite::params![link.entity_id.to_string(), link.event_id.to_string(), rewritten],
                        )
                        .map_err(entity_err)?;
                        moved += 1;
                    }
                    Ok(moved)
                })();
                send_or_log_entity(resp, result, "retarget all links");
            }
            Command::RecordAdjustment { adjustment, resp } => {
                let result = (|| {
                    let payload = serde_json::to_string(&adjustment).map_err(entity_err)?;
                    conn.execute(
                        "INSERT INTO entity_adjustments (id, payload_json) VALUES (?1, ?2)",
                        rusqlite::params![adjustment.id.to_string(), payload],
                    )
                    .map_err(entity_err)?;
                    Ok(())
                })();
                send_or_log_entity(resp, result, "record adjustment");
            }
            Command::EventDescription { event_id, resp } => {
                let result = conn
                    .query_row(
                        "SELECT description FROM events WHERE id = ?1",
                        [event_id.to_string()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional_result()
                    .map_err(|e| entity_err(e.to_string()));
                send_or_log_entity(resp, result, "event description");
            }
        }
    }
}

fn entity_err(err: impl std::fmt::Display) -> EntityError {
    EntityError::Store(err.to_string())
}

fn entity_by_id(conn: &rusqlite::Connection, id: Uuid) -> EntityResult<Option<Entity>> {
    conn.query_row(
        "SELECT payload_json FROM entities WHERE id = ?1",
        [id.to_string()],
        |row| row.get::<_, String>(0),
    )
    .optional_result()
    .map_err(|e| entity_err(e.to_string()))
    .and_then(|payload| match payload {
        None => Ok(None),
        Some(p) => serde_json::from_str(&p).map(Some).map_err(entity_err),
    })
}

/// Read-modify-write on one entity row; returns `apply`'s value. The whole
/// cycle runs on the single worker thread, so it is serialized with every
/// other store mutation.
fn rewrite_entity(
    conn: &rusqlite::Connection,
    id: Uuid,
    apply: impl FnOnce(&mut Entity) -> u32,
) -> EntityResult<u32> {
    let mut entity = entity_by_id(conn, id)?.ok_or(EntityError::NotFound(id))?;
    let value = apply(&mut entity);
    let signature = entity.vehicle.as_ref().and_then(|v| v.signature.clone());
    let payload = serde_json::to_string(&entity).map_err(entity_err)?;
    conn.execute(
        "INSERT OR REPLACE INTO entities (id, vehicle_signature, payload_json) VALUES (?1, ?2, ?3)",
        rusqlite::params![entity.id.to_string(), signature, payload],
    )
    .map_err(entity_err)?;
    Ok(value)
}

fn send_or_log_entity<T>(resp: oneshot::Sender<EntityResult<T>>, result: EntityResult<T>, op: &str) {
    if resp.send(result).is_err() {
        warn!(op, "sqlite worker response dropped: receiver gone");
    }
}

fn send_or_log<T>(resp: oneshot::Sender<Result<T>>, result: Result<T>, op: &str) {
    if resp.send(result).is_err() {
        warn!(op, "sqlite worker response dropped: receiver gone");
    }
}

trait OptionalRow<T> {
    fn optional_result(self) -> Result<Option<T>>;
}

impl<T> OptionalRow<T> for std::result::Result<T, rusqlite::Error> {
    fn optional_result(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }
}

/// Handle to the SQLite-backed event and usage-log store. Cheap to clone;
/// every clone shares the same worker thread and connection.
#[derive(Clone)]
pub struct SqliteStore {
    tx: mpsc::Sender<Command>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and starts its worker
    /// thread. `path` may be `":memory:"` for ephemeral/test use.
    pub async fn open(path: impl Into<String>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel();
        let path = path.into();
        std::thread::spawn(move || run_worker(path, rx, ready_tx));
        ready_rx.await.map_err(|_| Error::Storage("sqlite worker died before ready".to_string()))??;
        Ok(Self { tx })
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| Error::Storage("sqlite worker is no longer running".to_string()))?;
        resp_rx.await.map_err(|_| Error::Storage("sqlite worker dropped the response channel".to_string()))?
    }

    async fn call_entity<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<EntityResult<T>>) -> Command,
    ) -> EntityResult<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| EntityError::Store("sqlite worker is no longer running".to_string()))?;
        resp_rx
            .await
            .map_err(|_| EntityError::Store("sqlite worker dropped the response channel".to_string()))?
    }
}

#[async_trait]
impl EventRepository for SqliteStore {
    async fn insert(&self, event: StoredEvent) -> Result<Uuid> {
        self.call(|resp| Command::InsertEvent { event: Box::new(event), resp }).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredEvent>> {
        self.call(|resp| Command::GetEvent { id, resp }).await
    }

    async fn update_description(&self, id: Uuid, description: String) -> Result<()> {
        self.call(|resp| Command::UpdateDescription { id, description, resp }).await
    }

    async fn count_since(&self, camera_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
        self.call(|resp| Command::CountSince { camera_id, since, resp }).await
    }
}

#[async_trait]
impl AiUsageRepository for SqliteStore {
    async fn record(&self, record: AiUsageRecord) -> Result<()> {
        self.call(|resp| Command::RecordUsage { record: Box::new(record), resp }).await
    }
}

#[async_trait]
impl EmbeddingRepository for SqliteStore {
    async fn store(&self, event_id: Uuid, embedding: Vec<f32>) -> Result<()> {
        self.call(|resp| Command::StoreEmbedding { event_id, embedding, resp }).await
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn load_all(&self) -> EntityResult<Vec<Entity>> {
        self.call_entity(|resp| Command::LoadAllEntities { resp }).await
    }

    async fn get(&self, id: Uuid) -> EntityResult<Option<Entity>> {
        self.call_entity(|resp| Command::GetEntity { id, resp }).await
    }

    async fn insert(&self, entity: Entity) -> EntityResult<()> {
        self.call_entity(|resp| Command::InsertEntity { entity: Box::new(entity), resp }).await
    }

    async fn delete(&self, id: Uuid) -> EntityResult<()> {
        self.call_entity(|resp| Command::DeleteEntity { id, resp }).await
    }

    async fn find_by_vehicle_signature(&self, signature: &str) -> EntityResult<Option<Uuid>> {
        let signature = signature.to_string();
        self.call_entity(|resp| Command::FindBySignature { signature, resp }).await
    }

    async fn touch(&self, id: Uuid, seen_at: DateTime<Utc>) -> EntityResult<u32> {
        self.call_entity(|resp| Command::TouchEntity { id, seen_at, resp }).await
    }

    async fn adjust_occurrence(&self, id: Uuid, delta: i32) -> EntityResult<u32> {
        self.call_entity(|resp| Command::AdjustOccurrence { id, delta, resp }).await
    }

    async fn link(&self, link: EntityEvent) -> EntityResult<()> {
        self.call_entity(|resp| Command::LinkEntityEvent { link: Box::new(link), resp }).await
    }

    async fn get_link_for_event(&self, event_id: Uuid) -> EntityResult<Option<EntityEvent>> {
        self.call_entity(|resp| Command::GetLinkForEvent { event_id, resp }).await
    }

    async fn remove_link(&self, entity_id: Uuid, event_id: Uuid) -> EntityResult<bool> {
        self.call_entity(|resp| Command::RemoveLink { entity_id, event_id, resp }).await
    }

    async fn retarget_link(
        &self,
        event_id: Uuid,
        new_entity_id: Uuid,
        score: f32,
        created_at: DateTime<Utc>,
    ) -> EntityResult<()> {
        self.call_entity(|resp| Command::RetargetLink { event_id, new_entity_id, score, created_at, resp })
            .await
    }

    async fn retarget_all_links(
        &self,
        from_entity: Uuid,
        to_entity: Uuid,
        moved_at: DateTime<Utc>,
    ) -> EntityResult<u32> {
        self.call_entity(|resp| Command::RetargetAllLinks { from_entity, to_entity, moved_at, resp })
            .await
    }

    async fn record_adjustment(&self, adjustment: EntityAdjustment) -> EntityResult<()> {
        self.call_entity(|resp| Command::RecordAdjustment { adjustment: Box::new(adjustment), resp })
            .await
    }

    async fn event_description(&self, event_id: Uuid) -> EntityResult<Option<String>> {
        self.call_entity(|resp| Command::EventDescription { event_id, resp }).await
    }
}
