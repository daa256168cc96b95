//! Error types for entity matching and the entity graph.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("entity {0} not found")]
    NotFound(uuid::Uuid),

    #[error("event {0} not found")]
    EventNotFound(uuid::Uuid),

    #[error("cannot merge an entity with itself: {0}")]
    SelfMerge(uuid::Uuid),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    WrongDimension { actual: usize, expected: usize },

    #[error("store backend failed: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
