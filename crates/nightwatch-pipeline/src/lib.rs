//! The event processing pipeline: bounded queue, worker pool, evidence
//! acquisition with AI fallback, persistence and post-event fan-out.
//!
//! Everything hangs off one [`PipelineCore`] built at startup.
//! [`EventHandler`] is the ingestion face (raw source messages in),
//! [`EventProcessor`] the execution face (workers pulling from the queue),
//! and [`fanout`] the downstream face (sensors, bus, notifications,
//! entities, anomaly scoring).

pub mod anomaly;
pub mod bus;
pub mod cooldown;
pub mod core;
pub mod costcap;
pub mod error;
pub mod evidence;
pub mod fanout;
pub mod handler;
pub mod metrics;
pub mod notify;
pub mod parsing;
pub mod ports;
pub mod processor;
pub mod queue;
pub mod repo;
pub mod sqlite;
pub mod thumbs;

pub use self::core::{PipelineCore, PipelineSettings};
pub use error::{Error, Result};
pub use handler::{EventHandler, HandleOutcome};
pub use processor::{EnqueueOutcome, EventProcessor, DEFAULT_QUEUE_CAPACITY};
