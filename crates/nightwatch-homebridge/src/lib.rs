//! Smart-home bridge adapter: exposes cameras as typed, auto-resetting
//! sensors and fires a stateless doorbell press for ring events.
//!
//! [`bridge::SensorBridge`] is the state machine; a single long-lived
//! [`bridge::SensorBridge::run`] task drives every sensor's reset timer off
//! one min-heap rather than one task per sensor. [`registry::CameraRegistry`]
//! resolves Protect MAC addresses to camera ids so the same trigger call
//! works from either identifier.

pub mod bridge;
pub mod carrier;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod pairing;
pub mod registry;

pub use bridge::SensorBridge;
pub use carrier::{extract_carrier, CARRIERS};
pub use diagnostics::{BridgeDiagnostics, DiagnosticsSnapshot};
pub use error::{Error, Result};
pub use key::{SensorKey, SensorKind};
pub use pairing::SetupCode;
pub use registry::CameraRegistry;
