//! Error types for the smart-home bridge adapter.

use thiserror::Error;
use uuid::Uuid;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("no camera registered for id or MAC {0}")]
    UnknownCamera(String),

    #[error("camera {0} has no sensor of this kind registered")]
    UnknownSensor(Uuid),

    #[error("setup code {0:?} is not a 6-digit PIN")]
    InvalidSetupCode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
