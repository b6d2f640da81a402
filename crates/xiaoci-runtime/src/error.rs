//! Runtime error types.

use thiserror::Error;
use xiaoci_core::TransportError;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can stop the runtime from starting.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport client could not be built.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Neither an override nor a compiled-in client is available.
    #[error("No {0} available: enable the feature or supply one explicitly")]
    MissingCapability(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
