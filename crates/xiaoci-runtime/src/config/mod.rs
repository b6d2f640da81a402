//! Configuration for the Xiaoci runtime.
//!
//! Layered loading via figment, a typed schema with defaults for every
//! field, and validation run before anything connects.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ApiConfig, ConnectionConfig, DedupConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, SpanEventConfig, XiaociConfig,
};
pub use validation::validate_config;
