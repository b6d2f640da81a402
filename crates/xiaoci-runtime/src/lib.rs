//! Xiaoci Runtime - process orchestration for the Xiaoci gateway.
//!
//! This crate provides:
//! - Layered configuration ([`config`])
//! - Logging setup ([`logging`])
//! - The runtime that wires registry, dedup cache, dispatcher and
//!   connection supervisor together ([`XiaociRuntime`])
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = XiaociRuntime::builder().build()?;
//!     runtime.on_event("测试").bind(|ctx: HandlerContext| async move {
//!         ctx.reply("成功").await?;
//!         Ok(())
//!     });
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` / `yaml-config`: config file formats
//! - `json-log`: JSON log lines
//! - `ws-client`: the default inbound connector
//! - `http-client`: the default outbound sender

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, Profile, XiaociConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{AdminHandle, RuntimeBuilder, XiaociRuntime};

// Re-export tracing for handler crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and types.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
