//! # Xiaoci
//!
//! Event ingestion and dispatch for OneBot v11 chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  frames  ┌────────────┐  Event  ┌────────────┐  ctx  ┌─────────┐
//! │ Supervisor │─────────▶│ normalize  │────────▶│ Dispatcher │──────▶│ Handler │
//! │ (ws link)  │          └────────────┘         │ dedup+route│       └────┬────┘
//! └────────────┘                                 └────────────┘            │ reply
//!                                                                          ▼
//!                                                               OneBotSender (HTTP API)
//! ```
//!
//! - **Supervisor**: keeps the inbound link alive, fixed reconnect delay
//! - **Dispatcher**: drops duplicates, resolves command > regex > global,
//!   isolates handler failures
//! - **Registry**: routes can be added while running
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use xiaoci::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = XiaociRuntime::builder().build()?;
//!
//!     runtime.on_event("测试").bind(|ctx: HandlerContext| async move {
//!         ctx.reply("成功").await?;
//!         Ok(())
//!     });
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*, `yaml-config`: config file formats
//! - `ws-client` *(default)*: WebSocket inbound link
//! - `http-client` *(default)*: HTTP outbound API
//! - `json-log`: JSON log lines

pub use xiaoci_adapter_onebot as onebot;
pub use xiaoci_core as core;
pub use xiaoci_framework as framework;
pub use xiaoci_runtime as runtime;
pub use xiaoci_transport as transport;

/// Commonly used types for building a bot.
///
/// ```rust,ignore
/// use xiaoci::prelude::*;
/// ```
pub mod prelude {
    pub use xiaoci_runtime::{AdminHandle, XiaociConfig, XiaociRuntime};

    // Handlers
    pub use xiaoci_framework::{
        Captures, HandlerContext, HandlerRegistry, HandlerResult, MsgType, truncate_chars,
    };

    // Messages
    pub use xiaoci_core::{Conversation, Event, Message, Segment};
}
