//! # Xiaoci Transport
//!
//! The inbound connection supervisor and the network clients behind it.
//!
//! ## Features
//!
//! - `ws-client`: forward WebSocket connector ([`WsConnector`])
//! - `http-client`: JSON poster for outbound API calls ([`http_post_json`])
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  gateway (OneBot)   │
//! ├─────────────────────┤
//! │  Connector          │  ws-client, or any custom link
//! ├─────────────────────┤
//! │  Supervisor         │  reconnect loop, frame filtering
//! ├─────────────────────┤
//! │  Dispatcher         │  xiaoci-framework
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let connector = Arc::new(WsConnector::new("ws://127.0.0.1:3001"));
//! let supervisor = Supervisor::new(connector, dispatcher);
//! supervisor.run().await;
//! ```

pub mod supervisor;

#[cfg(feature = "http-client")]
pub mod http_client;

#[cfg(feature = "ws-client")]
pub mod websocket;

pub use supervisor::{
    ConnectionState, Connector, DEFAULT_RECONNECT_DELAY, FrameDisposition, FrameSource, Supervisor,
};

#[cfg(feature = "http-client")]
pub use http_client::{HttpClientConfig, http_post_json};

#[cfg(feature = "ws-client")]
pub use websocket::{WsConnector, WsFrameSource};
