//! # OneBot v11 adapter
//!
//! The outbound half of the OneBot protocol: turns [`MessageSender`] calls
//! into `send_msg` and forward-card API actions.
//!
//! ```text
//! handler ──▶ OneBotSender ──▶ ApiCaller ──▶ PostJsonFn ──▶ POST {api_url}/{action}
//! ```
//!
//! Inbound frames need no adapter code: the core normalizer already reads
//! OneBot v11 message events.
//!
//! ```rust,ignore
//! let post = xiaoci_transport::http_post_json(HttpClientConfig::new("http://127.0.0.1:3000"))?;
//! let sender = OneBotSender::new(Arc::new(HttpApiCaller::new(post)));
//! ```
//!
//! [`MessageSender`]: xiaoci_core::MessageSender

pub mod api_caller;
pub mod sender;

pub use api_caller::{ApiCaller, HttpApiCaller, unwrap_response};
pub use sender::{ForwardStyle, OneBotSender};
