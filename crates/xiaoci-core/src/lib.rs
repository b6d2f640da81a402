//! # Xiaoci Core
//!
//! The event model of the Xiaoci gateway.
//!
//! ## Foundation Layer
//!
//! - **Segments**: OneBot v11 message content ([`Segment`])
//! - **Events**: the canonical inbound snapshot ([`Event`]) and its
//!   normalizer ([`normalize`])
//! - **Messages**: outbound content and reply targets ([`Message`],
//!   [`Conversation`])
//!
//! ## Integration Layer
//!
//! - **Sender**: the outbound capability handlers use ([`MessageSender`])
//! - **Transport seams**: the HTTP poster adapters call through ([`PostJsonFn`])
//!
//! ```text
//! raw frame ──normalize──▶ Event ──▶ dispatcher ──▶ handler ──▶ MessageSender
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use error::{ApiError, ApiResult, TransportError, TransportResult};
pub use foundation::{Conversation, Event, Message, Origin, Segment, SenderInfo, normalize};
pub use integration::{BoxFuture, BoxedSender, MessageAck, MessageSender, PostJsonFn};
