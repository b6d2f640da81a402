//! Foundation layer - the event model.
//!
//! - Segment types for OneBot v11 message content
//! - Outbound message and conversation types
//! - The canonical [`Event`] and its normalizer

pub mod event;
pub mod message;
pub mod segment;

pub use event::{Event, SenderInfo, normalize};
pub use message::{Conversation, Message, Origin};
pub use segment::Segment;
