//! Integration layer - capabilities implemented outside the core.

pub mod sender;
pub mod transport;

pub use sender::{BoxedSender, MessageAck, MessageSender};
pub use transport::{BoxFuture, PostJsonFn};
