//! Outbound messaging capability.
//!
//! Handlers never talk to the backend directly; they receive a
//! [`MessageSender`] and call it. The core treats every call as a black
//! box and never retries a failed send.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::foundation::{Conversation, Message, Segment};

/// Acknowledgement for a delivered message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAck {
    /// Backend message id, when reported.
    #[serde(default)]
    pub message_id: Option<i64>,
    /// Forward id for composite cards, when reported.
    #[serde(default)]
    pub forward_id: Option<String>,
}

/// Sends messages back to the messaging backend.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends a message to a group or private conversation.
    async fn send_message(&self, target: Conversation, message: Message) -> ApiResult<MessageAck>;

    /// Sends a composite forward card built from `node` segments.
    ///
    /// The default implementation reports the call as unsupported.
    async fn send_forward_card(
        &self,
        _target: Conversation,
        _nodes: Vec<Segment>,
    ) -> ApiResult<MessageAck> {
        Err(ApiError::NotSupported("send_forward_card"))
    }
}

/// A shared, type-erased sender.
pub type BoxedSender = Arc<dyn MessageSender>;
