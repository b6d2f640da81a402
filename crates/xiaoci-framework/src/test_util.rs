//! Shared test doubles.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use xiaoci_core::{
    ApiError, ApiResult, Conversation, Event, Message, MessageAck, MessageSender, Segment,
};

use crate::context::{Captures, HandlerContext, MsgType};
use crate::handler::{BoxedHandler, into_handler};
use crate::registry::Route;

/// Records every outbound call. Optionally rejects them all.
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<(Conversation, Message)>>,
    fail: bool,
}

impl RecordingSender {
    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn sent(&self) -> Vec<(Conversation, Message)> {
        self.sent.lock().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.plain_text()).collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, target: Conversation, message: Message) -> ApiResult<MessageAck> {
        if self.fail {
            return Err(ApiError::Rejected {
                retcode: 100,
                message: "rejected".into(),
            });
        }
        self.sent.lock().push((target, message));
        Ok(MessageAck::default())
    }

    async fn send_forward_card(
        &self,
        target: Conversation,
        nodes: Vec<Segment>,
    ) -> ApiResult<MessageAck> {
        self.send_message(target, Message::from(nodes)).await
    }
}

pub(crate) fn noop() -> BoxedHandler {
    into_handler(|_ctx| async { anyhow::Ok(()) })
}

pub(crate) fn ctx_for(text: &str, route: Route, captures: Option<Captures>) -> HandlerContext {
    let event = Event {
        text: text.to_string(),
        ..Default::default()
    };
    HandlerContext {
        msg_type: MsgType::of(&event),
        text: event.text.clone(),
        captures,
        card: None,
        event: Arc::new(event),
        sender: Arc::new(RecordingSender::default()),
        route,
    }
}
