//! The context handed to every handler invocation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use xiaoci_core::{
    ApiResult, BoxedSender, Conversation, Event, Message, MessageAck, Segment,
};

use crate::registry::Route;

/// Coarse classification of an event's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    /// A card (JSON segment) was present.
    Card,
    /// Non-empty text, no card.
    Text,
    /// Neither.
    Other,
}

impl MsgType {
    /// Classifies an event. A card wins over text.
    pub fn of(event: &Event) -> Self {
        if event.card.is_some() {
            MsgType::Card
        } else if !event.text.is_empty() {
            MsgType::Text
        } else {
            MsgType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MsgType::Card => "card",
            MsgType::Text => "text",
            MsgType::Other => "other",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regex captures, owned so they can outlive the matched text.
///
/// Index 0 is the full match; unmatched optional groups are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl Captures {
    pub(crate) fn from_regex(regex: &regex::Regex, caps: &regex::Captures<'_>) -> Self {
        let groups = caps
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Self { groups, named }
    }

    /// Returns group `i`, where 0 is the whole match.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.groups.get(i).and_then(|g| g.as_deref())
    }

    /// Returns a named group.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Number of groups including the full match.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Everything a handler gets for one event.
#[derive(Clone)]
pub struct HandlerContext {
    /// Content classification.
    pub msg_type: MsgType,
    /// The derived text, possibly empty.
    pub text: String,
    /// Regex captures when routed through the regex tier.
    pub captures: Option<Captures>,
    /// The parsed card payload, when present.
    pub card: Option<Value>,
    /// The normalized event.
    pub event: Arc<Event>,
    /// Outbound capability.
    pub sender: BoxedSender,
    /// The route that selected this handler.
    pub route: Route,
}

impl HandlerContext {
    /// Returns capture group `i` (0 is the full match).
    pub fn group(&self, i: usize) -> Option<&str> {
        self.captures.as_ref().and_then(|c| c.get(i))
    }

    /// The conversation this event came from.
    pub fn conversation(&self) -> Conversation {
        self.event.conversation()
    }

    /// Sends a message back to the originating conversation.
    pub async fn reply(&self, message: impl Into<Message>) -> ApiResult<MessageAck> {
        self.sender
            .send_message(self.conversation(), message.into())
            .await
    }

    /// Sends a forward card back to the originating conversation.
    pub async fn reply_forward(&self, nodes: Vec<Segment>) -> ApiResult<MessageAck> {
        self.sender
            .send_forward_card(self.conversation(), nodes)
            .await
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("msg_type", &self.msg_type)
            .field("text", &self.text)
            .field("captures", &self.captures)
            .field("card", &self.card)
            .field("conversation", &self.conversation())
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}
