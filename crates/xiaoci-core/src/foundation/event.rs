//! Canonical inbound event and the normalizer that builds it.
//!
//! Every frame the gateway forwards is turned into an [`Event`] by
//! [`normalize`]. Normalization never fails: missing fields fall back to
//! zero values and malformed ones are logged and replaced, so a single odd
//! frame cannot stall the ingestion loop.
//!
//! # Field mapping (OneBot v11)
//!
//! ```text
//! self_id      → bot_id
//! user_id      → sender_id   (falls back to sender.user_id)
//! group_id     → group_id / conversation_id for group chats
//! message_id   → native_id   (zero means absent)
//! message      → segments    (array or plain string)
//! raw_message  → raw_message
//! ```

use serde_json::Value;
use tracing::warn;

use super::message::{Conversation, Origin};
use super::segment::Segment;

/// Sender metadata attached to a message frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenderInfo {
    /// Nickname.
    pub nickname: String,
    /// Group card (group nickname), when set.
    pub card: Option<String>,
    /// Group role ("owner", "admin", "member").
    pub role: String,
}

/// A normalized inbound message event.
///
/// Built once per frame and owned by the dispatch call that created it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Group or private.
    pub origin: Origin,
    /// Group id for group chats, sender id for private chats.
    pub conversation_id: i64,
    /// The user who sent the message.
    pub sender_id: i64,
    /// The bot account that received it.
    pub bot_id: i64,
    /// Group id, zero for private chats.
    pub group_id: i64,
    /// Group name, when the backend reports it.
    pub group_name: String,
    /// Ordered message content.
    pub segments: Vec<Segment>,
    /// First non-empty text segment, trimmed. Empty when there is none.
    pub text: String,
    /// First JSON segment that parsed successfully.
    pub card: Option<Value>,
    /// Backend message id; `None` when absent or zero.
    pub native_id: Option<i64>,
    /// Raw text mirror of the message.
    pub raw_message: String,
    /// Unix timestamp of the event.
    pub time: i64,
    /// Sender metadata.
    pub sender: SenderInfo,
}

impl Event {
    /// Returns the reply target for this event.
    pub fn conversation(&self) -> Conversation {
        Conversation {
            origin: self.origin,
            id: self.conversation_id,
        }
    }

    /// Returns true if the bot itself authored this event.
    ///
    /// Missing ids count as zero, so a frame carrying neither is treated
    /// as self-authored.
    pub fn is_self_authored(&self) -> bool {
        self.bot_id == self.sender_id
    }
}

/// Builds an [`Event`] from a raw frame.
pub fn normalize(frame: &Value) -> Event {
    let bot_id = int_field(frame, "self_id");
    let group_id = int_field(frame, "group_id");

    let sender_meta = frame.get("sender").filter(|v| v.is_object());
    let mut sender_id = int_field(frame, "user_id");
    if sender_id == 0
        && let Some(meta) = sender_meta
    {
        sender_id = int_field(meta, "user_id");
    }

    let origin = match str_field(frame, "message_type").as_str() {
        "private" => Origin::Private,
        "group" => Origin::Group,
        _ if group_id != 0 => Origin::Group,
        _ => Origin::Private,
    };
    let conversation_id = match origin {
        Origin::Group => group_id,
        Origin::Private => sender_id,
    };

    let segments = parse_segments(frame.get("message"));
    let text = derive_text(&segments);
    let card = derive_card(&segments);

    let native_id = Some(int_field(frame, "message_id")).filter(|id| *id != 0);

    let sender = sender_meta
        .map(|meta| SenderInfo {
            nickname: str_field(meta, "nickname"),
            card: meta
                .get("card")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(String::from),
            role: str_field(meta, "role"),
        })
        .unwrap_or_default();

    Event {
        origin,
        conversation_id,
        sender_id,
        bot_id,
        group_id,
        group_name: str_field(frame, "group_name"),
        segments,
        text,
        card,
        native_id,
        raw_message: str_field(frame, "raw_message"),
        time: int_field(frame, "time"),
        sender,
    }
}

/// Returns the first non-empty text segment, trimmed.
///
/// Later text segments are deliberately ignored for routing.
fn derive_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter_map(Segment::as_text)
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(String::from)
        .unwrap_or_default()
}

/// Returns the first JSON segment whose payload parses.
fn derive_card(segments: &[Segment]) -> Option<Value> {
    for payload in segments.iter().filter_map(Segment::as_json) {
        if payload.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(card) => return Some(card),
            Err(e) => warn!(error = %e, "Failed to parse card payload, skipping segment"),
        }
    }
    None
}

fn parse_segments(message: Option<&Value>) -> Vec<Segment> {
    match message {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![Segment::text(s.as_str())],
        Some(Value::Array(items)) => items.iter().map(parse_segment).collect(),
        Some(other) => {
            warn!(kind = %json_kind(other), "Unexpected message shape, treating as empty");
            Vec::new()
        }
    }
}

fn parse_segment(value: &Value) -> Segment {
    match serde_json::from_value::<Segment>(value.clone()) {
        Ok(segment) => segment,
        Err(e) => {
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            if is_modelled_kind(&kind) {
                warn!(segment_type = %kind, error = %e, "Malformed segment, keeping it untyped");
            }
            Segment::Unsupported {
                kind,
                data: value.get("data").cloned().unwrap_or(Value::Null),
            }
        }
    }
}

/// Types with a typed model; decode failures for anything else are expected.
fn is_modelled_kind(kind: &str) -> bool {
    matches!(
        kind,
        "text"
            | "face"
            | "image"
            | "record"
            | "video"
            | "file"
            | "at"
            | "reply"
            | "dice"
            | "poke"
            | "json"
            | "xml"
            | "forward"
            | "node"
    )
}

/// Reads an integer id that may be encoded as a number or a numeric string.
fn int_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .unwrap_or_else(|| {
                warn!(field = key, value = %n, "Numeric field out of range, using 0");
                0
            }),
        Some(Value::String(s)) if s.is_empty() => 0,
        Some(Value::String(s)) => s.parse().unwrap_or_else(|_| {
            warn!(field = key, value = %s, "Non-numeric id field, using 0");
            0
        }),
        Some(other) => {
            warn!(field = key, kind = %json_kind(other), "Unexpected id field type, using 0");
            0
        }
    }
}

fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_frame(message: Value) -> Value {
        json!({
            "self_id": 3204461757_i64,
            "user_id": 2163712324_i64,
            "time": 1770000000,
            "message_id": 987654,
            "message_type": "group",
            "sub_type": "normal",
            "group_id": 123456,
            "group_name": "测试群",
            "sender": {"user_id": 2163712324_i64, "nickname": "alice", "card": "", "role": "owner"},
            "raw_message": "测试",
            "message": message,
            "message_format": "array"
        })
    }

    #[test]
    fn test_normalize_group_message() {
        let event = normalize(&group_frame(json!([
            {"type": "text", "data": {"text": "  测试 "}}
        ])));

        assert_eq!(event.origin, Origin::Group);
        assert_eq!(event.conversation_id, 123456);
        assert_eq!(event.sender_id, 2163712324);
        assert_eq!(event.bot_id, 3204461757);
        assert_eq!(event.native_id, Some(987654));
        assert_eq!(event.text, "测试");
        assert!(event.card.is_none());
        assert_eq!(event.sender.nickname, "alice");
        assert_eq!(event.sender.card, None);
        assert_eq!(event.sender.role, "owner");
        assert_eq!(event.group_name, "测试群");
        assert_eq!(event.conversation(), Conversation::group(123456));
    }

    #[test]
    fn test_first_non_empty_text_wins() {
        let event = normalize(&group_frame(json!([
            {"type": "text", "data": {"text": "   "}},
            {"type": "at", "data": {"qq": "10001"}},
            {"type": "text", "data": {"text": "第一"}},
            {"type": "text", "data": {"text": "第二"}}
        ])));
        assert_eq!(event.text, "第一");
        assert_eq!(event.segments.len(), 4);
    }

    #[test]
    fn test_card_falls_through_bad_payload() {
        let event = normalize(&group_frame(json!([
            {"type": "json", "data": {"data": "{not json"}},
            {"type": "json", "data": {"data": r#"{"app":"com.tencent.miniapp","extra":{"appid":1}}"#}}
        ])));
        let card = event.card.expect("second card should parse");
        assert_eq!(card["app"], "com.tencent.miniapp");
    }

    #[test]
    fn test_bad_card_yields_none() {
        let event = normalize(&group_frame(json!([
            {"type": "json", "data": {"data": "{broken"}}
        ])));
        assert!(event.card.is_none());
        assert!(event.text.is_empty());
    }

    #[test]
    fn test_private_message_uses_sender_as_conversation() {
        let event = normalize(&json!({
            "self_id": 1,
            "user_id": "42",
            "message_type": "private",
            "message": "hello"
        }));
        assert_eq!(event.origin, Origin::Private);
        assert_eq!(event.conversation_id, 42);
        assert_eq!(event.text, "hello");
        assert_eq!(event.native_id, None);
    }

    #[test]
    fn test_missing_fields_default() {
        let event = normalize(&json!({}));
        assert_eq!(event.origin, Origin::Private);
        assert_eq!(event.sender_id, 0);
        assert!(event.segments.is_empty());
        assert!(event.text.is_empty());
        assert!(event.is_self_authored());
    }

    #[test]
    fn test_malformed_fields_are_recovered() {
        let event = normalize(&json!({
            "self_id": {"nested": true},
            "user_id": "abc",
            "group_id": 5,
            "message_id": 0,
            "message": {"type": "text"},
        }));
        assert_eq!(event.bot_id, 0);
        assert_eq!(event.sender_id, 0);
        assert_eq!(event.origin, Origin::Group);
        assert_eq!(event.native_id, None);
        assert!(event.segments.is_empty());
    }

    #[test]
    fn test_unknown_segments_are_preserved() {
        let event = normalize(&group_frame(json!([
            {"type": "markdown", "data": {"content": "# hi"}},
            {"type": "text", "data": {}}
        ])));
        assert_eq!(event.segments[0].segment_type(), "markdown");
        assert_eq!(event.segments[1].segment_type(), "text");
        assert!(matches!(event.segments[1], Segment::Unsupported { .. }));
        assert!(event.text.is_empty());
    }

    #[test]
    fn test_sender_id_falls_back_to_sender_meta() {
        let event = normalize(&json!({
            "self_id": 1,
            "sender": {"user_id": 99},
            "message_type": "private",
            "message": []
        }));
        assert_eq!(event.sender_id, 99);
        assert_eq!(event.conversation_id, 99);
    }

    #[test]
    fn test_self_authored() {
        let event = normalize(&json!({"self_id": 7, "user_id": 7}));
        assert!(event.is_self_authored());

        let foreign = normalize(&json!({"self_id": 7, "user_id": 8}));
        assert!(!foreign.is_self_authored());
    }

    #[test]
    fn test_frame_without_ids_is_self_authored() {
        let event = normalize(&json!({
            "message_type": "group",
            "group_id": 5,
            "message": "测试"
        }));
        assert_eq!(event.bot_id, 0);
        assert_eq!(event.sender_id, 0);
        assert!(event.is_self_authored());
    }
}
