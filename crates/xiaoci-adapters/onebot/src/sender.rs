//! [`MessageSender`] backed by the OneBot v11 HTTP API.
//!
//! | Call | Action | Target field |
//! |------|--------|--------------|
//! | `send_message` | `send_msg` | `group_id` or `user_id` |
//! | `send_forward_card` (group) | `send_group_forward_msg` | `group_id` |
//! | `send_forward_card` (private) | `send_private_forward_msg` | `user_id` |

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use xiaoci_core::{ApiResult, Conversation, Message, MessageAck, MessageSender, Origin, Segment};

use crate::api_caller::ApiCaller;

/// Presentation of composite forward cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardStyle {
    /// Nickname shown on generated nodes.
    pub nickname: String,
    /// Account shown on generated nodes.
    pub user_id: i64,
    /// Preview lines on the collapsed card.
    pub news: Vec<String>,
    /// Notification text.
    pub prompt: String,
    pub summary: String,
    /// Footer text.
    pub source: String,
}

impl Default for ForwardStyle {
    fn default() -> Self {
        Self {
            nickname: "小辞".to_string(),
            user_id: 3204461757,
            news: vec!["要不...进来看看？".to_string()],
            prompt: "你好，欢迎光临".to_string(),
            summary: String::new(),
            source: "点我查看内容".to_string(),
        }
    }
}

/// Sends messages through a OneBot [`ApiCaller`].
pub struct OneBotSender {
    caller: Arc<dyn ApiCaller>,
    forward: ForwardStyle,
}

impl OneBotSender {
    pub fn new(caller: Arc<dyn ApiCaller>) -> Self {
        Self {
            caller,
            forward: ForwardStyle::default(),
        }
    }

    pub fn with_forward_style(mut self, style: ForwardStyle) -> Self {
        self.forward = style;
        self
    }

    pub fn forward_style(&self) -> &ForwardStyle {
        &self.forward
    }

    /// A forward node authored by the configured bot identity.
    pub fn text_node(&self, text: impl Into<String>) -> Segment {
        Segment::node(
            self.forward.user_id,
            self.forward.nickname.clone(),
            vec![Segment::text(text)],
        )
    }

    /// Wraps `text` in a single-node forward card and sends it.
    pub async fn send_forward_text(
        &self,
        target: Conversation,
        text: impl Into<String>,
    ) -> ApiResult<MessageAck> {
        self.send_forward_card(target, vec![self.text_node(text)])
            .await
    }

    fn target_params(target: Conversation) -> Map<String, Value> {
        let mut params = Map::new();
        match target.origin {
            Origin::Group => params.insert("group_id".into(), json!(target.id)),
            Origin::Private => params.insert("user_id".into(), json!(target.id)),
        };
        params
    }
}

#[async_trait]
impl MessageSender for OneBotSender {
    async fn send_message(&self, target: Conversation, message: Message) -> ApiResult<MessageAck> {
        let mut params = Self::target_params(target);
        params.insert("message_type".into(), json!(target.origin.as_str()));
        params.insert("message".into(), serde_json::to_value(&message)?);

        debug!(target = %target, segments = message.segments().len(), "send_msg");
        let data = self.caller.call("send_msg", Value::Object(params)).await?;
        Ok(parse_ack(&data))
    }

    async fn send_forward_card(
        &self,
        target: Conversation,
        nodes: Vec<Segment>,
    ) -> ApiResult<MessageAck> {
        if let Some(odd) = nodes.iter().find(|s| !matches!(s, Segment::Node(_))) {
            warn!(segment_type = %odd.segment_type(), "Forward card contains a non-node segment");
        }

        let action = match target.origin {
            Origin::Group => "send_group_forward_msg",
            Origin::Private => "send_private_forward_msg",
        };
        let mut params = Self::target_params(target);
        params.insert("message".into(), serde_json::to_value(&nodes)?);
        params.insert(
            "news".into(),
            Value::Array(
                self.forward
                    .news
                    .iter()
                    .map(|text| json!({ "text": text }))
                    .collect(),
            ),
        );
        params.insert("prompt".into(), json!(self.forward.prompt));
        params.insert("summary".into(), json!(self.forward.summary));
        params.insert("source".into(), json!(self.forward.source));

        debug!(target = %target, nodes = nodes.len(), action, "Sending forward card");
        let data = self.caller.call(action, Value::Object(params)).await?;
        Ok(parse_ack(&data))
    }
}

fn parse_ack(data: &Value) -> MessageAck {
    let message_id = match data.get("message_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    let forward_id = ["forward_id", "res_id"]
        .iter()
        .find_map(|k| data.get(*k))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    MessageAck {
        message_id,
        forward_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use xiaoci_core::ApiError;

    #[derive(Default)]
    struct RecordingCaller {
        calls: Mutex<Vec<(String, Value)>>,
        reply: Value,
    }

    #[async_trait]
    impl ApiCaller for RecordingCaller {
        async fn call(&self, action: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().push((action.to_string(), params));
            Ok(self.reply.clone())
        }
    }

    fn sender_with(reply: Value) -> (OneBotSender, Arc<RecordingCaller>) {
        let caller = Arc::new(RecordingCaller {
            calls: Mutex::new(Vec::new()),
            reply,
        });
        (OneBotSender::new(caller.clone()), caller)
    }

    #[tokio::test]
    async fn test_group_send_msg_body() {
        let (sender, caller) = sender_with(json!({"message_id": 77}));
        let ack = sender
            .send_message(Conversation::group(123), "成功".into())
            .await
            .unwrap();
        assert_eq!(ack.message_id, Some(77));

        let calls = caller.calls.lock();
        let (action, body) = &calls[0];
        assert_eq!(action, "send_msg");
        assert_eq!(
            *body,
            json!({
                "message_type": "group",
                "group_id": 123,
                "message": [{"type": "text", "data": {"text": "成功"}}]
            })
        );
    }

    #[tokio::test]
    async fn test_private_send_msg_uses_user_id() {
        let (sender, caller) = sender_with(json!({"message_id": "88"}));
        let ack = sender
            .send_message(Conversation::private(42), "hi".into())
            .await
            .unwrap();
        assert_eq!(ack.message_id, Some(88));

        let calls = caller.calls.lock();
        assert_eq!(calls[0].1["message_type"], "private");
        assert_eq!(calls[0].1["user_id"], 42);
        assert!(calls[0].1.get("group_id").is_none());
    }

    #[tokio::test]
    async fn test_forward_text_body() {
        let (sender, caller) = sender_with(json!({"message_id": 1, "forward_id": "abc"}));
        let ack = sender
            .send_forward_text(Conversation::group(5), "长内容")
            .await
            .unwrap();
        assert_eq!(ack.forward_id.as_deref(), Some("abc"));

        let calls = caller.calls.lock();
        let (action, body) = &calls[0];
        assert_eq!(action, "send_group_forward_msg");
        assert_eq!(body["group_id"], 5);
        assert_eq!(body["message"][0]["type"], "node");
        assert_eq!(body["message"][0]["data"]["nickname"], "小辞");
        assert_eq!(body["message"][0]["data"]["user_id"], "3204461757");
        assert_eq!(body["message"][0]["data"]["content"][0]["data"]["text"], "长内容");
        assert_eq!(body["news"], json!([{"text": "要不...进来看看？"}]));
        assert_eq!(body["prompt"], "你好，欢迎光临");
        assert_eq!(body["summary"], "");
        assert_eq!(body["source"], "点我查看内容");
    }

    #[tokio::test]
    async fn test_private_forward_uses_private_action() {
        let (sender, caller) = sender_with(Value::Null);
        sender
            .send_forward_card(Conversation::private(9), vec![Segment::text("not a node")])
            .await
            .unwrap();
        let calls = caller.calls.lock();
        assert_eq!(calls[0].0, "send_private_forward_msg");
        assert_eq!(calls[0].1["user_id"], 9);
    }

    #[tokio::test]
    async fn test_unsupported_segment_fails_serialization() {
        let (sender, caller) = sender_with(Value::Null);
        let message = Message::from(Segment::Unsupported {
            kind: "markdown".into(),
            data: Value::Null,
        });
        let err = sender
            .send_message(Conversation::group(1), message)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
        assert!(caller.calls.lock().is_empty());
    }

    #[test]
    fn test_forward_style_defaults_and_partial_override() {
        let style: ForwardStyle = serde_json::from_value(json!({"nickname": "bot"})).unwrap();
        assert_eq!(style.nickname, "bot");
        assert_eq!(style.user_id, 3204461757);
        assert_eq!(style.source, "点我查看内容");
    }
}
