//! OneBot v11 message segments.
//!
//! A segment is a single `{type, data}` unit of message content. Inbound
//! frames carry an ordered list of them; outbound messages are built from
//! them as well.
//!
//! ```rust,ignore
//! use xiaoci_core::Segment;
//!
//! let reply = vec![Segment::reply("1024"), Segment::text("收到")];
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A OneBot v11 message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text content.
    Text(TextData),
    /// QQ emoji/face.
    Face(FaceData),
    /// Image.
    Image(FileData),
    /// Voice record.
    Record(FileData),
    /// Video.
    Video(FileData),
    /// File upload.
    File(FileData),
    /// @mention someone.
    At(AtData),
    /// Reply to a message.
    Reply(ReplyData),
    /// Dice magic emoji.
    Dice(DiceData),
    /// Poke.
    Poke(PokeData),
    /// JSON card (ark) message.
    Json(JsonData),
    /// XML card message.
    Xml(XmlData),
    /// Forward message reference (receive only).
    Forward(ForwardData),
    /// Forward node, used to build composite forward cards.
    Node(NodeData),
    /// A segment type this crate has no typed model for.
    ///
    /// Only produced while normalizing inbound frames; it cannot be sent.
    #[serde(skip)]
    Unsupported {
        /// The wire `type` value.
        kind: String,
        /// The untouched `data` object.
        data: Value,
    },
}

impl Segment {
    /// Creates a plain text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    /// Creates a QQ face segment.
    pub fn face(id: i32) -> Self {
        Segment::Face(FaceData { id: id.to_string() })
    }

    /// Creates an image segment from a path (`file://`), URL or base64 payload.
    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(FileData::new(file))
    }

    /// Creates a voice record segment.
    pub fn record(file: impl Into<String>) -> Self {
        Segment::Record(FileData::new(file))
    }

    /// Creates a video segment.
    pub fn video(file: impl Into<String>) -> Self {
        Segment::Video(FileData::new(file))
    }

    /// Creates a file segment.
    pub fn file(file: impl Into<String>) -> Self {
        Segment::File(FileData::new(file))
    }

    /// Creates an @mention segment. `0` mentions everyone.
    pub fn at(qq: i64) -> Self {
        let qq = if qq == 0 {
            "all".to_string()
        } else {
            qq.to_string()
        };
        Segment::At(AtData { qq })
    }

    /// Creates a reply segment quoting the given message.
    pub fn reply(id: impl Into<String>) -> Self {
        Segment::Reply(ReplyData { id: id.into() })
    }

    /// Creates a dice segment.
    pub fn dice() -> Self {
        Segment::Dice(DiceData { result: None })
    }

    /// Creates a JSON card segment from its serialized payload.
    pub fn json(data: impl Into<String>) -> Self {
        Segment::Json(JsonData { data: data.into() })
    }

    /// Creates an XML card segment.
    pub fn xml(data: impl Into<String>) -> Self {
        Segment::Xml(XmlData { data: data.into() })
    }

    /// Creates a custom forward node carrying its own content.
    pub fn node(user_id: i64, nickname: impl Into<String>, content: Vec<Segment>) -> Self {
        Segment::Node(NodeData {
            id: None,
            user_id: Some(user_id.to_string()),
            nickname: Some(nickname.into()),
            content: Some(content),
        })
    }

    /// Returns the wire `type` of this segment.
    pub fn segment_type(&self) -> &str {
        match self {
            Segment::Text(_) => "text",
            Segment::Face(_) => "face",
            Segment::Image(_) => "image",
            Segment::Record(_) => "record",
            Segment::Video(_) => "video",
            Segment::File(_) => "file",
            Segment::At(_) => "at",
            Segment::Reply(_) => "reply",
            Segment::Dice(_) => "dice",
            Segment::Poke(_) => "poke",
            Segment::Json(_) => "json",
            Segment::Xml(_) => "xml",
            Segment::Forward(_) => "forward",
            Segment::Node(_) => "node",
            Segment::Unsupported { kind, .. } => kind,
        }
    }

    /// Returns the text content if this is a text segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(data) => Some(&data.text),
            _ => None,
        }
    }

    /// Returns the serialized card payload if this is a JSON segment.
    pub fn as_json(&self) -> Option<&str> {
        match self {
            Segment::Json(data) => Some(&data.data),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(data) => write!(f, "{}", data.text),
            Segment::Face(data) => write!(f, "[表情:{}]", data.id),
            Segment::Image(data) => write!(f, "[图片:{}]", data.file),
            Segment::Record(data) => write!(f, "[语音:{}]", data.file),
            Segment::Video(data) => write!(f, "[视频:{}]", data.file),
            Segment::File(data) => write!(f, "[文件:{}]", data.file),
            Segment::At(data) if data.qq == "all" => write!(f, "@全体成员"),
            Segment::At(data) => write!(f, "@{}", data.qq),
            Segment::Reply(data) => write!(f, "[回复:{}]", data.id),
            Segment::Dice(_) => write!(f, "[骰子]"),
            Segment::Poke(data) => write!(f, "[戳一戳:{}]", data.poke_type),
            Segment::Json(_) => write!(f, "[JSON消息]"),
            Segment::Xml(_) => write!(f, "[XML消息]"),
            Segment::Forward(data) => write!(f, "[合并转发:{}]", data.id),
            Segment::Node(_) => write!(f, "[转发节点]"),
            Segment::Unsupported { kind, .. } => write!(f, "[{kind}]"),
        }
    }
}

// ============================================================================
// Segment Data Types
// ============================================================================

/// Plain text segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    /// The text content.
    pub text: String,
}

/// QQ face segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceData {
    /// The face ID.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// Shared data for image, record, video and file segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    /// File name, `file://` path, URL, or `base64://` payload.
    pub file: String,
    /// Download URL (receive only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FileData {
    fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            url: None,
        }
    }
}

/// @mention segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtData {
    /// QQ number, or `"all"` for everyone.
    #[serde(deserialize_with = "string_or_number")]
    pub qq: String,
}

/// Reply segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyData {
    /// Message ID being replied to.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// Dice segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceData {
    /// Rolled value, 1 to 6 (receive only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Poke segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeData {
    /// Poke type.
    #[serde(rename = "type", deserialize_with = "string_or_number")]
    pub poke_type: String,
    /// Poke ID.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// JSON card segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonData {
    /// Serialized card JSON.
    pub data: String,
}

/// XML card segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlData {
    /// XML content.
    pub data: String,
}

/// Forward reference segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardData {
    /// Forward message ID.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// Forward node segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Reference an existing message by ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Custom node: sender user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Custom node: sender nickname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Custom node: message content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Segment>>,
}

/// Accepts `"123"` and `123` alike; OneBot implementations disagree on ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
