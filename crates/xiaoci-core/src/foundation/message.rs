//! Outbound message and conversation types.

use serde::{Deserialize, Serialize};

use super::segment::Segment;

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A group chat.
    #[default]
    Group,
    /// A one-to-one chat.
    Private,
}

impl Origin {
    /// Returns the OneBot `message_type` string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Group => "group",
            Origin::Private => "private",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply target: a group, or a user for private chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conversation {
    /// Group or private.
    pub origin: Origin,
    /// Group id for groups, user id for private chats.
    pub id: i64,
}

impl Conversation {
    /// A group conversation.
    pub fn group(group_id: i64) -> Self {
        Self {
            origin: Origin::Group,
            id: group_id,
        }
    }

    /// A private conversation with a user.
    pub fn private(user_id: i64) -> Self {
        Self {
            origin: Origin::Private,
            id: user_id,
        }
    }
}

impl std::fmt::Display for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.origin, self.id)
    }
}

/// An ordered list of segments ready to be sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Vec<Segment>);

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a segment (builder pattern).
    pub fn with(mut self, segment: Segment) -> Self {
        self.0.push(segment);
        self
    }

    /// Appends a segment.
    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Consumes the message, returning its segments.
    pub fn into_segments(self) -> Vec<Segment> {
        self.0
    }

    /// Returns true if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Concatenates the text segments.
    pub fn plain_text(&self) -> String {
        self.0.iter().filter_map(Segment::as_text).collect()
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self(vec![Segment::text(text)])
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self(vec![Segment::text(text)])
    }
}

impl From<Segment> for Message {
    fn from(segment: Segment) -> Self {
        Self(vec![segment])
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl FromIterator<Segment> for Message {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
