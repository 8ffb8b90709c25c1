use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ConversationId = i64;
pub type MessageId = i64;
pub type CommentId = i64;

/// A stored tag did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} tag: {value}")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn is_group(self) -> bool {
        matches!(self, ConversationKind::Group)
    }
}

/// A conversation as stored. Direct conversations have no name or photo of
/// their own; see [`ConversationSummary`] for the per-viewer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A conversation as one member sees it: for direct conversations the display
/// identity is the other participant's current name and photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub display_name: String,
    pub display_photo: Option<String>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Photo,
    Gif,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Photo => "photo",
            ContentType::Gif => "gif",
        }
    }

    /// Classify an uploaded media reference by its extension. Only still
    /// images and GIFs are accepted.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" => Some(ContentType::Photo),
            "gif" => Some(ContentType::Gif),
            _ => None,
        }
    }

    /// Whether `content` is acceptable as a body of this type: any non-blank
    /// text, or a media reference whose extension matches.
    pub fn accepts(self, content: &str) -> bool {
        match self {
            ContentType::Text => !content.trim().is_empty(),
            media => Self::from_file_name(content) == Some(media),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "photo" => Ok(ContentType::Photo),
            "gif" => Ok(ContentType::Gif),
            other => Err(UnknownTag {
                kind: "content type",
                value: other.to_string(),
            }),
        }
    }
}

/// How a message came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "forwarded")]
    Forwarded,
    #[serde(rename = "comment-converted")]
    CommentConverted,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Forwarded => "forwarded",
            MessageStatus::CommentConverted => "comment-converted",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "forwarded" => Ok(MessageStatus::Forwarded),
            "comment-converted" => Ok(MessageStatus::CommentConverted),
            other => Err(UnknownTag {
                kind: "message status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: Uuid,
    pub content: String,
    pub content_type: ContentType,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

/// A message joined with its sender's current profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: String,
    pub sender_photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub message_id: MessageId,
    pub author_id: Uuid,
    pub content: String,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
}
