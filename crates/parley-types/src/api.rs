use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContentType, Conversation, ConversationId, Message, User};

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 25;
pub const MAX_CONTENT_LEN: usize = 4096;

/// A request body failed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Required-field and shape checks, run once when a request enters the API.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn check_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if name.trim() != name {
        return Err(ValidationError {
            field,
            reason: "must not start or end with whitespace",
        });
    }
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError {
            field,
            reason: "must be 3 to 25 characters",
        });
    }
    Ok(())
}

fn check_content(content: &str, content_type: ContentType) -> Result<(), ValidationError> {
    if content.len() > MAX_CONTENT_LEN {
        return Err(ValidationError {
            field: "content",
            reason: "too long",
        });
    }
    // Media content is a reference to an already stored file.
    if !content_type.accepts(content) {
        return Err(ValidationError {
            field: "content",
            reason: "must be non-empty text or a media reference matching content_type",
        });
    }
    Ok(())
}

fn check_photo(photo: &str) -> Result<(), ValidationError> {
    match ContentType::from_file_name(photo) {
        Some(ContentType::Photo) | Some(ContentType::Gif) => Ok(()),
        _ => Err(ValidationError {
            field: "photo",
            reason: "must reference a jpg, png or gif",
        }),
    }
}

// -- Session --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub name: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameRequest {
    pub name: String,
}

impl Validate for RenameRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPhotoRequest {
    pub photo: String,
}

impl Validate for SetPhotoRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_photo(&self.photo)
    }
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub prefix: String,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartDirectRequest {
    pub recipient_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
}

impl Validate for StartDirectRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_content(&self.content, self.content_type)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartDirectResponse {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub members: Vec<Uuid>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl Validate for CreateGroupRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)?;
        if let Some(photo) = &self.photo {
            check_photo(photo)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupNameRequest {
    pub name: String,
}

impl Validate for GroupNameRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub group_deleted: bool,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_content(&self.content, self.content_type)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardRequest {
    pub target_conversation_id: ConversationId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
}

impl Validate for CommentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_content(&self.content, self.content_type)
    }
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_bounded() {
        assert!(LoginRequest { name: "al".into() }.validate().is_err());
        assert!(LoginRequest { name: "alice".into() }.validate().is_ok());
        assert!(LoginRequest { name: " alice".into() }.validate().is_err());
        assert!(LoginRequest { name: "a".repeat(26) }.validate().is_err());
    }

    #[test]
    fn media_content_must_match_type() {
        let ok = SendMessageRequest {
            content: "/uploads/cat.png".into(),
            content_type: ContentType::Photo,
        };
        assert!(ok.validate().is_ok());

        let mismatched = SendMessageRequest {
            content: "/uploads/cat.png".into(),
            content_type: ContentType::Gif,
        };
        assert_eq!(mismatched.validate().unwrap_err().field, "content");

        let blank = SendMessageRequest {
            content: "   ".into(),
            content_type: ContentType::Text,
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: Result<SendMessageRequest, _> =
            serde_json::from_str(r#"{"content":"hi","sender":"x"}"#);
        assert!(res.is_err());

        let req: SendMessageRequest = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(req.content_type, ContentType::Text);
    }
}
