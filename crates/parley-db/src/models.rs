//! Row mapping from SQLite columns into the shared domain types.
//!
//! Column order for each mapper is fixed by the matching `*_COLUMNS` constant.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use parley_types::{Comment, Conversation, ConversationKind, Message, User};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str = "id, name, photo";

pub(crate) const CONVERSATION_COLUMNS: &str =
    "id, is_group, name, photo, last_activity, created_at";

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, content_type, status, created_at";

pub(crate) const COMMENT_COLUMNS: &str =
    "id, message_id, author_id, content, content_type, created_at";

fn conversion_failure<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_failure(idx, Type::Text, e))
}

#[derive(Debug, thiserror::Error)]
#[error("timestamp out of range: {0}")]
struct TimestampOutOfRange(i64);

pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| conversion_failure(idx, Type::Integer, TimestampOutOfRange(micros)))
}

fn tag_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_failure(idx, Type::Text, e))
}

pub(crate) fn kind_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ConversationKind> {
    let is_group: bool = row.get(idx)?;
    Ok(if is_group {
        ConversationKind::Group
    } else {
        ConversationKind::Direct
    })
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        photo: row.get(2)?,
    })
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        kind: kind_at(row, 1)?,
        name: row.get(2)?,
        photo: row.get(3)?,
        last_activity: timestamp_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: uuid_at(row, 2)?,
        content: row.get(3)?,
        content_type: tag_at(row, 4)?,
        status: tag_at(row, 5)?,
        created_at: timestamp_at(row, 6)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        message_id: row.get(1)?,
        author_id: uuid_at(row, 2)?,
        content: row.get(3)?,
        content_type: tag_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
    })
}
