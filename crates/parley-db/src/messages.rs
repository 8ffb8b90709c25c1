use parley_types::{
    Comment, CommentId, ContentType, ConversationId, Message, MessageId, MessageStatus,
    MessageWithSender,
};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversations::require_member;
use crate::error::{DbError, Result};
use crate::models::{COMMENT_COLUMNS, MESSAGE_COLUMNS, comment_from_row, message_from_row};
use crate::{Database, now};

impl Database {
    pub fn send(
        &self,
        conversation_id: ConversationId,
        sender: &Uuid,
        content: &str,
        content_type: ContentType,
    ) -> Result<Message> {
        let message = self.transaction(|conn| {
            require_member(conn, conversation_id, sender)?;
            insert_message(
                conn,
                conversation_id,
                sender,
                content,
                content_type,
                MessageStatus::Sent,
            )
        })?;
        debug!(conversation_id, message_id = message.id, "Message sent");
        Ok(message)
    }

    /// Copy a message into another conversation as the forwarding user.
    pub fn forward(
        &self,
        source_conversation_id: ConversationId,
        message_id: MessageId,
        target_conversation_id: ConversationId,
        user: &Uuid,
    ) -> Result<Message> {
        let message = self.transaction(|conn| {
            require_member(conn, source_conversation_id, user)?;
            require_member(conn, target_conversation_id, user)?;
            let original = query_message_in(conn, message_id, source_conversation_id)?
                .ok_or(DbError::NotFound("message"))?;
            insert_message(
                conn,
                target_conversation_id,
                user,
                &original.content,
                original.content_type,
                MessageStatus::Forwarded,
            )
        })?;
        debug!(
            source_conversation_id,
            target_conversation_id,
            message_id = message.id,
            "Message forwarded"
        );
        Ok(message)
    }

    /// Delete a message the caller sent. Its comments go with it.
    pub fn delete_message(&self, message_id: MessageId, user: &Uuid) -> Result<()> {
        self.transaction(|conn| {
            let message = require_message(conn, message_id)?;
            if message.sender_id != *user {
                return Err(DbError::Forbidden("only the sender can delete a message"));
            }
            conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
            Ok(())
        })?;
        debug!(message_id, "Message deleted");
        Ok(())
    }

    pub fn get_message(&self, message_id: MessageId) -> Result<Message> {
        self.with_conn(|conn| require_message(conn, message_id))
    }

    /// Messages in chronological order, each with the sender's current profile.
    pub fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        viewer: &Uuid,
    ) -> Result<Vec<MessageWithSender>> {
        self.with_conn(|conn| {
            require_member(conn, conversation_id, viewer)?;
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id, m.content, m.content_type,
                        m.status, m.created_at, u.name, u.photo
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.created_at, m.id",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(MessageWithSender {
                        message: message_from_row(row)?,
                        sender_name: row.get(7)?,
                        sender_photo: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn comment(
        &self,
        message_id: MessageId,
        user: &Uuid,
        content: &str,
        content_type: ContentType,
    ) -> Result<Comment> {
        check_content(content, content_type)?;
        let comment = self.transaction(|conn| {
            let message = require_message(conn, message_id)?;
            require_member(conn, message.conversation_id, user)?;

            let created_at = now();
            conn.execute(
                "INSERT INTO comments (message_id, author_id, content, content_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message_id,
                    user.to_string(),
                    content,
                    content_type.as_str(),
                    created_at.timestamp_micros()
                ],
            )?;
            Ok(Comment {
                id: conn.last_insert_rowid(),
                message_id,
                author_id: *user,
                content: content.to_string(),
                content_type,
                created_at,
            })
        })?;
        debug!(message_id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }

    pub fn list_comments(&self, message_id: MessageId, viewer: &Uuid) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let message = require_message(conn, message_id)?;
            require_member(conn, message.conversation_id, viewer)?;
            query_comments(conn, message_id)
        })
    }

    pub fn delete_comment(&self, comment_id: CommentId, user: &Uuid) -> Result<()> {
        self.transaction(|conn| {
            let comment = conn
                .query_row(
                    &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                    [comment_id],
                    comment_from_row,
                )
                .optional()?
                .ok_or(DbError::NotFound("comment"))?;
            if comment.author_id != *user {
                return Err(DbError::Forbidden("only the author can delete a comment"));
            }
            conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            Ok(())
        })?;
        debug!(comment_id, "Comment deleted");
        Ok(())
    }

    /// Turn every comment on a message into a standalone message of the same
    /// conversation, oldest first, and drop the comments. All or nothing.
    pub fn promote_comments(
        &self,
        message_id: MessageId,
        conversation_id: ConversationId,
        actor: &Uuid,
    ) -> Result<Vec<Message>> {
        let promoted = self.transaction(|conn| {
            require_member(conn, conversation_id, actor)?;
            query_message_in(conn, message_id, conversation_id)?
                .ok_or(DbError::NotFound("message"))?;

            let comments = query_comments(conn, message_id)?;
            let mut promoted = Vec::with_capacity(comments.len());
            // The author stays the sender even if they have since left.
            for comment in &comments {
                promoted.push(insert_message(
                    conn,
                    conversation_id,
                    &comment.author_id,
                    &comment.content,
                    comment.content_type,
                    MessageStatus::CommentConverted,
                )?);
            }
            conn.execute("DELETE FROM comments WHERE message_id = ?1", [message_id])?;
            Ok(promoted)
        })?;

        info!(
            message_id,
            conversation_id,
            promoted = promoted.len(),
            "Comments promoted"
        );
        Ok(promoted)
    }
}

fn check_content(content: &str, content_type: ContentType) -> Result<()> {
    if content_type.accepts(content) {
        Ok(())
    } else {
        Err(DbError::InvalidInput(format!(
            "content is not acceptable as {content_type}"
        )))
    }
}

/// Insert a message and move the conversation's last activity forward.
/// Callers run this inside a transaction.
pub(crate) fn insert_message(
    conn: &Connection,
    conversation_id: ConversationId,
    sender: &Uuid,
    content: &str,
    content_type: ContentType,
    status: MessageStatus,
) -> Result<Message> {
    check_content(content, content_type)?;

    let created_at = now();
    let at = created_at.timestamp_micros();
    conn.execute(
        "INSERT INTO messages (conversation_id, sender_id, content, content_type, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            conversation_id,
            sender.to_string(),
            content,
            content_type.as_str(),
            status.as_str(),
            at
        ],
    )?;
    let id = conn.last_insert_rowid();

    conn.execute(
        "UPDATE conversations SET last_activity = MAX(last_activity, ?1) WHERE id = ?2",
        params![at, conversation_id],
    )?;

    Ok(Message {
        id,
        conversation_id,
        sender_id: *sender,
        content: content.to_string(),
        content_type,
        status,
        created_at,
    })
}

fn require_message(conn: &Connection, message_id: MessageId) -> Result<Message> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        [message_id],
        message_from_row,
    )
    .optional()?
    .ok_or(DbError::NotFound("message"))
}

fn query_message_in(
    conn: &Connection,
    message_id: MessageId,
    conversation_id: ConversationId,
) -> Result<Option<Message>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 AND conversation_id = ?2"
            ),
            params![message_id, conversation_id],
            message_from_row,
        )
        .optional()?)
}

fn query_comments(conn: &Connection, message_id: MessageId) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE message_id = ?1 ORDER BY created_at, id"
    ))?;
    let comments = stmt
        .query_map([message_id], comment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use parley_types::{Conversation, User};

    struct Fixture {
        db: Database,
        alice: User,
        bob: User,
        carol: User,
        direct: Conversation,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_or_get_user("alice").unwrap();
        let bob = db.create_or_get_user("bob").unwrap();
        let carol = db.create_or_get_user("carol").unwrap();
        let direct = db.create_direct(&alice.id, &bob.id).unwrap();
        Fixture {
            db,
            alice,
            bob,
            carol,
            direct,
        }
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn send_requires_membership_and_content() {
        let f = fixture();
        let msg = f
            .db
            .send(f.direct.id, &f.alice.id, "hi bob", ContentType::Text)
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.sender_id, f.alice.id);
        assert_eq!(f.db.get_message(msg.id).unwrap(), msg);
        assert_eq!(
            f.db.get_conversation(f.direct.id).unwrap().last_activity,
            msg.created_at
        );

        assert_eq!(
            f.db.send(f.direct.id, &f.carol.id, "let me in", ContentType::Text)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            f.db.send(f.direct.id, &f.alice.id, "   ", ContentType::Text)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(count(&f.db, "SELECT COUNT(*) FROM messages"), 1);
    }

    #[test]
    fn media_content_must_match_its_type() {
        let f = fixture();
        f.db.send(f.direct.id, &f.alice.id, "/uploads/cat.gif", ContentType::Gif)
            .unwrap();
        f.db.send(f.direct.id, &f.alice.id, "/uploads/cat.JPG", ContentType::Photo)
            .unwrap();
        assert_eq!(
            f.db.send(f.direct.id, &f.alice.id, "/uploads/cat.gif", ContentType::Photo)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            f.db.send(f.direct.id, &f.alice.id, "/uploads/cat.bmp", ContentType::Photo)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn list_is_chronological_with_current_sender_profile() {
        let f = fixture();
        f.db.send(f.direct.id, &f.alice.id, "one", ContentType::Text).unwrap();
        f.db.send(f.direct.id, &f.bob.id, "two", ContentType::Text).unwrap();
        f.db.send(f.direct.id, &f.alice.id, "three", ContentType::Text).unwrap();
        f.db.set_photo(&f.bob.id, "/uploads/bob.png").unwrap();

        let listed = f.db.list_by_conversation(f.direct.id, &f.bob.id).unwrap();
        let contents: Vec<&str> = listed.iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(listed[1].sender_name, "bob");
        assert_eq!(listed[1].sender_photo.as_deref(), Some("/uploads/bob.png"));
        assert!(listed[0].sender_photo.is_none());

        assert_eq!(
            f.db.list_by_conversation(f.direct.id, &f.carol.id)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
    }

    #[test]
    fn forward_copies_into_target() {
        let f = fixture();
        let group = f
            .db
            .create_group(&f.alice.id, "pets", &[f.carol.id], None)
            .unwrap();
        let original = f
            .db
            .send(f.direct.id, &f.bob.id, "/uploads/dog.png", ContentType::Photo)
            .unwrap();

        let copy = f
            .db
            .forward(f.direct.id, original.id, group.id, &f.alice.id)
            .unwrap();
        assert_eq!(copy.conversation_id, group.id);
        assert_eq!(copy.sender_id, f.alice.id);
        assert_eq!(copy.status, MessageStatus::Forwarded);
        assert_eq!(copy.content, original.content);
        assert_eq!(copy.content_type, ContentType::Photo);

        // Message must live in the named source conversation.
        assert_eq!(
            f.db.forward(group.id, original.id, f.direct.id, &f.alice.id)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn forward_without_target_membership_creates_nothing() {
        let f = fixture();
        let group = f.db.create_group(&f.carol.id, "private", &[], None).unwrap();
        let original = f
            .db
            .send(f.direct.id, &f.alice.id, "secret", ContentType::Text)
            .unwrap();
        let before = f.db.get_conversation(group.id).unwrap().last_activity;

        assert_eq!(
            f.db.forward(f.direct.id, original.id, group.id, &f.alice.id)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(count(&f.db, "SELECT COUNT(*) FROM messages"), 1);
        assert_eq!(f.db.get_conversation(group.id).unwrap().last_activity, before);
    }

    #[test]
    fn only_sender_deletes_and_comments_cascade() {
        let f = fixture();
        let msg = f
            .db
            .send(f.direct.id, &f.alice.id, "delete me", ContentType::Text)
            .unwrap();
        f.db.comment(msg.id, &f.bob.id, "no", ContentType::Text).unwrap();

        assert_eq!(
            f.db.delete_message(msg.id, &f.bob.id).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert!(f.db.get_message(msg.id).is_ok());

        f.db.delete_message(msg.id, &f.alice.id).unwrap();
        assert_eq!(f.db.get_message(msg.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(count(&f.db, "SELECT COUNT(*) FROM comments"), 0);
        assert_eq!(
            f.db.delete_message(msg.id, &f.alice.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn comments_are_member_only() {
        let f = fixture();
        let msg = f
            .db
            .send(f.direct.id, &f.alice.id, "thoughts?", ContentType::Text)
            .unwrap();

        let c = f.db.comment(msg.id, &f.bob.id, "nice", ContentType::Text).unwrap();
        assert_eq!(c.author_id, f.bob.id);
        assert_eq!(
            f.db.comment(msg.id, &f.carol.id, "me too", ContentType::Text)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            f.db.comment(9_999, &f.bob.id, "ghost", ContentType::Text)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );

        assert_eq!(f.db.list_comments(msg.id, &f.alice.id).unwrap(), vec![c.clone()]);
        assert_eq!(
            f.db.list_comments(msg.id, &f.carol.id).unwrap_err().kind(),
            ErrorKind::Forbidden
        );

        assert_eq!(
            f.db.delete_comment(c.id, &f.alice.id).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        f.db.delete_comment(c.id, &f.bob.id).unwrap();
        assert_eq!(
            f.db.delete_comment(c.id, &f.bob.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn promotion_converts_comments_in_order() {
        let f = fixture();
        let msg = f
            .db
            .send(f.direct.id, &f.alice.id, "vote here", ContentType::Text)
            .unwrap();
        f.db.comment(msg.id, &f.bob.id, "first", ContentType::Text).unwrap();
        f.db.comment(msg.id, &f.alice.id, "/uploads/yes.gif", ContentType::Gif)
            .unwrap();

        let promoted = f
            .db
            .promote_comments(msg.id, f.direct.id, &f.alice.id)
            .unwrap();
        assert_eq!(promoted.len(), 2);
        assert_eq!(promoted[0].content, "first");
        assert_eq!(promoted[0].sender_id, f.bob.id);
        assert_eq!(promoted[1].content_type, ContentType::Gif);
        assert!(promoted
            .iter()
            .all(|m| m.status == MessageStatus::CommentConverted));

        assert!(f.db.list_comments(msg.id, &f.alice.id).unwrap().is_empty());
        let listed = f.db.list_by_conversation(f.direct.id, &f.bob.id).unwrap();
        assert_eq!(listed.len(), 3);

        // Nothing left to promote.
        assert!(f
            .db
            .promote_comments(msg.id, f.direct.id, &f.alice.id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn promotion_checks_conversation_and_actor() {
        let f = fixture();
        let other = f.db.create_direct(&f.alice.id, &f.carol.id).unwrap();
        let msg = f
            .db
            .send(f.direct.id, &f.alice.id, "hello", ContentType::Text)
            .unwrap();

        assert_eq!(
            f.db.promote_comments(msg.id, other.id, &f.alice.id)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            f.db.promote_comments(msg.id, f.direct.id, &f.carol.id)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
    }

    #[test]
    fn failed_promotion_leaves_everything_in_place() {
        let f = fixture();
        let msg = f
            .db
            .send(f.direct.id, &f.alice.id, "vote here", ContentType::Text)
            .unwrap();
        for text in ["first", "boom", "third"] {
            f.db.comment(msg.id, &f.bob.id, text, ContentType::Text).unwrap();
        }
        let before = f.db.get_conversation(f.direct.id).unwrap().last_activity;

        f.db.with_writer(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER fail_promotion BEFORE INSERT ON messages
                 WHEN NEW.status = 'comment-converted' AND NEW.content = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let err = f
            .db
            .promote_comments(msg.id, f.direct.id, &f.alice.id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);

        assert_eq!(f.db.list_comments(msg.id, &f.alice.id).unwrap().len(), 3);
        assert_eq!(
            count(
                &f.db,
                "SELECT COUNT(*) FROM messages WHERE status = 'comment-converted'"
            ),
            0
        );
        assert_eq!(
            f.db.get_conversation(f.direct.id).unwrap().last_activity,
            before
        );
    }
}
