use parley_types::{
    ContentType, Conversation, ConversationId, ConversationSummary, Message, MessageStatus, User,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConstraintExt, DbError, Result};
use crate::messages::insert_message;
use crate::models::{
    CONVERSATION_COLUMNS, conversation_from_row, kind_at, timestamp_at, user_from_row,
};
use crate::users::require_user;
use crate::{Database, now};

// Display identity is resolved at read time: a group shows its own name and
// photo, a direct conversation shows the other member's current profile.
const SUMMARY_SELECT: &str = "
    SELECT c.id, c.is_group, c.last_activity,
           CASE WHEN c.is_group = 1 THEN c.name
                ELSE COALESCE(pu.name, m.peer_name, '') END,
           CASE WHEN c.is_group = 1 THEN c.photo ELSE pu.photo END
    FROM members m
    JOIN conversations c ON c.id = m.conversation_id
    LEFT JOIN members pm
           ON pm.conversation_id = c.id AND c.is_group = 0 AND pm.user_id != m.user_id
    LEFT JOIN users pu ON pu.id = pm.user_id
    WHERE m.user_id = ?1";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationSummary> {
    Ok(ConversationSummary {
        id: row.get(0)?,
        kind: kind_at(row, 1)?,
        last_activity: timestamp_at(row, 2)?,
        display_name: row.get(3)?,
        display_photo: row.get(4)?,
    })
}

/// Order-independent key identifying the direct conversation between two users.
fn direct_key(a: &Uuid, b: &Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

impl Database {
    // -- Direct conversations --

    pub fn direct_conversation_exists(&self, a: &Uuid, b: &Uuid) -> Result<bool> {
        self.with_conn(|conn| direct_exists(conn, a, b))
    }

    /// Create the direct conversation between `a` and `b` with both memberships.
    pub fn create_direct(&self, a: &Uuid, b: &Uuid) -> Result<Conversation> {
        let conversation = self.transaction(|conn| insert_direct(conn, a, b))?;
        info!(conversation_id = conversation.id, "Direct conversation created");
        Ok(conversation)
    }

    /// Open a direct conversation with its first message. Either both exist
    /// afterwards or neither does.
    pub fn start_direct(
        &self,
        sender: &Uuid,
        recipient: &Uuid,
        content: &str,
        content_type: ContentType,
    ) -> Result<(Conversation, Message)> {
        let (conversation, message) = self.transaction(|conn| {
            let created = insert_direct(conn, sender, recipient)?;
            let message = insert_message(
                conn,
                created.id,
                sender,
                content,
                content_type,
                MessageStatus::Sent,
            )?;
            let conversation = require_conversation(conn, created.id)?;
            Ok((conversation, message))
        })?;

        info!(
            conversation_id = conversation.id,
            message_id = message.id,
            "Direct conversation started"
        );
        Ok((conversation, message))
    }

    // -- Groups --

    /// Create a named group. `creator` is always a member; duplicate ids in
    /// `members` are ignored.
    pub fn create_group(
        &self,
        creator: &Uuid,
        name: &str,
        members: &[Uuid],
        photo: Option<&str>,
    ) -> Result<Conversation> {
        check_group_name(name)?;

        let mut roster = vec![*creator];
        for id in members {
            if !roster.contains(id) {
                roster.push(*id);
            }
        }

        let conversation = self.transaction(|conn| {
            if group_name_taken(conn, name, None)? {
                return Err(DbError::NameTaken(name.to_string()));
            }
            for id in &roster {
                require_user(conn, id)?;
            }

            let at = now().timestamp_micros();
            conn.execute(
                "INSERT INTO conversations (is_group, name, photo, direct_key, last_activity, created_at)
                 VALUES (1, ?1, ?2, NULL, ?3, ?3)",
                params![name, photo, at],
            )
            .or_conflict(|| DbError::NameTaken(name.to_string()))?;
            let id = conn.last_insert_rowid();

            for user_id in &roster {
                insert_member(conn, id, user_id, None)?;
            }
            require_conversation(conn, id)
        })?;

        info!(
            conversation_id = conversation.id,
            members = roster.len(),
            "Group {} created",
            name
        );
        Ok(conversation)
    }

    /// Add `user_id` to a group on behalf of `actor`, who must be a member.
    pub fn add_member(
        &self,
        actor: &Uuid,
        conversation_id: ConversationId,
        user_id: &Uuid,
    ) -> Result<()> {
        self.transaction(|conn| {
            require_group(conn, conversation_id)?;
            require_member(conn, conversation_id, actor)?;
            require_user(conn, user_id)?;
            if member_exists(conn, conversation_id, user_id)? {
                return Err(DbError::AlreadyMember);
            }
            insert_member(conn, conversation_id, user_id, None)
        })?;
        debug!(conversation_id, actor = %actor, user_id = %user_id, "Member added");
        Ok(())
    }

    /// Leave a group. Returns `true` when the caller was the last member and
    /// the group (with all its messages) was deleted.
    pub fn remove_member(&self, conversation_id: ConversationId, user_id: &Uuid) -> Result<bool> {
        let deleted = self.transaction(|conn| {
            require_group(conn, conversation_id)?;
            let removed = conn.execute(
                "DELETE FROM members WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id.to_string()],
            )?;
            if removed == 0 {
                return Err(DbError::NotFound("membership"));
            }

            let remaining: i64 = conn.query_row(
                "SELECT COUNT(*) FROM members WHERE conversation_id = ?1",
                [conversation_id],
                |r| r.get(0),
            )?;
            if remaining > 0 {
                return Ok(false);
            }
            conn.execute("DELETE FROM conversations WHERE id = ?1", [conversation_id])?;
            Ok(true)
        })?;

        if deleted {
            info!(conversation_id, "Last member left, group deleted");
        } else {
            debug!(conversation_id, user_id = %user_id, "Member left");
        }
        Ok(deleted)
    }

    pub fn is_member(&self, conversation_id: ConversationId, user_id: &Uuid) -> Result<bool> {
        self.with_conn(|conn| member_exists(conn, conversation_id, user_id))
    }

    pub fn rename_group(
        &self,
        actor: &Uuid,
        conversation_id: ConversationId,
        name: &str,
    ) -> Result<()> {
        check_group_name(name)?;
        self.transaction(|conn| {
            require_group(conn, conversation_id)?;
            require_member(conn, conversation_id, actor)?;
            if group_name_taken(conn, name, Some(conversation_id))? {
                return Err(DbError::NameTaken(name.to_string()));
            }
            conn.execute(
                "UPDATE conversations SET name = ?1 WHERE id = ?2",
                params![name, conversation_id],
            )
            .or_conflict(|| DbError::NameTaken(name.to_string()))?;
            Ok(())
        })?;
        info!(conversation_id, "Group renamed to {}", name);
        Ok(())
    }

    pub fn set_group_photo(
        &self,
        actor: &Uuid,
        conversation_id: ConversationId,
        photo: &str,
    ) -> Result<()> {
        self.transaction(|conn| {
            require_group(conn, conversation_id)?;
            require_member(conn, conversation_id, actor)?;
            conn.execute(
                "UPDATE conversations SET photo = ?1 WHERE id = ?2",
                params![photo, conversation_id],
            )?;
            Ok(())
        })?;
        debug!(conversation_id, "Group photo updated");
        Ok(())
    }

    // -- Reads --

    /// Every conversation `user_id` belongs to, most recently active first.
    pub fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<ConversationSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SUMMARY_SELECT} ORDER BY c.last_activity DESC, c.id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_conversation(&self, conversation_id: ConversationId) -> Result<Conversation> {
        self.with_conn(|conn| require_conversation(conn, conversation_id))
    }

    /// A single conversation as `viewer` sees it.
    pub fn conversation_for(
        &self,
        viewer: &Uuid,
        conversation_id: ConversationId,
    ) -> Result<ConversationSummary> {
        self.with_conn(|conn| {
            require_member(conn, conversation_id, viewer)?;
            let mut stmt = conn.prepare(&format!("{SUMMARY_SELECT} AND c.id = ?2"))?;
            stmt.query_row(params![viewer.to_string(), conversation_id], summary_from_row)
                .optional()?
                .ok_or(DbError::NotFound("conversation"))
        })
    }

    pub fn list_members(&self, viewer: &Uuid, conversation_id: ConversationId) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            require_member(conn, conversation_id, viewer)?;
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.photo FROM members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.joined_at, u.name",
            )?;
            let users = stmt
                .query_map([conversation_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

fn check_group_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DbError::InvalidInput("group name must not be empty".into()));
    }
    Ok(())
}

fn direct_exists(conn: &Connection, a: &Uuid, b: &Uuid) -> Result<bool> {
    if a == b {
        return Ok(false);
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM conversations c
             JOIN members ma ON ma.conversation_id = c.id AND ma.user_id = ?1
             JOIN members mb ON mb.conversation_id = c.id AND mb.user_id = ?2
             WHERE c.is_group = 0
         )",
        params![a.to_string(), b.to_string()],
        |r| r.get(0),
    )?;
    Ok(exists)
}

fn insert_direct(conn: &Connection, a: &Uuid, b: &Uuid) -> Result<Conversation> {
    if a == b {
        return Err(DbError::InvalidInput(
            "a direct conversation needs two different users".into(),
        ));
    }
    let user_a = require_user(conn, a)?;
    let user_b = require_user(conn, b)?;
    if direct_exists(conn, a, b)? {
        return Err(DbError::DirectConversationExists);
    }

    let at = now().timestamp_micros();
    conn.execute(
        "INSERT INTO conversations (is_group, name, photo, direct_key, last_activity, created_at)
         VALUES (0, NULL, NULL, ?1, ?2, ?2)",
        params![direct_key(a, b), at],
    )
    .or_conflict(|| DbError::DirectConversationExists)?;
    let id = conn.last_insert_rowid();

    // Each side caches the name of the other.
    insert_member(conn, id, a, Some(&user_b.name))?;
    insert_member(conn, id, b, Some(&user_a.name))?;
    require_conversation(conn, id)
}

fn insert_member(
    conn: &Connection,
    conversation_id: ConversationId,
    user_id: &Uuid,
    peer_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO members (conversation_id, user_id, peer_name, joined_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            conversation_id,
            user_id.to_string(),
            peer_name,
            now().timestamp_micros()
        ],
    )
    .or_conflict(|| DbError::AlreadyMember)?;
    Ok(())
}

fn group_name_taken(conn: &Connection, name: &str, except: Option<ConversationId>) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM conversations
             WHERE is_group = 1 AND name = ?1 AND (?2 IS NULL OR id != ?2)
         )",
        params![name, except],
        |r| r.get(0),
    )?;
    Ok(taken)
}

fn member_exists(conn: &Connection, conversation_id: ConversationId, user_id: &Uuid) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM members WHERE conversation_id = ?1 AND user_id = ?2)",
        params![conversation_id, user_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn query_conversation(
    conn: &Connection,
    conversation_id: ConversationId,
) -> Result<Option<Conversation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
    ))?;
    Ok(stmt
        .query_row([conversation_id], conversation_from_row)
        .optional()?)
}

pub(crate) fn require_conversation(
    conn: &Connection,
    conversation_id: ConversationId,
) -> Result<Conversation> {
    query_conversation(conn, conversation_id)?.ok_or(DbError::NotFound("conversation"))
}

fn require_group(conn: &Connection, conversation_id: ConversationId) -> Result<Conversation> {
    match query_conversation(conn, conversation_id)? {
        Some(c) if c.kind.is_group() => Ok(c),
        _ => Err(DbError::NotFound("group")),
    }
}

/// `NotFound` for an unknown conversation, `Forbidden` for a non-member.
pub(crate) fn require_member(
    conn: &Connection,
    conversation_id: ConversationId,
    user_id: &Uuid,
) -> Result<()> {
    require_conversation(conn, conversation_id)?;
    if member_exists(conn, conversation_id, user_id)? {
        Ok(())
    } else {
        Err(DbError::Forbidden("not a member of this conversation"))
    }
}
