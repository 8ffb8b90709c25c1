use parley_types::User;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConstraintExt, DbError, Result};
use crate::models::{USER_COLUMNS, user_from_row, uuid_at};
use crate::{Database, now};

const SEARCH_LIMIT: i64 = 50;

/// Result of a login: the (possibly new) user and their only active token.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
    pub created: bool,
}

impl Database {
    // -- Identity --

    /// Return the user called `name`, creating it on first sight.
    pub fn create_or_get_user(&self, name: &str) -> Result<User> {
        let (user, created) = self.transaction(|conn| upsert_user(conn, name))?;
        if created {
            info!(user_id = %user.id, "Created user {}", user.name);
        }
        Ok(user)
    }

    pub fn get_user(&self, id: &Uuid) -> Result<User> {
        self.with_conn(|conn| require_user(conn, id))
    }

    pub fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_name(conn, name))
    }

    /// Case-insensitive prefix search over user names.
    pub fn search_users(&self, prefix: &str) -> Result<Vec<User>> {
        let pattern = format!("{}%", escape_like(prefix));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY name COLLATE NOCASE
                 LIMIT ?2"
            ))?;
            let users = stmt
                .query_map(params![pattern, SEARCH_LIMIT], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    // -- Sessions --

    /// Create-or-get the user and issue a fresh token, revoking any previous one.
    pub fn login(&self, name: &str) -> Result<LoginOutcome> {
        let outcome = self.transaction(|conn| {
            let (user, created) = upsert_user(conn, name)?;
            let token = replace_session(conn, &user.id)?;
            Ok(LoginOutcome {
                user,
                token,
                created,
            })
        })?;

        info!(
            user_id = %outcome.user.id,
            created = outcome.created,
            "User {} logged in",
            outcome.user.name
        );
        Ok(outcome)
    }

    pub fn logout(&self, token: &str) -> Result<()> {
        let removed = self.with_writer(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?)
        })?;
        if removed == 0 {
            return Err(DbError::Unauthenticated);
        }
        debug!("Session revoked");
        Ok(())
    }

    pub fn resolve_token(&self, token: &str) -> Result<Uuid> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id FROM sessions WHERE token = ?1",
                [token],
                |row| uuid_at(row, 0),
            )
            .optional()?
            .ok_or(DbError::Unauthenticated)
        })
    }

    // -- Profile --

    /// Rename a user and refresh the cached peer name on every direct
    /// conversation they take part in, as one transaction.
    pub fn rename(&self, user_id: &Uuid, new_name: &str) -> Result<()> {
        check_name(new_name)?;

        let refreshed = self.transaction(|conn| {
            let current = require_user(conn, user_id)?;
            if current.name == new_name {
                return Ok(0);
            }
            if let Some(holder) = query_user_by_name(conn, new_name)? {
                if holder.id != *user_id {
                    return Err(DbError::NameTaken(new_name.to_string()));
                }
            }

            conn.execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![new_name, user_id.to_string()],
            )
            .or_conflict(|| DbError::NameTaken(new_name.to_string()))?;

            let refreshed = conn.execute(
                "UPDATE members SET peer_name = ?1
                 WHERE user_id != ?2
                   AND conversation_id IN (
                       SELECT m.conversation_id
                       FROM members m
                       JOIN conversations c ON c.id = m.conversation_id
                       WHERE m.user_id = ?2 AND c.is_group = 0
                   )",
                params![new_name, user_id.to_string()],
            )?;
            Ok(refreshed)
        })?;

        info!(user_id = %user_id, refreshed, "User renamed to {}", new_name);
        Ok(())
    }

    pub fn set_photo(&self, user_id: &Uuid, photo: &str) -> Result<()> {
        let updated = self.with_writer(|conn| {
            Ok(conn.execute(
                "UPDATE users SET photo = ?1 WHERE id = ?2",
                params![photo, user_id.to_string()],
            )?)
        })?;
        if updated == 0 {
            return Err(DbError::NotFound("user"));
        }
        debug!(user_id = %user_id, "User photo updated");
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DbError::InvalidInput("name must not be empty".into()));
    }
    Ok(())
}

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn upsert_user(conn: &Connection, name: &str) -> Result<(User, bool)> {
    check_name(name)?;
    let inserted = conn.execute(
        "INSERT INTO users (id, name, photo, created_at) VALUES (?1, ?2, NULL, ?3)
         ON CONFLICT(name) DO NOTHING",
        params![Uuid::new_v4().to_string(), name, now().timestamp_micros()],
    )?;
    let user = query_user_by_name(conn, name)?.ok_or(DbError::NotFound("user"))?;
    Ok((user, inserted == 1))
}

fn replace_session(conn: &Connection, user_id: &Uuid) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1",
        [user_id.to_string()],
    )?;
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![token, user_id.to_string(), now().timestamp_micros()],
    )?;
    Ok(token)
}

pub(crate) fn query_user(conn: &Connection, id: &Uuid) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    Ok(stmt.query_row([id.to_string()], user_from_row).optional()?)
}

pub(crate) fn query_user_by_name(conn: &Connection, name: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1"))?;
    Ok(stmt.query_row([name], user_from_row).optional()?)
}

pub(crate) fn require_user(conn: &Connection, id: &Uuid) -> Result<User> {
    query_user(conn, id)?.ok_or(DbError::NotFound("user"))
}
