use std::fmt;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("name already taken: {0}")]
    NameTaken(String),

    #[error("user is already a member of this conversation")]
    AlreadyMember,

    #[error("a direct conversation between these users already exists")]
    DirectConversationExists,

    #[error("session token is not active")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),
}

/// The coarse failure classes callers translate into transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Unauthenticated,
    InvalidInput,
    StorageFailure,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound(_) => ErrorKind::NotFound,
            DbError::Forbidden(_) => ErrorKind::Forbidden,
            DbError::NameTaken(_) | DbError::AlreadyMember | DbError::DirectConversationExists => {
                ErrorKind::Conflict
            }
            DbError::Unauthenticated => ErrorKind::Unauthenticated,
            DbError::InvalidInput(_) => ErrorKind::InvalidInput,
            DbError::Corrupt(_) | DbError::LockPoisoned | DbError::Storage(_) => {
                ErrorKind::StorageFailure
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::StorageFailure => "storage_failure",
        };
        f.write_str(s)
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(idx, _, source) => {
                DbError::Corrupt(format!("column {}: {}", idx, source))
            }
            other => DbError::Storage(other),
        }
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Maps a uniqueness violation from an insert-if-absent write onto the
/// specific conflict the caller expects.
pub(crate) trait ConstraintExt<T> {
    fn or_conflict(self, conflict: impl FnOnce() -> DbError) -> Result<T>;
}

impl<T> ConstraintExt<T> for std::result::Result<T, rusqlite::Error> {
    fn or_conflict(self, conflict: impl FnOnce() -> DbError) -> Result<T> {
        match self {
            Ok(val) => Ok(val),
            Err(e) if is_unique_violation(&e) => Err(conflict()),
            Err(e) => Err(e.into()),
        }
    }
}
