//! Error types for the persistence gateway.

use dispatch_types::ParseLabelError;

/// Errors that can occur during record operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The requested row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Which table the lookup targeted (e.g. `agent config`).
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A uniqueness or foreign-key constraint refused the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored JSON column could not be encoded or decoded.
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored label did not match any known variant.
    #[error(transparent)]
    InvalidLabel(#[from] ParseLabelError),
}

impl RecordError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Maps a constraint violation to [`RecordError::Conflict`] with the given
    /// message; every other error is wrapped as [`RecordError::Database`].
    pub(crate) fn from_write(err: rusqlite::Error, conflict: impl FnOnce() -> String) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(conflict())
            }
            other => Self::Database(other),
        }
    }
}
