//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (business rule)           │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← categorized, domain errors carried intact     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (campus-api) ← status code + {code, message} JSON            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use campus_core::{CoreError, ErrorKind, SlotConflict, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and carry business-rule failures raised
/// while a repository operation was running.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule rejected the operation (not found, conflict, validation).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// `fetch_one` returned no rows.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation not claimed by a repository.
    ///
    /// ## When This Occurs
    /// - Duplicate admission number, email, invoice or receipt number
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Domain(CoreError::not_found(entity, id))
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Taxonomy bucket for client-facing errors; `None` means internal.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DbError::Domain(e) => Some(e.kind()),
            DbError::NotFound { .. } => Some(ErrorKind::NotFound),
            DbError::UniqueViolation { .. } => Some(ErrorKind::Conflict),
            DbError::ForeignKeyViolation { .. } => Some(ErrorKind::Validation),
            _ => None,
        }
    }

    /// Replaces a unique violation with the domain error `f` derives from
    /// the offending column list. Other errors pass through untouched.
    pub fn on_unique(self, f: impl FnOnce(&str) -> CoreError) -> Self {
        match self {
            DbError::UniqueViolation { field, .. } => DbError::Domain(f(&field)),
            other => other,
        }
    }

    /// Maps a violation of one of the timetable slot indexes to its conflict.
    pub fn into_slot_conflict(self) -> Self {
        let conflict = match &self {
            DbError::UniqueViolation { field, .. } if field.contains("class_id") => {
                Some(SlotConflict::Class)
            }
            DbError::UniqueViolation { field, .. } if field.contains("teacher_id") => {
                Some(SlotConflict::Teacher)
            }
            DbError::UniqueViolation { field, .. } if field.contains("room_id") => {
                Some(SlotConflict::Room)
            }
            _ => None,
        };

        match conflict {
            Some(conflict) => DbError::Domain(CoreError::Timetable(conflict)),
            None => self,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>[, <table>.<column>...]"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
