//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (ventrix-core)            │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::kind() → ErrorKind → NOT_FOUND / CONFLICT / INVALID_STATE /  │
//! │                                VALIDATION_ERROR / TRANSIENT / INTERNAL │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use ventrix_core::{CoreError, ErrorKind, ValidationError};

/// Database operation errors.
///
/// These errors wrap sqlx errors and domain errors and provide additional
/// context for debugging and for the caller.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Lookup by id finds no row
    /// - A referenced parent (sucursal, categoria, mesa...) is absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Producto, Mesa or Categoria name repeated within a sucursal
    /// - Duplicate TipoPago id, usuario documento or correo
    /// - A usuario that already owns a restaurant
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Delete refused because other rows still point at the entity.
    ///
    /// ## When This Occurs
    /// - Deleting a categoria that still has productos
    /// - Deleting a producto referenced by order lines
    /// - Deleting a usuario that owns a restaurant
    #[error("{entity} {id} is still referenced by {referenced_by}")]
    InUse {
        entity: String,
        id: String,
        referenced_by: String,
    },

    /// Foreign key constraint violation not caught by an explicit check.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Domain rule violation (state machine, validation).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// SQLite write lock not acquired within the busy timeout.
    #[error("Database is busy, retry later")]
    Busy,

    /// Blob storage failed.
    #[error("Blob storage failed: {0}")]
    Blob(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
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
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl ToString) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Creates an InUse error.
    pub fn in_use(entity: impl Into<String>, id: impl ToString, referenced_by: impl Into<String>) -> Self {
        DbError::InUse {
            entity: entity.into(),
            id: id.to_string(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Classifies the error.
    ///
    /// ```text
    /// NotFound, ForeignKeyViolation   → NOT_FOUND
    /// UniqueViolation, InUse          → CONFLICT
    /// Domain(e)                       → e.kind()
    /// Busy, PoolExhausted             → TRANSIENT
    /// everything else                 → INTERNAL
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } | DbError::ForeignKeyViolation { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::InUse { .. } => ErrorKind::Conflict,
            DbError::Domain(e) => e.kind(),
            DbError::Busy | DbError::PoolExhausted => ErrorKind::Transient,
            DbError::Blob(_)
            | DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Internal(_) => ErrorKind::Internal,
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
/// sqlx::Error::Database       → Analyze code/message for constraint or lock
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
                let code = db_err.code();

                // SQLite messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // Lock timeout: SQLITE_BUSY (5) / SQLITE_BUSY_SNAPSHOT (517), "database is locked"
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
                } else if matches!(code.as_deref(), Some("5") | Some("517") | Some("6"))
                    || msg.contains("database is locked")
                {
                    DbError::Busy
                } else {
                    tracing::error!(error = %msg, "Unexpected database error");
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => {
                tracing::error!(error = %err, "Unexpected database error");
                DbError::Internal(err.to_string())
            }
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
