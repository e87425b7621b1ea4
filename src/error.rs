//! Typed errors for the catalog library.
//!
//! Read paths only ever produce [`CatalogError::Validation`],
//! [`CatalogError::NotFound`] or [`CatalogError::Storage`]. Integrity errors
//! are reachable only from ingestion and migration, which are the only
//! writers.

use thiserror::Error;

/// Result alias used across the catalog library.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A request parameter or record field is malformed or out of range.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A referenced department or product does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A write would violate a store constraint.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The store is unreachable or a transaction failed.
    #[error("storage error: {0}")]
    Storage(sqlx::Error),

    /// The ingestion source could not be opened or read as a table.
    #[error("source error: {0}")]
    Source(String),

    /// The migration cannot run against the current database state.
    #[error("migration error: {0}")]
    Migration(String),
}

impl CatalogError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same statement could succeed.
    pub fn is_storage(&self) -> bool {
        matches!(self, CatalogError::Storage(_))
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => {
                    return CatalogError::Integrity(db_err.message().to_string());
                }
                _ => {}
            }
        }
        CatalogError::Storage(err)
    }
}

impl From<csv::Error> for CatalogError {
    fn from(err: csv::Error) -> Self {
        CatalogError::Source(err.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Source(err.to_string())
    }
}
