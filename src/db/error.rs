//! Error types for the database façade.

use thiserror::Error;

/// Failures raised by [`SqlDatabase`](super::SqlDatabase).
///
/// The tool layer is expected to turn every variant into text for the model;
/// none of them are fatal to an agent session.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection string could not be understood.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// Introspection failed (missing table, unreachable database).
    #[error("Schema error: {0}")]
    Schema(String),

    /// A write/DDL keyword was found before the statement reached the database.
    #[error("Query rejected: contains forbidden keyword {keyword}; only read-only queries are allowed")]
    Policy { keyword: &'static str },

    /// The database reported a failure while planning or executing a statement.
    #[error("Query error: {0}")]
    Query(String),
}

impl DbError {
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::Policy { .. })
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
