//! Error types for the active record layer.
//!
//! This module defines all error types using `thiserror`. The taxonomy is
//! deliberately small: misconfiguration and missing sessions are reported as
//! their own variants so callers can distinguish "you wired this up wrong"
//! from "the database said no". Not-found is never an error; lookup
//! operations return `None` instead.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ActiveResult<T> = Result<T, ActiveError>;

#[derive(Error, Debug)]
pub enum ActiveError {
    /// The layer was used before it was wired up: no columns mapped, no
    /// primary key declared, or an operation that requires a mapping was
    /// called on a model without one.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// `commit`/`rollback` was invoked with neither an explicit session nor
    /// a resolvable attached session.
    #[error("No session associated with this operation")]
    NoSession,

    /// Connection-level failure: malformed URI, unreachable host, pool
    /// acquire timeout. Propagated from the transport, never retried here.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// Failure surfaced by the database during execution.
    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for a unique constraint violation
        sql_state: Option<String>,
    },

    /// Malformed caller input (bad column name, undecodable value).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl ActiveError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQLSTATE.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// The SQLSTATE code reported by the database, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Whether this error was raised by a uniqueness constraint.
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some("23505")
    }
}

/// Convert sqlx errors, keeping connectivity and execution failures distinct.
impl From<sqlx::Error> for ActiveError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => ActiveError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                ActiveError::database(db_err.message(), code)
            }
            sqlx::Error::PoolTimedOut => {
                ActiveError::connection("connection pool acquire timed out")
            }
            sqlx::Error::PoolClosed => ActiveError::connection("connection pool is closed"),
            sqlx::Error::Io(io_err) => ActiveError::connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => ActiveError::connection(tls_err.to_string()),
            sqlx::Error::ColumnNotFound(col) => {
                ActiveError::invalid_input(format!("column not found: {col}"))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                ActiveError::invalid_input(format!("failed to decode column {index}: {source}"))
            }
            other => ActiveError::database(other.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_detected_from_sql_state() {
        let err = ActiveError::database("duplicate key", Some("23505".to_string()));
        assert!(err.is_unique_violation());

        let err = ActiveError::database("syntax error", Some("42601".to_string()));
        assert!(!err.is_unique_violation());

        assert!(!ActiveError::NoSession.is_unique_violation());
    }

    #[test]
    fn configuration_error_message() {
        let err = ActiveError::configuration("no columns mapped for model");
        assert_eq!(
            err.to_string(),
            "Configuration error: no columns mapped for model"
        );
    }
}
