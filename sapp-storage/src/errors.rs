//! Error taxonomy for schema setup, primary-key reservation and the bulk
//! persistence engine (§4.5, §4.6, §9 "Dialect abstraction").

use sapp_core::errors::{ErrorCode, UnresolvedIdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseOperationalError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },
}

impl ErrorCode for DatabaseOperationalError {
    fn error_code(&self) -> &'static str {
        "database-operational-error"
    }
}

impl From<rusqlite::Error> for DatabaseOperationalError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite { message: e.to_string() }
    }
}

/// Primary-key reservation failures (§4.5).
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("failed to lock primary_keys row for {table_name} after {retries} retries")]
    LockFailed {
        table_name: String,
        retries: u32,
        #[source]
        source: DatabaseOperationalError,
    },
    #[error("requested id range for {table_name} exceeds the allowed range")]
    RangeExhausted { table_name: String },
}

impl ErrorCode for ReservationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::LockFailed { .. } => "reservation-lock-failed",
            Self::RangeExhausted { .. } => "reservation-range-exhausted",
        }
    }
}

/// Raised when rows remain unresolved after the post-insert re-merge pass
/// (§4.6.2) — the engine's strongest consistency check.
#[derive(Debug, Error)]
#[error("{unsaved_count} unsaved {table_name} records remain after re-merge")]
pub struct ConsistencyError {
    pub table_name: String,
    pub unsaved_count: usize,
}

impl ErrorCode for ConsistencyError {
    fn error_code(&self) -> &'static str {
        "consistency-error"
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Operational(#[from] DatabaseOperationalError),
    #[error(transparent)]
    Reservation(#[from] ReservationError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    UnresolvedId(#[from] UnresolvedIdError),
}

impl From<rusqlite::Error> for PersistError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Operational(e.into())
    }
}

impl ErrorCode for PersistError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Operational(e) => e.error_code(),
            Self::Reservation(e) => e.error_code(),
            Self::Consistency(e) => e.error_code(),
            Self::UnresolvedId(e) => e.error_code(),
        }
    }
}
