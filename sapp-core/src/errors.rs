//! Error taxonomy shared by every crate. Each crate-specific error enum
//! additionally implements [`ErrorCode`] so logging call sites can emit a
//! stable machine-readable code alongside the human message, mirroring the
//! upstream `DriftErrorCode` delegation pattern.

use thiserror::Error;

/// A stable, lowercase, dash-separated code identifying an error variant
/// independent of its (potentially parameterized) display message.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

/// Reading an unresolved [`crate::types::placeholder::DbId`] as an integer.
#[derive(Debug, Error)]
#[error("identifier placeholder #{local_id} has not been resolved")]
pub struct UnresolvedIdError {
    pub local_id: u64,
}

impl ErrorCode for UnresolvedIdError {
    fn error_code(&self) -> &'static str {
        "unresolved-id"
    }
}

/// Operator-facing error surfaced to stderr without a backtrace (§7).
#[derive(Debug, Error)]
pub enum UserError {
    #[error("{message}")]
    Message { message: String },
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
}

impl ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            UserError::Message { .. } => "user-error",
            UserError::InvalidArgument { .. } => "invalid-argument",
        }
    }
}
