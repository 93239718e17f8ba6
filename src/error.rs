//! Request-level error taxonomy.
//!
//! Every failure a request can hit ends up as a [`ProcessError`]. Each variant
//! knows its machine-readable `code` and `reason`, which is all the transport
//! layer needs to build the JSON error body:
//!
//! ```text
//! {"code":400,"message":"Missing required param: text","reason":"PARAM_ERROR"}
//! ```
//!
//! | Variant | Code | Reason |
//! |---|---|---|
//! | `Param` | 400 | `PARAM_ERROR` |
//! | `UnknownOperation` | 400 | `UNKNOWN_OPERATION` |
//! | `Decode` | 400 | `DECODE_ERROR` |
//! | `PayloadTooLarge` | 413 | `PAYLOAD_TOO_LARGE` |
//! | `Cancelled` | 499 | `CANCELLED` |
//! | `Backend` | 500 | `BACKEND_ERROR` |
//! | `Internal` | 500 | `INTERNAL_ERROR` |

use crate::imaging::BackendError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{0}")]
    Param(String),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("{0}")]
    Decode(String),
    #[error("image backend failed: {0}")]
    Backend(BackendError),
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("request cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for ProcessError {
    fn from(err: BackendError) -> Self {
        match err {
            // Undecodable source bytes are a client problem, not a backend fault.
            BackendError::Decode(msg) => ProcessError::Decode(msg),
            // so is asking for a result larger than the service produces
            BackendError::TooLarge(msg) => ProcessError::Param(format!("image too large: {msg}")),
            other => ProcessError::Backend(other),
        }
    }
}

impl ProcessError {
    pub fn param(msg: impl Into<String>) -> Self {
        ProcessError::Param(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        ProcessError::Decode(msg.into())
    }

    /// HTTP-style status code for this error.
    pub fn code(&self) -> u16 {
        match self {
            ProcessError::Param(_) | ProcessError::UnknownOperation(_) | ProcessError::Decode(_) => {
                400
            }
            ProcessError::PayloadTooLarge(_) => 413,
            ProcessError::Cancelled => 499,
            ProcessError::Backend(_) | ProcessError::Internal(_) => 500,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ProcessError::Param(_) => "PARAM_ERROR",
            ProcessError::UnknownOperation(_) => "UNKNOWN_OPERATION",
            ProcessError::Decode(_) => "DECODE_ERROR",
            ProcessError::Backend(_) => "BACKEND_ERROR",
            ProcessError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ProcessError::Cancelled => "CANCELLED",
            ProcessError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for failures caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        self.code() < 500
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub code: u16,
    pub message: String,
    pub reason: String,
}

impl From<&ProcessError> for ErrorReply {
    fn from(err: &ProcessError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            reason: err.reason().to_string(),
        }
    }
}
