//! Error taxonomy for the twin ingestion core.
//!
//! Every capability trait (registry, state log, cache, broker, identity)
//! returns `Result<_, Error>` so the façade and the dispatcher can switch on
//! `kind()` without downcasting.

use thiserror::Error;

/// The error kinds a re-implementer's façade maps onto transport-specific
/// responses (HTTP status codes, gRPC codes, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    NotFound,
    Conflict,
    Malformed,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("caller could not be identified: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth(_) => ErrorKind::Auth,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Malformed(_) => ErrorKind::Malformed,
            Error::Transient(_) => ErrorKind::Transient,
            Error::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Transient(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(err: bincode::error::EncodeError) -> Self {
        Error::Fatal(format!("failed to encode record: {err}"))
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(err: bincode::error::DecodeError) -> Self {
        Error::Fatal(format!("failed to decode record: {err}"))
    }
}
