//! The errors a session can run into, and the coarse kinds the operator
//! cares about.

use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

/// The broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A file is missing. Usually recovered through a fallback.
    NotFound,
    /// A caller passed an unusable argument.
    InvalidArgument,
    /// A phase change was requested that the workflow does not allow.
    InvalidPhaseArgument,
    /// A record is present but fails its validity check.
    InvalidDataState,
    /// The file system refused a read or write.
    IoFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why a session operation failed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A value passed in is unusable, like an unknown user or bad settings.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Always a bug in the caller.
    #[error("invalid phase argument: {0}")]
    InvalidPhaseArgument(String),

    /// Fatal to the operation that needed the record, not to the process.
    #[error("invalid data: {0}")]
    InvalidDataState(String),

    /// Reading or writing the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// The broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SessionError::InvalidPhaseArgument(_) => ErrorKind::InvalidPhaseArgument,
            SessionError::InvalidDataState(_) => ErrorKind::InvalidDataState,
            SessionError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            SessionError::Store(StoreError::InvalidArgument(_)) => ErrorKind::InvalidArgument,
            SessionError::Store(StoreError::Io { .. }) => ErrorKind::IoFailure,
            SessionError::Store(StoreError::Json { .. } | StoreError::EmptyEnvelope(_)) => {
                ErrorKind::InvalidDataState
            }
        }
    }
}
