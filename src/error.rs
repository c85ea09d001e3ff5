use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Every [`crate::Coordinator`] operation resolves to success or exactly one
/// of these kinds; nothing else crosses the boundary.
#[derive(Debug, Error)]
pub enum CoordError {
    /// Missing or malformed input. Message is safe to show the caller.
    #[error("{0}")]
    Validation(String),
    /// No matching entity (including an invalid session id).
    #[error("{0}")]
    NotFound(String),
    /// Duplicate name/slot, already-friends, already-member and friends.
    #[error("{0}")]
    Conflict(String),
    /// More than one match on a uniqueness-guaranteed field. Fatal: logged,
    /// never surfaced to the caller in detail.
    #[error("{0}")]
    Consistency(String),
    /// A declared but deliberately unbuilt operation was invoked.
    #[error("{0}")]
    Unimplemented(String),
    /// Underlying document store failure.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Consistency,
    Unimplemented,
    Store,
}

impl CoordError {
    /// Build a consistency violation, logging it at the point of detection.
    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(%message, "consistency violation");
        Self::Consistency(message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::Unimplemented(_) => ErrorKind::Unimplemented,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Internal kinds hide their detail behind a generic message; the rest
    /// carry no sensitive content and surface verbatim.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            "Unexpected server error".into()
        } else {
            self.to_string()
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Consistency(_) | Self::Store(_))
    }
}

pub type CoordResult<T> = Result<T, CoordError>;
