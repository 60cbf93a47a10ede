//! Error taxonomy for session operations.
//!
//! "No data yet" is not an error and never appears here; the analyzer
//! reports it with `Option`.

use std::fmt;

#[derive(Debug)]
pub enum SessionError {
    /// Rejected before any collaborator was called (missing subject, bad image).
    InvalidInput(String),

    /// Classifier unreachable, failed to load, or returned nonsense.
    Classifier(anyhow::Error),

    /// Record store unreachable or refused the operation.
    Store(anyhow::Error),

    /// Privileged operation without an authenticated admin gate.
    NotAuthorized,

    /// Operation needs an existing record (e.g. feedback on an empty history).
    NoRecords,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            SessionError::Classifier(err) => write!(f, "Classifier error: {:#}", err),
            SessionError::Store(err) => write!(f, "Store error: {:#}", err),
            SessionError::NotAuthorized => write!(f, "Admin authentication required"),
            SessionError::NoRecords => write!(f, "No records in history"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Classifier(err) | SessionError::Store(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl SessionError {
    /// Blocking errors come from collaborators; the flow halts on them.
    pub fn is_blocking(&self) -> bool {
        matches!(self, SessionError::Classifier(_) | SessionError::Store(_))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
