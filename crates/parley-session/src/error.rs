//! Error types for the session layer.

use std::fmt;
use std::time::Duration;

/// Why a session token could not be obtained.
///
/// `Clone` because a failed fetch ends up inside
/// [`SessionState::Failed`](crate::SessionState::Failed), which every
/// observer receives a copy of.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenFetchError {
    /// The token endpoint could not be reached, or the connection broke
    /// mid-response.
    #[error("token request failed: {0}")]
    Network(String),

    /// The endpoint refused to issue a token for this identity
    /// (HTTP 401/403).
    #[error("token endpoint refused the identity (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Any other non-success status.
    #[error("token endpoint returned HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// The response arrived but didn't contain a usable token.
    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// The suspension points that are bounded by a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    TokenFetch,
    Connect,
    Disconnect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenFetch => write!(f, "token fetch"),
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Errors that can occur during a session's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No token could be obtained for the identity.
    #[error(transparent)]
    TokenFetch(#[from] TokenFetchError),

    /// The messaging backend rejected the connection or was unreachable.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Closing a connection failed. Only ever logged and sent to
    /// telemetry; the connection counts as released regardless.
    #[error("disconnect failed: {0}")]
    Disconnect(String),

    /// A suspension point exceeded its configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },

    /// The session manager task is gone (all handles dropped or the
    /// runtime shut down).
    #[error("session manager has stopped")]
    Closed,
}

impl SessionError {
    /// Returns `true` if this is a timeout of any operation.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
