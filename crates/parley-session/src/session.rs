//! Session types: configuration, generations, and the lifecycle state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConnectionHandle, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the session manager.
///
/// Every suspension point gets its own bound. Override just the fields
/// you care about with struct update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use parley_session::SessionConfig;
///
/// let config = SessionConfig {
///     connect_timeout: Duration::from_secs(3),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.token_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on a token fetch. Default: 10 seconds.
    pub token_timeout: Duration,

    /// Upper bound on establishing a connection. Default: 10 seconds.
    pub connect_timeout: Duration,

    /// Upper bound on a teardown. Default: 5 seconds. A teardown that
    /// runs over is logged and the connection counts as released.
    pub disconnect_timeout: Duration,

    /// Capacity of the command channel between handles and the manager
    /// task. Default: 64.
    pub command_buffer: usize,

    /// How many unread error reports a slow subscriber may lag behind
    /// before it starts missing some. Default: 16.
    pub error_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(5),
            command_buffer: 64,
            error_buffer: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Tags one identity-triggered lifecycle attempt.
///
/// Every identity change mints the next generation. Asynchronous results
/// carry the generation they were started under, and a result whose
/// generation is no longer the latest is never allowed to change state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct Generation(pub u64);

impl Generation {
    /// Returns the generation after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the session currently is.
///
/// ```text
///            observe(Some)          token ok             connected
///   Idle ───────────────→ Acquiring ─────────→ Connecting ─────────→ Ready
///    ↑                        │                     │
///    │                        └──────→ Failed ←─────┘
///    │                       (error or timeout, current generation only)
///    │
///    └──── Disconnecting ←── shutdown() while Ready
/// ```
///
/// `observe(None)` from any state goes straight to `Idle`; the old
/// connection is torn down in the background.
pub enum SessionState<C> {
    /// No identity, no connection.
    Idle,
    /// Waiting for a token.
    Acquiring,
    /// Token in hand, waiting for the backend to accept the connection.
    Connecting,
    /// Connected. The handle is the live connection.
    Ready(ConnectionHandle<C>),
    /// The latest attempt failed. Nothing is retried automatically.
    Failed(SessionError),
    /// `shutdown()` is closing the current connection.
    Disconnecting,
}

impl<C> SessionState<C> {
    /// Returns `true` once no operation is pending for the current
    /// generation: `Idle`, `Ready`, or `Failed`.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Ready(_) | Self::Failed(_))
    }

    /// The live connection, if `Ready`.
    pub fn connection(&self) -> Option<&ConnectionHandle<C>> {
        match self {
            Self::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    /// The failure, if `Failed`.
    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Short name of the variant, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Acquiring => "Acquiring",
            Self::Connecting => "Connecting",
            Self::Ready(_) => "Ready",
            Self::Failed(_) => "Failed",
            Self::Disconnecting => "Disconnecting",
        }
    }
}

// Written by hand: a derive would demand `C: Clone` / `C: Debug`, but the
// connection sits behind an `Arc` inside the handle.
impl<C> Clone for SessionState<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Acquiring => Self::Acquiring,
            Self::Connecting => Self::Connecting,
            Self::Ready(handle) => Self::Ready(handle.clone()),
            Self::Failed(error) => Self::Failed(error.clone()),
            Self::Disconnecting => Self::Disconnecting,
        }
    }
}

impl<C> fmt::Debug for SessionState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(handle) => f.debug_tuple("Ready").field(handle).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            other => f.write_str(other.name()),
        }
    }
}

impl<C> fmt::Display for SessionState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(handle) => write!(f, "Ready({})", handle.id()),
            Self::Failed(error) => write!(f, "Failed({error})"),
            other => f.write_str(other.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionReport
// ---------------------------------------------------------------------------

/// An error published on the session's error channel.
///
/// Only failures of the generation that was current when they arrived are
/// published; superseded failures are dropped silently.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// The attempt that failed.
    pub generation: Generation,
    /// What went wrong.
    pub error: SessionError,
}
