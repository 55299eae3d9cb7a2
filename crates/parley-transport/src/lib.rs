//! Messaging backend abstraction for Parley.
//!
//! Provides the [`MessagingBackend`] and [`BackendConnection`] traits that
//! the session layer drives, so the backend can be a real WebSocket
//! service in production and an in-memory fake in tests.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketBackend`] via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{BackendConfig, WebSocketBackend, WebSocketConnection};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parley_protocol::{ChannelInfo, ChannelRef, Identity, SessionToken};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identifier for a backend connection.
///
/// Two connections never share an id, even if they belong to the same
/// user, so the id is what callers compare to tell connections apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next unused id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens connections to the messaging backend.
pub trait MessagingBackend: Send + Sync + 'static {
    /// The connection type produced by this backend.
    type Connection: BackendConnection;

    /// Connects as `identity`, authorized by `token`.
    ///
    /// # Errors
    /// - [`TransportError::ConnectFailed`]: backend unreachable
    /// - [`TransportError::Rejected`]: backend refused the token or user
    fn connect(
        &self,
        identity: &Identity,
        token: &SessionToken,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A live, authenticated connection to the messaging backend.
pub trait BackendConnection: Send + Sync + 'static {
    /// Fetches `channel`, creating it if the backend allows that.
    fn query_channel(
        &self,
        channel: &ChannelRef,
    ) -> impl Future<Output = Result<ChannelInfo, TransportError>> + Send;

    /// Ends the session and closes the connection.
    ///
    /// Callers invoke this at most once per connection.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
