//! The connection handle: a live backend connection bound to one identity.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parley_protocol::{ChannelInfo, ChannelRef, Identity};
use parley_transport::{BackendConnection, ConnectionId, TransportError};

use crate::{Generation, Operation, SessionError};

const LIVE: u8 = 0;
const DISCONNECTING: u8 = 1;
const RELEASED: u8 = 2;

/// A live connection to the messaging backend.
///
/// The session manager exclusively owns the right to tear a connection
/// down. Everyone else (the channel resolver, UI code) gets a clone of
/// this handle, which can query channels and check liveness but has no
/// way to disconnect.
///
/// Clones are cheap (one `Arc`), and all clones observe the same
/// lifecycle: once the manager releases the connection, `is_live()`
/// turns `false` everywhere.
pub struct ConnectionHandle<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    id: ConnectionId,
    generation: Generation,
    identity: Identity,
    connection: C,
    /// `LIVE` → `DISCONNECTING` → `RELEASED`, never backwards.
    phase: AtomicU8,
}

impl<C: BackendConnection> ConnectionHandle<C> {
    /// Wraps a freshly established connection.
    pub(crate) fn new(
        connection: C,
        generation: Generation,
        identity: Identity,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: connection.id(),
                generation,
                identity,
                connection,
                phase: AtomicU8::new(LIVE),
            }),
        }
    }

    /// Fetches (or creates) a channel over this connection.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] without touching the
    /// backend if the connection has already been released.
    pub async fn query_channel(
        &self,
        channel: &ChannelRef,
    ) -> Result<ChannelInfo, TransportError> {
        if !self.is_live() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} has been released",
                self.inner.id
            )));
        }
        self.inner.connection.query_channel(channel).await
    }

    /// Tears the connection down, at most once per handle.
    ///
    /// Returns `Ok(false)` if another teardown already claimed this
    /// connection. Whatever the outcome, the handle is `RELEASED`
    /// afterwards: a failed or timed-out disconnect is reported to the
    /// caller but never leaves the connection half-owned.
    pub(crate) async fn release(&self, limit: Duration) -> Result<bool, SessionError> {
        if !self.claim() {
            return Ok(false);
        }
        self.disconnect_claimed(limit).await.map(|()| true)
    }

    /// Marks the connection as going away. Only the first caller wins.
    ///
    /// Once claimed, `is_live()` is `false` for every clone, so nothing
    /// new is started on a connection that is about to close.
    pub(crate) fn claim(&self) -> bool {
        self.inner
            .phase
            .compare_exchange(LIVE, DISCONNECTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Disconnects a connection this caller has already claimed.
    pub(crate) async fn disconnect_claimed(&self, limit: Duration) -> Result<(), SessionError> {
        let outcome =
            tokio::time::timeout(limit, self.inner.connection.disconnect()).await;
        self.inner.phase.store(RELEASED, Ordering::Release);

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(
                    connection_id = %self.inner.id,
                    generation = %self.inner.generation,
                    "connection released"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Disconnect(e.to_string())),
            Err(_) => Err(SessionError::Timeout {
                operation: Operation::Disconnect,
                after: limit,
            }),
        }
    }
}

impl<C> ConnectionHandle<C> {
    /// This connection's process-unique id.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// The generation that produced this connection.
    pub fn generation(&self) -> Generation {
        self.inner.generation
    }

    /// The identity the connection is authenticated as.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// `true` until a teardown starts.
    pub fn is_live(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == LIVE
    }

    /// `true` once a teardown has finished (successfully or not).
    pub fn is_released(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == RELEASED
    }

    /// Returns `true` if both handles refer to the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a reference that can check liveness without keeping the
    /// connection alive.
    pub fn downgrade(&self) -> WeakConnectionHandle<C> {
        WeakConnectionHandle {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning [`ConnectionHandle`].
///
/// Once the session manager and every strong handle have let go, the
/// connection is dropped and this reports `is_live() == false`.
pub struct WeakConnectionHandle<C> {
    id: ConnectionId,
    inner: Weak<Inner<C>>,
}

impl<C> WeakConnectionHandle<C> {
    /// The id of the connection this points at, even after it is gone.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// `true` while the connection exists and no teardown has started.
    pub fn is_live(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.phase.load(Ordering::Acquire) == LIVE)
    }

    /// Returns a strong handle if the connection still exists.
    pub fn upgrade(&self) -> Option<ConnectionHandle<C>> {
        self.inner.upgrade().map(|inner| ConnectionHandle { inner })
    }
}

impl<C> Clone for WeakConnectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for WeakConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakConnectionHandle")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

impl<C> Clone for ConnectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("generation", &self.inner.generation)
            .field("user_id", &self.inner.identity.id)
            .field("live", &self.is_live())
            .finish()
    }
}
