//! The channel handle: a resolved channel on one connection.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_protocol::{ChannelId, ChannelInfo, ChannelRef};
use parley_session::{ConnectionHandle, WeakConnectionHandle};
use parley_transport::ConnectionId;

/// A channel resolved over a specific connection.
///
/// A handle is valid only while both of these hold:
///
/// - the connection it was resolved on is still live, and
/// - the resolver hasn't since moved on to a different channel id or a
///   different connection.
///
/// Check [`is_valid()`](Self::is_valid) before acting on a handle you
/// held onto. A handle doesn't keep its connection alive: once the
/// session has torn it down and let go, the connection is dropped even
/// if handles to it remain.
pub struct ChannelHandle<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    connection: WeakConnectionHandle<C>,
    channel: ChannelRef,
    info: ChannelInfo,
    retired: AtomicBool,
}

impl<C> ChannelHandle<C> {
    pub(crate) fn new(
        connection: &ConnectionHandle<C>,
        channel: ChannelRef,
        info: ChannelInfo,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection: connection.downgrade(),
                channel,
                info,
                retired: AtomicBool::new(false),
            }),
        }
    }

    /// The backend's channel id, `type:id`.
    pub fn cid(&self) -> &str {
        &self.inner.info.cid
    }

    /// The id this handle was resolved from.
    pub fn channel_id(&self) -> &ChannelId {
        &self.inner.channel.id
    }

    /// The type and id this handle was resolved for.
    pub fn channel(&self) -> &ChannelRef {
        &self.inner.channel
    }

    /// What the backend reported when the channel was resolved.
    pub fn info(&self) -> &ChannelInfo {
        &self.inner.info
    }

    /// The connection this channel is scoped to.
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection.id()
    }

    /// `true` while the connection is live and the resolver still points
    /// at this channel.
    pub fn is_valid(&self) -> bool {
        !self.inner.retired.load(Ordering::Acquire) && self.inner.connection.is_live()
    }

    /// Returns `true` if both handles came from the same resolution.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn resolved_on(&self, connection: &ConnectionHandle<C>) -> bool {
        self.inner.connection.id() == connection.id()
    }

    pub(crate) fn retire(&self) {
        self.inner.retired.store(true, Ordering::Release);
    }
}

impl<C> Clone for ChannelHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for ChannelHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("cid", &self.inner.info.cid)
            .field("connection_id", &self.connection_id())
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl<C> fmt::Display for ChannelHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.inner.info.cid, self.connection_id())
    }
}
