//! Error types for channel resolution.

use std::time::Duration;

use parley_transport::{ConnectionId, TransportError};

/// Why a channel could not be resolved.
///
/// These never touch the session state: a bad channel link leaves the
/// connection exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The identifier can't name a channel. No request was sent.
    #[error("invalid channel id {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },

    /// The backend has no such channel and wouldn't create it.
    #[error("channel {cid} not found")]
    NotFound { cid: String },

    /// The backend refused the request or the connection failed mid-way.
    #[error("channel request rejected: {0}")]
    Rejected(#[source] TransportError),

    /// The channel fetch ran past its bound.
    #[error("channel fetch timed out after {after:?}")]
    Timeout { after: Duration },

    /// The connection was torn down before (or while) resolving.
    #[error("connection {0} has been released")]
    ConnectionReleased(ConnectionId),
}

impl ChannelError {
    /// Returns `true` if retrying with the same inputs can't succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InvalidId { .. } | Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_permanent() {
        assert!(ChannelError::NotFound { cid: "messaging:x".into() }.is_permanent());
        assert!(!ChannelError::Timeout { after: Duration::from_secs(1) }.is_permanent());
        assert!(!ChannelError::ConnectionReleased(ConnectionId::new(3)).is_permanent());
    }

    #[test]
    fn test_display_names_the_connection() {
        let err = ChannelError::ConnectionReleased(ConnectionId::new(7));
        assert_eq!(err.to_string(), "connection conn-7 has been released");
    }
}
