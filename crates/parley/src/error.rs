//! Unified error type for Parley.

use parley_channel::ChannelError;
use parley_protocol::ProtocolError;
use parley_session::{SessionError, TokenFetchError};
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `parley` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// Bad data: serialization or a malformed identifier.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The messaging backend failed or refused.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The token endpoint failed or refused.
    #[error(transparent)]
    TokenFetch(#[from] TokenFetchError),

    /// The session lifecycle failed (token, connect, timeout, stopped).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A channel could not be resolved.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Transport(_)));
        assert!(parley_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Protocol(_)));
    }

    #[test]
    fn test_from_token_fetch_error() {
        let err = TokenFetchError::Unauthorized { status: 401 };
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::TokenFetch(_)));
    }

    #[test]
    fn test_from_session_error() {
        let parley_err: ParleyError = SessionError::Closed.into();
        assert!(matches!(parley_err, ParleyError::Session(_)));
    }

    #[test]
    fn test_from_channel_error() {
        let err = ChannelError::Timeout {
            after: Duration::from_secs(10),
        };
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Channel(_)));
        assert_eq!(parley_err.to_string(), "channel fetch timed out after 10s");
    }
}
