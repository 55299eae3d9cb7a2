/// Errors that can occur talking to the messaging backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The backend could not be reached (DNS, TCP, TLS, or WebSocket
    /// upgrade failed).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The backend answered, but said no.
    ///
    /// `code` follows HTTP conventions: 401/403 for a bad token,
    /// 404 for an unknown channel.
    #[error("rejected by backend ({code}): {message}")]
    Rejected { code: u16, message: String },

    /// The connection was closed while we were waiting for a reply.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] parley_protocol::ProtocolError),
}

impl TransportError {
    /// The backend's rejection code, if this is a rejection.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` for 401/403 rejections (bad or expired token).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.code(), Some(401 | 403))
    }
}
