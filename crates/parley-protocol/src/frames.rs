//! Wire frames exchanged with the messaging backend.
//!
//! Every frame is a JSON object with a `type` tag:
//!
//! ```text
//! client → backend   {"type":"connect","api_key":..,"user":{..},"token":..}
//! backend → client   {"type":"connected","connection_id":"c-91"}
//! client → backend   {"type":"query_channel","request_id":"..","channel":{"type":"messaging","id":"general"}}
//! backend → client   {"type":"channel_state","request_id":"..","channel":{"cid":"messaging:general",..}}
//! backend → client   {"type":"error","request_id":null,"code":401,"message":"token expired"}
//! ```
//!
//! Only connection establishment, teardown, and channel lookup are
//! modelled here. Message traffic rides on other frame types that this
//! layer skips.

use serde::{Deserialize, Serialize};

use crate::{ChannelInfo, ChannelRef, Identity, SessionToken};

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Opens a session for `user`, authorized by `token`.
    Connect {
        api_key: String,
        user: Identity,
        token: SessionToken,
    },

    /// Fetches a channel, creating it if it doesn't exist yet.
    QueryChannel {
        request_id: String,
        channel: ChannelRef,
    },

    /// Politely ends the session before the socket closes.
    Disconnect,
}

/// Frames the backend sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// The `connect` frame was accepted.
    Connected { connection_id: String },

    /// Reply to `query_channel`.
    ChannelState {
        request_id: String,
        channel: ChannelInfo,
    },

    /// Something was rejected. `request_id` is set when the error answers
    /// a specific request and absent for connection-level errors.
    ///
    /// `code` follows HTTP conventions: 401/403 for auth, 404 for an
    /// unknown channel.
    Error {
        #[serde(default)]
        request_id: Option<String>,
        code: u16,
        message: String,
    },

    /// Keep-alive from the backend; carries nothing.
    HealthCheck,
}
