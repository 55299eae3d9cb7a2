//! # Parley
//!
//! Race-free chat session lifecycle for realtime messaging backends.
//!
//! Parley keeps exactly one backend connection alive for whoever is
//! signed in, no matter how quickly sign-ins and sign-outs arrive, and
//! resolves the channel a user navigated to over that connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn run(tokens: HttpTokenSupplier, backend: WebSocketBackend) -> Result<(), ParleyError> {
//! let mut client = ChatClientBuilder::new().build(tokens, backend);
//!
//! client.observe_identity(Some(Identity::new("u1", "Ada"))).await?;
//! client.settled().await?;
//!
//! if let Some(channel) = client.select_channel(Some("general")).await? {
//!     println!("joined {}", channel.cid());
//! }
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{ChatClient, ChatClientBuilder};
pub use error::ParleyError;

/// Convenient re-exports for common usage.
///
/// ```rust
/// use parley::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{ChatClient, ChatClientBuilder, ParleyError};

    pub use parley_channel::{ChannelError, ChannelHandle, ChannelResolver, ResolverConfig};
    pub use parley_protocol::{ChannelId, ChannelInfo, ChannelRef, Identity, SessionToken, UserId};
    pub use parley_session::{
        CachedTokenSupplier, ConnectionHandle, Generation, HttpTokenSupplier, SessionConfig,
        SessionError, SessionHandle, SessionManager, SessionReport, SessionState, Telemetry,
        TokenEndpointConfig, TokenFetchError, TokenSupplier, TracingTelemetry, WeakConnectionHandle,
    };
    pub use parley_transport::{
        BackendConfig, BackendConnection, ConnectionId, MessagingBackend, TransportError,
        WebSocketBackend,
    };
}
