//! Chat session lifecycle for Parley.
//!
//! This crate keeps exactly one backend connection alive for whoever is
//! currently signed in:
//!
//! 1. **Token acquisition**: asking your backend for a chat token
//!    ([`TokenSupplier`], with [`HttpTokenSupplier`] and
//!    [`CachedTokenSupplier`] ready to use)
//! 2. **Session management**: reacting to identity changes, connecting,
//!    and tearing down stale connections ([`SessionManager`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Channel Layer (above)  ← resolves channels over the live connection
//!     ↕
//! Session Layer (this crate)  ← owns the connection lifecycle
//!     ↕
//! Transport Layer (below)  ← MessagingBackend / BackendConnection
//! ```
//!
//! # Quick example
//!
//! ```rust,ignore
//! let session = SessionManager::new(SessionConfig::default(), tokens, backend).spawn();
//!
//! // Feed every identity change in. Sign-out is `None`.
//! session.observe_identity(Some(Identity::new("u1", "Ada"))).await?;
//!
//! if let SessionState::Ready(conn) = session.settled().await? {
//!     println!("connected as {}", conn.identity().display_name);
//! }
//! ```

#![allow(async_fn_in_trait)]

mod connection;
mod error;
mod http;
mod manager;
mod session;
mod telemetry;
mod token;

pub use connection::{ConnectionHandle, WeakConnectionHandle};
pub use error::{Operation, SessionError, TokenFetchError};
pub use http::{HttpTokenSupplier, TokenEndpointConfig};
pub use manager::{SessionHandle, SessionManager};
pub use session::{Generation, SessionConfig, SessionReport, SessionState};
pub use telemetry::{Telemetry, TracingTelemetry};
pub use token::{CachedTokenSupplier, TokenSupplier};
