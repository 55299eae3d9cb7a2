//! Channel resolution for Parley.
//!
//! Once the session is `Ready`, the UI wants a concrete conversation: the
//! channel named by the current route or query string. This crate turns
//! that optional, user-supplied id into a [`ChannelHandle`] scoped to the
//! live connection, and keeps it in step as either input changes.
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← passes the connection + navigation's channel id
//!     ↕
//! Channel Layer (this crate)  ← ChannelResolver, ChannelHandle
//!     ↕
//! Session Layer (below)  ← provides the live ConnectionHandle
//! ```
//!
//! # Quick example
//!
//! ```rust,ignore
//! let mut resolver = ChannelResolver::new(ResolverConfig::default());
//!
//! let conn = session.connection();
//! match resolver.resolve(conn.as_ref(), query.get("channel")).await {
//!     Ok(Some(channel)) => render_channel(&channel),
//!     Ok(None) => render_channel_list(),
//!     Err(e) => show_error(&e),
//! }
//! ```

mod config;
mod error;
mod handle;
mod resolver;

pub use config::ResolverConfig;
pub use error::ChannelError;
pub use handle::ChannelHandle;
pub use resolver::ChannelResolver;
