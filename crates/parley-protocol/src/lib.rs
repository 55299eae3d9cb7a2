//! Shared vocabulary for Parley.
//!
//! This crate defines the values every other layer passes around:
//!
//! - **Types** ([`Identity`], [`SessionToken`], [`ChannelId`],
//!   [`ChannelRef`], [`ChannelInfo`]): who is connecting and to what.
//! - **Frames** ([`ClientFrame`], [`ServerFrame`]): the JSON frames
//!   the WebSocket backend speaks.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): frames to bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames over a socket) → Protocol (this crate) ← Session / Channel
//! ```

mod codec;
mod error;
mod frames;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use frames::{ClientFrame, ServerFrame};
pub use types::{
    ChannelId, ChannelInfo, ChannelRef, Identity, MAX_CHANNEL_ID_LEN,
    SessionToken, UserId,
};
