//! Core data types shared by every Parley layer.
//!
//! These are the values that cross crate boundaries: who the user is
//! ([`Identity`]), what proves it to the backend ([`SessionToken`]),
//! and which conversation we want ([`ChannelId`], [`ChannelRef`]).

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The identity provider's id for a user.
///
/// A newtype around `String` so a user id can't be mixed up with a
/// channel id or a token, even though all three are strings underneath.
/// `#[serde(transparent)]` keeps the wire form a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// The authenticated user's profile, as supplied by the identity provider.
///
/// Parley never owns an identity. Every reaction reads a snapshot and
/// the provider may replace it (or withdraw it) at any time.
///
/// The serde renames produce the shape the messaging backend expects
/// when a user connects: `{"id": .., "name": .., "image": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id from the identity provider.
    pub id: UserId,

    /// Human-readable name shown to other chat members.
    #[serde(rename = "name")]
    pub display_name: String,

    /// Profile picture, if the user has one.
    #[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Creates an identity without an avatar.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    /// Sets the avatar URL.
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// A short-lived credential that authorizes one connection for one user.
///
/// The value is opaque to Parley. `Debug` is implemented by hand so the
/// secret never ends up in a log line: `tracing::debug!(?token)` prints
/// `SessionToken(<redacted>)`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw token, for handing to the backend.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Channel types
// ---------------------------------------------------------------------------

/// Longest channel id the backend accepts.
pub const MAX_CHANNEL_ID_LEN: usize = 64;

/// A validated channel identifier, e.g. `general`.
///
/// Channel ids usually come straight from navigation state (a `channel`
/// query parameter), so they are untrusted input. Construction goes
/// through [`ChannelId::new`], which rejects anything the backend would
/// refuse anyway: empty strings, more than 64 characters, or characters
/// outside `[A-Za-z0-9_-!]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidChannelId`] when the id is empty,
    /// too long, or contains a disallowed character.
    pub fn new(raw: impl Into<String>) -> Result<Self, ProtocolError> {
        let raw = raw.into();
        let reason = if raw.is_empty() {
            Some("must not be empty")
        } else if raw.chars().count() > MAX_CHANNEL_ID_LEN {
            Some("must be at most 64 characters")
        } else if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '!'))
        {
            Some("may only contain letters, digits, '_', '-' and '!'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ProtocolError::InvalidChannelId { id: raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully qualified channel address: the channel type plus its id.
///
/// Backends group channels by type (`messaging`, `livestream`, ...).
/// The pair is rendered as a "cid", `type:id`, which is how the backend
/// refers to a channel in its replies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Channel type, e.g. `messaging`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Channel id within that type.
    pub id: ChannelId,
}

impl ChannelRef {
    /// Builds a reference from a type and an already-validated id.
    pub fn new(kind: impl Into<String>, id: ChannelId) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Returns the `type:id` form.
    pub fn cid(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// What the backend tells us about a channel after we ask for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// The channel's `type:id`.
    pub cid: String,

    /// How many members the channel has.
    #[serde(default)]
    pub member_count: u32,

    /// `true` if this query created the channel.
    #[serde(default)]
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Identity
    // =====================================================================

    #[test]
    fn test_identity_serializes_with_backend_field_names() {
        let identity = Identity::new("u1", "Ada Lovelace")
            .with_avatar("https://img.example/ada.png");

        let json = serde_json::to_value(&identity).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": "u1",
                "name": "Ada Lovelace",
                "image": "https://img.example/ada.png",
            })
        );
    }

    #[test]
    fn test_identity_without_avatar_omits_image() {
        let json = serde_json::to_value(Identity::new("u2", "Bob")).unwrap();
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_identities_differing_only_in_name_are_not_equal() {
        // A profile edit is an identity change as far as the session
        // layer is concerned: the backend caches the connected profile.
        assert_ne!(Identity::new("u1", "Ada"), Identity::new("u1", "Ada L."));
    }

    // =====================================================================
    // SessionToken
    // =====================================================================

    #[test]
    fn test_session_token_debug_is_redacted() {
        let token = SessionToken::new("super-secret");
        let printed = format!("{token:?}");
        assert!(!printed.contains("super-secret"));
        assert_eq!(token.expose(), "super-secret");
    }

    // =====================================================================
    // ChannelId
    // =====================================================================

    #[test]
    fn test_channel_id_accepts_typical_ids() {
        for raw in ["general", "team-42", "a_b", "!members-u1-u2"] {
            assert!(ChannelId::new(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn test_channel_id_rejects_empty() {
        assert!(matches!(
            ChannelId::new(""),
            Err(ProtocolError::InvalidChannelId { .. })
        ));
    }

    #[test]
    fn test_channel_id_rejects_disallowed_characters() {
        for raw in ["general chat", "a/b", "x:y", "ünïcode"] {
            assert!(ChannelId::new(raw).is_err(), "{raw} should be invalid");
        }
    }

    #[test]
    fn test_channel_id_rejects_overlong() {
        let raw = "a".repeat(MAX_CHANNEL_ID_LEN + 1);
        assert!(ChannelId::new(raw).is_err());
        assert!(ChannelId::new("a".repeat(MAX_CHANNEL_ID_LEN)).is_ok());
    }

    #[test]
    fn test_channel_id_deserialize_validates() {
        let bad: Result<ChannelId, _> = serde_json::from_str(r#""no spaces""#);
        assert!(bad.is_err());

        let good: ChannelId = serde_json::from_str(r#""general""#).unwrap();
        assert_eq!(good.as_str(), "general");
    }

    // =====================================================================
    // ChannelRef
    // =====================================================================

    #[test]
    fn test_channel_ref_cid_joins_type_and_id() {
        let channel = ChannelRef::new("messaging", ChannelId::new("general").unwrap());
        assert_eq!(channel.cid(), "messaging:general");
        assert_eq!(channel.to_string(), "messaging:general");
    }
}
