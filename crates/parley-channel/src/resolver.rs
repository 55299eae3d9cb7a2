//! The channel resolver.

use std::sync::Arc;

use parley_protocol::{ChannelId, ChannelRef, ProtocolError};
use parley_session::{ConnectionHandle, Telemetry, TracingTelemetry};
use parley_transport::{BackendConnection, TransportError};

use crate::{ChannelError, ChannelHandle, ResolverConfig};

/// Turns `(connection, channel id)` into a [`ChannelHandle`].
///
/// Feed it the current connection (from the session's `Ready` state) and
/// the channel id from navigation, every time either might have changed.
/// The resolver only talks to the backend when the pair is different from
/// last time:
///
/// | connection | channel id           | result                               |
/// |------------|----------------------|--------------------------------------|
/// | `None`     | anything             | `Ok(None)`                           |
/// | `Some`     | `None`, empty, blank | `Ok(None)`                           |
/// | `Some`     | malformed            | `Err(InvalidId)`, no request sent    |
/// | released   | valid                | `Err(ConnectionReleased)`            |
/// | same pair as last success | same  | the same handle, no request sent     |
/// | otherwise  | valid                | fetch-or-create over the connection  |
///
/// Failures are never memoized; resolving the same pair again retries.
/// The resolver only borrows connections and never tears one down.
pub struct ChannelResolver<C> {
    config: ResolverConfig,
    telemetry: Arc<dyn Telemetry>,
    /// The last successful resolution.
    last: Option<ChannelHandle<C>>,
}

impl<C: BackendConnection> ChannelResolver<C> {
    /// Creates a resolver that reports to [`TracingTelemetry`].
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            telemetry: Arc::new(TracingTelemetry),
            last: None,
        }
    }

    /// Replaces the telemetry sink.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Resolves a channel, fetching (or creating) it if needed.
    ///
    /// # Errors
    /// See [`ChannelError`]. An error leaves nothing memoized, and any
    /// handle returned earlier stops being valid.
    pub async fn resolve(
        &mut self,
        connection: Option<&ConnectionHandle<C>>,
        channel_id: Option<&str>,
    ) -> Result<Option<ChannelHandle<C>>, ChannelError> {
        let (Some(connection), Some(raw)) = (connection, blank_to_none(channel_id)) else {
            self.forget();
            return Ok(None);
        };

        let result = self.resolve_on(connection, raw).await;
        if let Err(ref error) = result {
            self.forget();
            tracing::warn!(
                connection_id = %connection.id(),
                channel_id = raw,
                error = %error,
                "channel resolution failed"
            );
            self.telemetry.capture("channel", error);
        }
        result.map(Some)
    }

    /// The handle from the last successful resolution, if still valid.
    pub fn current(&self) -> Option<&ChannelHandle<C>> {
        self.last.as_ref().filter(|handle| handle.is_valid())
    }

    async fn resolve_on(
        &mut self,
        connection: &ConnectionHandle<C>,
        raw: &str,
    ) -> Result<ChannelHandle<C>, ChannelError> {
        let id = parse_channel_id(raw)?;

        if !connection.is_live() {
            return Err(ChannelError::ConnectionReleased(connection.id()));
        }

        if let Some(last) = &self.last {
            if last.resolved_on(connection) && *last.channel_id() == id {
                tracing::trace!(cid = last.cid(), "channel unchanged");
                return Ok(last.clone());
            }
        }

        // Inputs changed: whatever we had no longer answers them.
        self.forget();

        let channel = ChannelRef::new(self.config.channel_type.clone(), id);
        let limit = self.config.fetch_timeout;
        let info = match tokio::time::timeout(limit, connection.query_channel(&channel)).await {
            Ok(Ok(info)) => info,
            Ok(Err(TransportError::Rejected { code: 404, .. })) => {
                return Err(ChannelError::NotFound { cid: channel.cid() });
            }
            Ok(Err(_)) if !connection.is_live() => {
                return Err(ChannelError::ConnectionReleased(connection.id()));
            }
            Ok(Err(e)) => return Err(ChannelError::Rejected(e)),
            Err(_) => return Err(ChannelError::Timeout { after: limit }),
        };

        // The session may have moved on while we waited.
        if !connection.is_live() {
            return Err(ChannelError::ConnectionReleased(connection.id()));
        }

        let handle = ChannelHandle::new(connection, channel, info);
        tracing::info!(
            cid = handle.cid(),
            connection_id = %connection.id(),
            created = handle.info().created,
            "channel resolved"
        );
        self.last = Some(handle.clone());
        Ok(handle)
    }

    fn forget(&mut self) {
        if let Some(previous) = self.last.take() {
            previous.retire();
        }
    }
}

fn parse_channel_id(raw: &str) -> Result<ChannelId, ChannelError> {
    ChannelId::new(raw).map_err(|err| match err {
        ProtocolError::InvalidChannelId { id, reason } => ChannelError::InvalidId { id, reason },
        other => {
            tracing::debug!(error = %other, "unexpected channel id error");
            ChannelError::InvalidId {
                id: raw.to_owned(),
                reason: "malformed identifier",
            }
        }
    })
}

/// Treats `None`, `""`, and whitespace-only ids alike: nothing to resolve.
fn blank_to_none(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}
