//! `ChatClient`: one session plus one channel resolver.
//!
//! This is what a chat screen holds on to. It feeds identity changes to
//! the session manager, resolves the navigational channel id against
//! whatever connection is currently `Ready`, and tears both down together.

use std::sync::Arc;

use parley_channel::{ChannelHandle, ChannelResolver, ResolverConfig};
use parley_protocol::Identity;
use parley_session::{
    Generation, SessionConfig, SessionHandle, SessionManager, SessionReport, SessionState,
    Telemetry, TokenSupplier, TracingTelemetry,
};
use parley_transport::{BackendConnection, MessagingBackend};
use tokio::sync::{broadcast, watch};

use crate::ParleyError;

/// Builder for a [`ChatClient`].
///
/// # Example
///
/// ```rust,ignore
/// use parley::prelude::*;
///
/// let tokens = HttpTokenSupplier::new(TokenEndpointConfig::new(token_url))?;
/// let backend = WebSocketBackend::new(BackendConfig::from_env()?);
///
/// let mut client = ChatClientBuilder::new()
///     .session_config(SessionConfig::default())
///     .build(tokens, backend);
/// ```
pub struct ChatClientBuilder {
    session_config: SessionConfig,
    resolver_config: ResolverConfig,
    telemetry: Arc<dyn Telemetry>,
}

impl ChatClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            resolver_config: ResolverConfig::default(),
            telemetry: Arc::new(TracingTelemetry),
        }
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the channel resolver configuration.
    pub fn resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver_config = config;
        self
    }

    /// Sets the telemetry sink shared by the session and the resolver.
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Spawns the session manager and returns the client.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn build<S, B>(self, supplier: S, backend: B) -> ChatClient<B::Connection>
    where
        S: TokenSupplier,
        B: MessagingBackend,
    {
        let session = SessionManager::new(self.session_config, supplier, backend)
            .with_telemetry(Arc::clone(&self.telemetry))
            .spawn();
        let resolver =
            ChannelResolver::new(self.resolver_config).with_telemetry(self.telemetry);

        ChatClient { session, resolver }
    }
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A chat session and the channel currently open in it.
pub struct ChatClient<C> {
    session: SessionHandle<C>,
    resolver: ChannelResolver<C>,
}

impl<C: BackendConnection> ChatClient<C> {
    /// Forwards an identity snapshot to the session manager.
    pub async fn observe_identity(
        &self,
        identity: Option<Identity>,
    ) -> Result<Generation, ParleyError> {
        Ok(self.session.observe_identity(identity).await?)
    }

    /// Returns a snapshot of the session state.
    pub fn state(&self) -> SessionState<C> {
        self.session.state()
    }

    /// Waits for the session to settle. See [`SessionHandle::settled`].
    pub async fn settled(&self) -> Result<SessionState<C>, ParleyError> {
        Ok(self.session.settled().await?)
    }

    /// Resolves `channel_id` against the current connection.
    ///
    /// Returns `Ok(None)` while the session isn't `Ready` or when the id
    /// is absent or blank. Call it again whenever the navigation's
    /// channel id or the session state changes; unchanged inputs don't
    /// hit the backend.
    ///
    /// # Errors
    /// [`ParleyError::Channel`] if the channel can't be resolved. The
    /// session is unaffected.
    pub async fn select_channel(
        &mut self,
        channel_id: Option<&str>,
    ) -> Result<Option<ChannelHandle<C>>, ParleyError> {
        let connection = self.session.connection();
        Ok(self.resolver.resolve(connection.as_ref(), channel_id).await?)
    }

    /// The channel from the last successful [`select_channel`](Self::select_channel),
    /// if it's still valid.
    pub fn current_channel(&self) -> Option<&ChannelHandle<C>> {
        self.resolver.current()
    }

    /// Drops the current channel and shuts the session down.
    ///
    /// Idempotent. The client can be signed in again afterwards.
    pub async fn shutdown(&mut self) -> Result<(), ParleyError> {
        self.resolver.resolve(None, None).await?;
        self.session.shutdown().await?;
        tracing::debug!("chat client shut down");
        Ok(())
    }

    /// Subscribes to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState<C>> {
        self.session.subscribe()
    }

    /// Subscribes to session failures. See [`SessionHandle::subscribe_errors`].
    pub fn subscribe_errors(&self) -> broadcast::Receiver<SessionReport> {
        self.session.subscribe_errors()
    }

    /// The underlying session handle, for sharing with other tasks.
    pub fn session(&self) -> &SessionHandle<C> {
        &self.session
    }
}
