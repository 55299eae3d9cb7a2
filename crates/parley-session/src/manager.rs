//! The session manager: one connection per identity, race-free.
//!
//! The manager runs as its own Tokio task (the same actor model the rest
//! of Parley uses). Its state (current generation, current identity,
//! active connection) is touched only from inside that task. Everything
//! else talks to it through a [`SessionHandle`]:
//!
//! ```text
//!   SessionHandle ──SessionCommand──→ ┌──────────────┐ ──watch──→ SessionState
//!                                     │ SessionActor │ ──broadcast──→ SessionReport
//!   token / connect tasks ──Attempt──→└──────────────┘ ──spawn──→ teardown tasks
//! ```
//!
//! # Generations
//!
//! Token fetches and connects can't be aborted once started, and they
//! finish in whatever order the network decides. So every identity
//! change mints a new [`Generation`], every spawned attempt carries the
//! generation it belongs to, and the actor compares it against the
//! current one when the result comes back:
//!
//! - current → the result may change state;
//! - superseded → the result is dropped, and if it produced a connection
//!   that connection is torn down on arrival without ever being `Ready`.

use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Identity, SessionToken};
use parley_transport::{BackendConnection, MessagingBackend};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{
    ConnectionHandle, Generation, Operation, SessionConfig, SessionError,
    SessionReport, SessionState, Telemetry, TokenSupplier, TracingTelemetry,
};

/// Requests from handles to the actor.
enum SessionCommand {
    Observe {
        identity: Option<Identity>,
        reply: oneshot::Sender<Generation>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results reported back by the tasks the actor spawned.
enum Attempt<C> {
    TokenFetched {
        generation: Generation,
        identity: Identity,
        result: Result<SessionToken, SessionError>,
    },
    Connected {
        generation: Generation,
        identity: Identity,
        result: Result<C, SessionError>,
    },
}

// ---------------------------------------------------------------------------
// SessionManager (builder)
// ---------------------------------------------------------------------------

/// Builds and starts a session manager.
///
/// ```rust,ignore
/// let session = SessionManager::new(SessionConfig::default(), tokens, backend)
///     .with_telemetry(Arc::new(MySentrySink))
///     .spawn();
///
/// session.observe_identity(Some(user)).await?;
/// let state = session.settled().await?;
/// ```
pub struct SessionManager<S, B> {
    config: SessionConfig,
    supplier: S,
    backend: B,
    telemetry: Arc<dyn Telemetry>,
}

impl<S: TokenSupplier, B: MessagingBackend> SessionManager<S, B> {
    /// Creates a manager that reports to [`TracingTelemetry`].
    pub fn new(config: SessionConfig, supplier: S, backend: B) -> Self {
        Self {
            config,
            supplier,
            backend,
            telemetry: Arc::new(TracingTelemetry),
        }
    }

    /// Replaces the telemetry sink.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Spawns the manager task and returns a handle to it.
    ///
    /// The task stops once every [`SessionHandle`] clone is dropped,
    /// tearing down whatever connection it still holds. A connection that
    /// an attempt still in flight produces later is torn down on arrival.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self) -> SessionHandle<B::Connection> {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (generation_tx, generation_rx) = watch::channel(Generation::default());
        let (errors_tx, _) = broadcast::channel(self.config.error_buffer.max(1));

        let actor = SessionActor {
            config: self.config,
            supplier: Arc::new(self.supplier),
            backend: Arc::new(self.backend),
            telemetry: self.telemetry,
            generation: Generation::default(),
            identity: None,
            active: None,
            state_tx,
            generation_tx,
            errors_tx: errors_tx.clone(),
            commands: command_rx,
            attempt_tx,
            attempts: attempt_rx,
        };

        tokio::spawn(actor.run());

        SessionHandle {
            commands: command_tx,
            state: state_rx,
            generation: generation_rx,
            errors: errors_tx,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session manager.
///
/// Cheap to clone; every clone talks to the same manager.
pub struct SessionHandle<C> {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState<C>>,
    generation: watch::Receiver<Generation>,
    errors: broadcast::Sender<SessionReport>,
}

impl<C> Clone for SessionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: self.state.clone(),
            generation: self.generation.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> SessionHandle<C> {
    /// Tells the manager the identity provider's current snapshot.
    ///
    /// Call this on every authentication change, including sign-out
    /// (`None`). Returns once the manager has applied the observation, so
    /// [`state()`](Self::state) already reflects it (`Acquiring` or
    /// `Idle`). The connection itself arrives later.
    ///
    /// Observing the same identity again while its attempt is pending or
    /// `Ready` is a no-op that returns the current generation. After a
    /// failure it starts a fresh attempt, which is how callers retry.
    ///
    /// # Errors
    /// [`SessionError::Closed`] if the manager task is gone.
    pub async fn observe_identity(
        &self,
        identity: Option<Identity>,
    ) -> Result<Generation, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Observe { identity, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Tears down any active or in-flight connection and returns to
    /// `Idle`. Safe to call any number of times.
    ///
    /// Resolves after the teardown has completed (or failed, or timed
    /// out; all three end in `Idle`).
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Shutdown { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Returns a snapshot of the current state. Never blocks.
    pub fn state(&self) -> SessionState<C> {
        self.state.borrow().clone()
    }

    /// The latest generation the manager has minted.
    pub fn generation(&self) -> Generation {
        *self.generation.borrow()
    }

    /// The live connection, if the session is `Ready`.
    pub fn connection(&self) -> Option<ConnectionHandle<C>> {
        self.state.borrow().connection().cloned()
    }

    /// Waits until the current generation has nothing pending and returns
    /// the state it settled in (`Idle`, `Ready`, or `Failed`).
    pub async fn settled(&self) -> Result<SessionState<C>, SessionError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(SessionState::is_settled)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(state.clone())
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState<C>> {
        self.state.clone()
    }

    /// Subscribes to failures of the current generation.
    ///
    /// Token and connect failures are published here as they happen, for
    /// UI error display. Reports sent before subscribing are not replayed.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<SessionReport> {
        self.errors.subscribe()
    }
}

// ---------------------------------------------------------------------------
// SessionActor
// ---------------------------------------------------------------------------

/// The manager's private state. Lives inside the spawned task.
struct SessionActor<S, B: MessagingBackend> {
    config: SessionConfig,
    supplier: Arc<S>,
    backend: Arc<B>,
    telemetry: Arc<dyn Telemetry>,

    /// Latest generation minted. Only ever increases.
    generation: Generation,
    /// Identity of the latest generation (`None` = signed out).
    identity: Option<Identity>,
    /// The one non-terminated connection this manager owns, if any.
    active: Option<ConnectionHandle<B::Connection>>,

    state_tx: watch::Sender<SessionState<B::Connection>>,
    generation_tx: watch::Sender<Generation>,
    errors_tx: broadcast::Sender<SessionReport>,
    commands: mpsc::Receiver<SessionCommand>,
    attempt_tx: mpsc::UnboundedSender<Attempt<B::Connection>>,
    attempts: mpsc::UnboundedReceiver<Attempt<B::Connection>>,
}

impl<S: TokenSupplier, B: MessagingBackend> SessionActor<S, B> {
    async fn run(mut self) {
        tracing::debug!("session manager started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Observe { identity, reply }) => {
                        let _ = reply.send(self.observe(identity));
                    }
                    Some(SessionCommand::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                    }
                    None => break,
                },
                Some(attempt) = self.attempts.recv() => self.handle_attempt(attempt),
            }
        }

        // Every handle is gone; nobody can observe this session again.
        self.shutdown().await;
        self.drain_attempts().await;
        tracing::debug!("session manager stopped");
    }

    /// Disposes of attempts still in flight after the last handle is gone.
    ///
    /// Every spawned attempt holds a sender, so once ours is dropped the
    /// receiver closes when the last of them has reported. Each attempt
    /// is bounded by its timeout.
    async fn drain_attempts(self) {
        let Self {
            config,
            telemetry,
            attempt_tx,
            mut attempts,
            ..
        } = self;
        drop(attempt_tx);

        while let Some(attempt) = attempts.recv().await {
            if let Attempt::Connected {
                generation,
                identity,
                result: Ok(connection),
            } = attempt
            {
                let handle = ConnectionHandle::new(connection, generation, identity);
                tracing::debug!(
                    %generation,
                    connection_id = %handle.id(),
                    "disposing connection that arrived after the manager stopped"
                );
                spawn_release(handle, config.disconnect_timeout, Arc::clone(&telemetry));
            }
        }
    }

    fn observe(&mut self, identity: Option<Identity>) -> Generation {
        if identity == self.identity && !self.current_state_failed() {
            tracing::trace!(generation = %self.generation, "identity unchanged");
            return self.generation;
        }

        let generation = self.advance();
        self.identity = identity.clone();

        if let Some(previous) = self.active.take() {
            self.spawn_teardown(previous);
        }

        match identity {
            None => {
                tracing::info!(%generation, "identity cleared");
                self.set_state(SessionState::Idle);
            }
            Some(identity) => {
                tracing::info!(
                    %generation,
                    user_id = %identity.id,
                    "identity observed, acquiring token"
                );
                self.set_state(SessionState::Acquiring);
                self.spawn_token_fetch(generation, identity);
            }
        }

        generation
    }

    async fn shutdown(&mut self) {
        self.advance();
        self.identity = None;

        if let Some(active) = self.active.take() {
            tracing::info!(
                generation = %self.generation,
                connection_id = %active.id(),
                "shutting down session"
            );
            self.set_state(SessionState::Disconnecting);
            let limit = self.config.disconnect_timeout;
            if let Err(error) = active.release(limit).await {
                report_teardown_failure(self.telemetry.as_ref(), &active, &error);
            }
        }

        self.set_state(SessionState::Idle);
    }

    fn handle_attempt(&mut self, attempt: Attempt<B::Connection>) {
        match attempt {
            Attempt::TokenFetched {
                generation,
                identity,
                result,
            } => {
                if generation != self.generation {
                    tracing::debug!(
                        %generation,
                        current = %self.generation,
                        "discarding token from superseded generation"
                    );
                    return;
                }
                match result {
                    Ok(token) => {
                        tracing::debug!(%generation, "token acquired, connecting");
                        self.set_state(SessionState::Connecting);
                        self.spawn_connect(generation, identity, token);
                    }
                    Err(error) => self.fail(generation, error),
                }
            }

            Attempt::Connected {
                generation,
                identity,
                result,
            } => match result {
                Ok(connection) => {
                    let handle = ConnectionHandle::new(connection, generation, identity);
                    if generation != self.generation {
                        tracing::debug!(
                            %generation,
                            current = %self.generation,
                            connection_id = %handle.id(),
                            "disposing connection from superseded generation"
                        );
                        self.spawn_teardown(handle);
                        return;
                    }
                    tracing::info!(
                        %generation,
                        connection_id = %handle.id(),
                        user_id = %handle.identity().id,
                        "session ready"
                    );
                    self.active = Some(handle.clone());
                    self.set_state(SessionState::Ready(handle));
                }
                Err(error) if generation == self.generation => {
                    self.fail(generation, error);
                }
                Err(error) => {
                    tracing::debug!(
                        %generation,
                        current = %self.generation,
                        error = %error,
                        "discarding connect failure from superseded generation"
                    );
                }
            },
        }
    }

    fn spawn_token_fetch(&self, generation: Generation, identity: Identity) {
        let supplier = Arc::clone(&self.supplier);
        let attempts = self.attempt_tx.clone();
        let limit = self.config.token_timeout;

        tokio::spawn(async move {
            let result =
                match tokio::time::timeout(limit, supplier.fetch_token(&identity)).await {
                    Ok(Ok(token)) => Ok(token),
                    Ok(Err(e)) => Err(SessionError::TokenFetch(e)),
                    Err(_) => Err(SessionError::Timeout {
                        operation: Operation::TokenFetch,
                        after: limit,
                    }),
                };
            let _ = attempts.send(Attempt::TokenFetched {
                generation,
                identity,
                result,
            });
        });
    }

    fn spawn_connect(
        &self,
        generation: Generation,
        identity: Identity,
        token: SessionToken,
    ) {
        let backend = Arc::clone(&self.backend);
        let supplier = Arc::clone(&self.supplier);
        let attempts = self.attempt_tx.clone();
        let limit = self.config.connect_timeout;

        tokio::spawn(async move {
            let result =
                match tokio::time::timeout(limit, backend.connect(&identity, &token)).await {
                    Ok(Ok(connection)) => Ok(connection),
                    Ok(Err(e)) => {
                        if e.is_unauthorized() {
                            supplier.invalidate(&identity.id);
                        }
                        Err(SessionError::Connect(e.to_string()))
                    }
                    Err(_) => Err(SessionError::Timeout {
                        operation: Operation::Connect,
                        after: limit,
                    }),
                };
            let _ = attempts.send(Attempt::Connected {
                generation,
                identity,
                result,
            });
        });
    }

    /// Releases a superseded connection in the background.
    ///
    /// The handle is claimed before this returns, so every clone reports
    /// `is_live() == false` from here on.
    fn spawn_teardown(&self, handle: ConnectionHandle<B::Connection>) {
        spawn_release(
            handle,
            self.config.disconnect_timeout,
            Arc::clone(&self.telemetry),
        );
    }

    fn fail(&mut self, generation: Generation, error: SessionError) {
        tracing::warn!(%generation, error = %error, "session attempt failed");
        self.telemetry.capture("session", &error);
        // No subscribers is fine; the state below still carries the error.
        let _ = self.errors_tx.send(SessionReport {
            generation,
            error: error.clone(),
        });
        self.set_state(SessionState::Failed(error));
    }

    fn advance(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.generation_tx.send_replace(self.generation);
        self.generation
    }

    fn current_state_failed(&self) -> bool {
        matches!(*self.state_tx.borrow(), SessionState::Failed(_))
    }

    fn set_state(&self, state: SessionState<B::Connection>) {
        tracing::trace!(generation = %self.generation, state = %state, "state changed");
        self.state_tx.send_replace(state);
    }
}

fn spawn_release<C: BackendConnection>(
    handle: ConnectionHandle<C>,
    limit: Duration,
    telemetry: Arc<dyn Telemetry>,
) {
    if !handle.claim() {
        return;
    }
    tokio::spawn(async move {
        if let Err(error) = handle.disconnect_claimed(limit).await {
            report_teardown_failure(telemetry.as_ref(), &handle, &error);
        }
    });
}

fn report_teardown_failure<C>(
    telemetry: &dyn Telemetry,
    handle: &ConnectionHandle<C>,
    error: &SessionError,
) {
    tracing::warn!(
        connection_id = %handle.id(),
        generation = %handle.generation(),
        error = %error,
        "teardown failed; connection released anyway"
    );
    telemetry.capture("teardown", error);
}
