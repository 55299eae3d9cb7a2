//! Integration tests for `ChatClient`: session and channel resolution
//! working together.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parley::prelude::*;

// =========================================================================
// Fakes
// =========================================================================

struct DevTokens;

impl TokenSupplier for DevTokens {
    async fn fetch_token(&self, identity: &Identity) -> Result<SessionToken, TokenFetchError> {
        if identity.id.as_str() == "mallory" {
            return Err(TokenFetchError::Unauthorized { status: 403 });
        }
        Ok(SessionToken::new(format!("dev-{}", identity.id)))
    }
}

/// Every channel exists except `forbidden`.
#[derive(Clone, Default)]
struct LoopbackBackend {
    disconnects: Arc<AtomicUsize>,
}

struct LoopbackConnection {
    id: ConnectionId,
    disconnects: Arc<AtomicUsize>,
}

impl MessagingBackend for LoopbackBackend {
    type Connection = LoopbackConnection;

    async fn connect(
        &self,
        _identity: &Identity,
        _token: &SessionToken,
    ) -> Result<LoopbackConnection, TransportError> {
        Ok(LoopbackConnection {
            id: ConnectionId::next(),
            disconnects: Arc::clone(&self.disconnects),
        })
    }
}

impl BackendConnection for LoopbackConnection {
    async fn query_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, TransportError> {
        if channel.id.as_str() == "forbidden" {
            return Err(TransportError::Rejected {
                code: 403,
                message: "not a member".into(),
            });
        }
        Ok(ChannelInfo {
            cid: channel.cid(),
            member_count: 1,
            created: true,
        })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn client() -> (ChatClient<LoopbackConnection>, LoopbackBackend) {
    let backend = LoopbackBackend::default();
    let client = ChatClientBuilder::new().build(DevTokens, backend.clone());
    (client, backend)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_channel_before_sign_in_returns_none() {
    let (mut client, _) = client();

    let channel = client.select_channel(Some("general")).await.unwrap();

    assert!(channel.is_none());
    assert!(matches!(client.state(), SessionState::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_select_channel_after_sign_in_resolves() {
    let (mut client, _) = client();
    client
        .observe_identity(Some(Identity::new("ada", "Ada")))
        .await
        .unwrap();
    client.settled().await.unwrap();

    let channel = client
        .select_channel(Some("general"))
        .await
        .unwrap()
        .expect("should resolve");

    assert_eq!(channel.cid(), "messaging:general");
    assert!(client.current_channel().unwrap().same_channel(&channel));
}

#[tokio::test(start_paused = true)]
async fn test_select_channel_failure_leaves_session_ready() {
    let (mut client, _) = client();
    client
        .observe_identity(Some(Identity::new("ada", "Ada")))
        .await
        .unwrap();
    client.settled().await.unwrap();

    let result = client.select_channel(Some("forbidden")).await;

    assert!(matches!(
        result,
        Err(ParleyError::Channel(ChannelError::Rejected(_)))
    ));
    assert!(client.state().connection().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_identity_switch_reresolves_on_new_connection() {
    let (mut client, _) = client();
    client
        .observe_identity(Some(Identity::new("ada", "Ada")))
        .await
        .unwrap();
    client.settled().await.unwrap();
    let first = client.select_channel(Some("general")).await.unwrap().unwrap();

    client
        .observe_identity(Some(Identity::new("bob", "Bob")))
        .await
        .unwrap();
    client.settled().await.unwrap();
    let second = client.select_channel(Some("general")).await.unwrap().unwrap();

    assert!(!first.is_valid());
    assert!(second.is_valid());
    assert_ne!(first.connection_id(), second.connection_id());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_failure_is_reported() {
    let (client, _) = client();
    let mut errors = client.subscribe_errors();

    client
        .observe_identity(Some(Identity::new("mallory", "Mallory")))
        .await
        .unwrap();
    let state = client.settled().await.unwrap();

    assert!(matches!(
        state.error(),
        Some(SessionError::TokenFetch(TokenFetchError::Unauthorized { status: 403 }))
    ));
    assert!(errors.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_channel_and_is_idempotent() {
    let (mut client, backend) = client();
    client
        .observe_identity(Some(Identity::new("ada", "Ada")))
        .await
        .unwrap();
    client.settled().await.unwrap();
    let channel = client.select_channel(Some("general")).await.unwrap().unwrap();

    client.shutdown().await.unwrap();
    client.shutdown().await.unwrap();

    assert!(!channel.is_valid());
    assert!(client.current_channel().is_none());
    assert!(matches!(client.state(), SessionState::Idle));
    assert_eq!(backend.disconnects.load(Ordering::SeqCst), 1);
}
