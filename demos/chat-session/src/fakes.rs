//! In-process stand-ins for the token endpoint and the messaging backend.
//!
//! Each user gets a fixed, made-up network latency so that rapid identity
//! churn produces out-of-order results, which is the interesting case.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parley::prelude::*;

/// Latency per user id: slow users make stale results likely.
fn latency_for(user: &UserId) -> Duration {
    match user.as_str() {
        "ada" => Duration::from_millis(300),
        "bob" => Duration::from_millis(40),
        _ => Duration::from_millis(100),
    }
}

/// Issues `demo-{id}` tokens after a per-user delay.
pub struct SimulatedTokens;

impl TokenSupplier for SimulatedTokens {
    async fn fetch_token(&self, identity: &Identity) -> Result<SessionToken, TokenFetchError> {
        tokio::time::sleep(latency_for(&identity.id)).await;
        if identity.id.as_str() == "banned" {
            return Err(TokenFetchError::Unauthorized { status: 403 });
        }
        Ok(SessionToken::new(format!("demo-{}", identity.id)))
    }
}

/// A backend that accepts everyone and knows every channel except
/// `restricted`. Counts connections opened and closed.
#[derive(Clone, Default)]
pub struct SimulatedBackend {
    stats: Arc<Stats>,
}

#[derive(Default)]
struct Stats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl SimulatedBackend {
    /// Connections opened but not yet closed.
    pub fn open_connections(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst) - self.stats.closed.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }
}

pub struct SimulatedConnection {
    id: ConnectionId,
    stats: Arc<Stats>,
}

impl MessagingBackend for SimulatedBackend {
    type Connection = SimulatedConnection;

    async fn connect(
        &self,
        identity: &Identity,
        _token: &SessionToken,
    ) -> Result<SimulatedConnection, TransportError> {
        tokio::time::sleep(latency_for(&identity.id)).await;
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedConnection {
            id: ConnectionId::next(),
            stats: Arc::clone(&self.stats),
        })
    }
}

impl BackendConnection for SimulatedConnection {
    async fn query_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, TransportError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if channel.id.as_str() == "restricted" {
            return Err(TransportError::Rejected {
                code: 403,
                message: "not a member".into(),
            });
        }
        Ok(ChannelInfo {
            cid: channel.cid(),
            member_count: 2,
            created: false,
        })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
