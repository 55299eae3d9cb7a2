//! Walks a chat session through sign-in, rapid identity churn, channel
//! selection, and sign-out.
//!
//! With `PARLEY_TOKEN_URL` and `PARLEY_BACKEND_URL` set, it talks to real
//! services. Otherwise it runs against simulated ones.
//!
//! ```text
//! RUST_LOG=info,parley=trace cargo run -p chat-session
//! ```

mod fakes;

use std::error::Error;
use std::time::Duration;

use parley::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use crate::fakes::{SimulatedBackend, SimulatedTokens};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley=debug")),
        )
        .init();

    match (TokenEndpointConfig::from_env(), BackendConfig::from_env()) {
        (Some(tokens), Some(backend)) => run_live(tokens, backend).await,
        _ => {
            tracing::info!("PARLEY_TOKEN_URL or PARLEY_BACKEND_URL unset, using simulated services");
            let backend = SimulatedBackend::default();
            let mut client = ChatClientBuilder::new().build(SimulatedTokens, backend.clone());
            watch_errors(&client);

            simulate(&mut client).await?;

            // Give superseded attempts time to land and be disposed of.
            tokio::time::sleep(Duration::from_secs(1)).await;
            println!(
                "connections opened: {}, still open: {}",
                backend.opened(),
                backend.open_connections()
            );
            Ok(())
        }
    }
}

async fn run_live(tokens: TokenEndpointConfig, backend: BackendConfig) -> Result<(), Box<dyn Error>> {
    let user_id = std::env::var("PARLEY_USER_ID").unwrap_or_else(|_| "demo-user".into());
    let user_name = std::env::var("PARLEY_USER_NAME").unwrap_or_else(|_| user_id.clone());
    let channel = std::env::var("PARLEY_CHANNEL").unwrap_or_else(|_| "general".into());

    let mut client = ChatClientBuilder::new()
        .build(HttpTokenSupplier::new(tokens)?, WebSocketBackend::new(backend));
    watch_errors(&client);

    client
        .observe_identity(Some(Identity::new(user_id, user_name)))
        .await?;
    println!("state: {}", client.settled().await?);
    show_channel(client.select_channel(Some(channel.as_str())).await);

    client.shutdown().await?;
    println!("state: {}", client.state());
    Ok(())
}

/// The scripted session used when no real services are configured.
async fn simulate<C: BackendConnection>(client: &mut ChatClient<C>) -> Result<(), ParleyError> {
    println!("-- sign in as ada, then switch to bob before ada's token arrives");
    client.observe_identity(Some(ada())).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.observe_identity(Some(bob())).await?;
    println!("state: {}", client.settled().await?);

    println!("-- open #general, then #restricted, then a malformed id");
    show_channel(client.select_channel(Some("general")).await);
    show_channel(client.select_channel(Some("restricted")).await);
    show_channel(client.select_channel(Some("no such/channel")).await);

    println!("-- sign out and straight back in as ada");
    client.observe_identity(None).await?;
    client.observe_identity(Some(ada())).await?;
    println!("state: {}", client.settled().await?);

    println!("-- a user the token endpoint refuses");
    client
        .observe_identity(Some(Identity::new("banned", "Banned")))
        .await?;
    println!("state: {}", client.settled().await?);

    println!("-- shut down");
    client.shutdown().await?;
    println!("state: {}", client.state());
    Ok(())
}

fn ada() -> Identity {
    Identity::new("ada", "Ada Lovelace").with_avatar("https://example.com/ada.png")
}

fn bob() -> Identity {
    Identity::new("bob", "Bob")
}

fn show_channel<C>(result: Result<Option<ChannelHandle<C>>, ParleyError>) {
    match result {
        Ok(Some(channel)) => println!("channel: {channel} ({} members)", channel.info().member_count),
        Ok(None) => println!("channel: none"),
        Err(e) => println!("channel error: {e}"),
    }
}

/// Logs every session failure the client reports.
fn watch_errors<C: BackendConnection>(client: &ChatClient<C>) {
    let mut errors = client.subscribe_errors();
    tokio::spawn(async move {
        loop {
            match errors.recv().await {
                Ok(report) => tracing::warn!(
                    generation = %report.generation,
                    error = %report.error,
                    "session failed"
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "error subscriber fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
