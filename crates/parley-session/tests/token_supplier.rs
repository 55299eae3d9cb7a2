//! Integration tests for the HTTP token supplier against a mock endpoint.

use std::time::Duration;

use parley_protocol::Identity;
use parley_session::{
    CachedTokenSupplier, HttpTokenSupplier, TokenEndpointConfig, TokenFetchError, TokenSupplier,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn supplier(server: &MockServer) -> HttpTokenSupplier {
    let config = TokenEndpointConfig {
        bearer: Some("session-jwt".into()),
        ..TokenEndpointConfig::new(format!("{}/api/chat/token", server.uri()))
    };
    HttpTokenSupplier::new(config).expect("client should build")
}

fn ada() -> Identity {
    Identity::new("ada", "Ada Lovelace")
}

#[tokio::test]
async fn test_fetch_token_success_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/token"))
        .and(query_param("user_id", "ada"))
        .and(header("authorization", "Bearer session-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "chat-tok" })))
        .expect(1)
        .mount(&server)
        .await;

    let token = supplier(&server).fetch_token(&ada()).await.unwrap();

    assert_eq!(token.expose(), "chat-tok");
}

#[tokio::test]
async fn test_fetch_token_unauthorized_returns_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = supplier(&server).fetch_token(&ada()).await;

    assert_eq!(result.unwrap_err(), TokenFetchError::Unauthorized { status: 401 });
}

#[tokio::test]
async fn test_fetch_token_forbidden_returns_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = supplier(&server).fetch_token(&ada()).await;

    assert_eq!(result.unwrap_err(), TokenFetchError::Unauthorized { status: 403 });
}

#[tokio::test]
async fn test_fetch_token_server_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Failed to generate token"))
        .mount(&server)
        .await;

    let result = supplier(&server).fetch_token(&ada()).await;

    assert_eq!(
        result.unwrap_err(),
        TokenFetchError::Server {
            status: 500,
            message: "Failed to generate token".into(),
        }
    );
}

#[tokio::test]
async fn test_fetch_token_missing_token_returns_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "" })))
        .mount(&server)
        .await;

    let result = supplier(&server).fetch_token(&ada()).await;

    assert!(matches!(result, Err(TokenFetchError::Malformed(_))));
}

#[tokio::test]
async fn test_fetch_token_non_json_returns_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = supplier(&server).fetch_token(&ada()).await;

    assert!(matches!(result, Err(TokenFetchError::Malformed(_))));
}

#[tokio::test]
async fn test_fetch_token_slow_endpoint_returns_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let config = TokenEndpointConfig {
        timeout: Duration::from_millis(100),
        ..TokenEndpointConfig::new(format!("{}/api/chat/token", server.uri()))
    };

    let result = HttpTokenSupplier::new(config)
        .unwrap()
        .fetch_token(&ada())
        .await;

    assert!(matches!(result, Err(TokenFetchError::Network(_))));
}

#[tokio::test]
async fn test_cached_supplier_hits_endpoint_once_per_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("user_id", "ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "ada-tok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("user_id", "bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "bob-tok" })))
        .expect(1)
        .mount(&server)
        .await;
    let cached = CachedTokenSupplier::new(supplier(&server));

    let first = cached.fetch_token(&ada()).await.unwrap();
    let second = cached.fetch_token(&ada()).await.unwrap();
    let bob = cached.fetch_token(&Identity::new("bob", "Bob")).await.unwrap();

    assert_eq!(first.expose(), "ada-tok");
    assert_eq!(second.expose(), "ada-tok");
    assert_eq!(bob.expose(), "bob-tok");
}
