//! Integration tests for the WebSocket messaging backend.
//!
//! Each test spins up a scripted backend on a random local port: it
//! accepts one client, decodes every frame it receives, and answers with
//! whatever the test's script returns for that frame.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use parley_protocol::{
        ChannelId, ChannelInfo, ChannelRef, ClientFrame, Identity, ServerFrame,
        SessionToken,
    };
    use parley_transport::{
        BackendConfig, BackendConnection, MessagingBackend, TransportError,
        WebSocketBackend,
    };
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;

    /// Starts a one-client backend. Returns its `ws://` URL and a handle
    /// that resolves to every frame the client sent.
    async fn spawn_backend<F>(script: F) -> (String, JoinHandle<Vec<ClientFrame>>)
    where
        F: Fn(&ClientFrame) -> Vec<ServerFrame> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().expect("should have addr");

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("should accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("should upgrade");
            let mut seen = Vec::new();

            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
                let frame: ClientFrame =
                    serde_json::from_slice(&msg.into_data()).expect("client frame");
                for reply in script(&frame) {
                    let bytes = serde_json::to_vec(&reply).expect("encode");
                    if ws.send(Message::Binary(bytes.into())).await.is_err() {
                        break;
                    }
                }
                seen.push(frame);
            }
            seen
        });

        (format!("ws://{addr}"), handle)
    }

    fn backend(url: String) -> WebSocketBackend {
        WebSocketBackend::new(BackendConfig {
            url,
            api_key: "test-key".into(),
        })
    }

    fn general() -> ChannelRef {
        ChannelRef::new("messaging", ChannelId::new("general").unwrap())
    }

    /// A backend that accepts everyone and knows exactly one channel.
    fn friendly(frame: &ClientFrame) -> Vec<ServerFrame> {
        match frame {
            ClientFrame::Connect { .. } => vec![
                ServerFrame::HealthCheck,
                ServerFrame::Connected {
                    connection_id: "remote-1".into(),
                },
            ],
            ClientFrame::QueryChannel {
                request_id,
                channel,
            } if channel.id.as_str() == "general" => vec![
                // A reply to someone else's request must be skipped.
                ServerFrame::ChannelState {
                    request_id: "not-yours".into(),
                    channel: ChannelInfo {
                        cid: "messaging:other".into(),
                        member_count: 0,
                        created: false,
                    },
                },
                ServerFrame::ChannelState {
                    request_id: request_id.clone(),
                    channel: ChannelInfo {
                        cid: channel.cid(),
                        member_count: 2,
                        created: true,
                    },
                },
            ],
            ClientFrame::QueryChannel { request_id, .. } => vec![ServerFrame::Error {
                request_id: Some(request_id.clone()),
                code: 404,
                message: "no such channel".into(),
            }],
            ClientFrame::Disconnect => vec![],
        }
    }

    #[tokio::test]
    async fn test_connect_query_and_disconnect_round_trip() {
        let (url, server) = spawn_backend(friendly).await;
        let identity = Identity::new("u1", "Ada");

        let conn = backend(url)
            .connect(&identity, &SessionToken::new("tok-1"))
            .await
            .expect("should connect");
        assert_eq!(conn.remote_id(), "remote-1");

        let info = conn.query_channel(&general()).await.expect("should resolve");
        assert_eq!(info.cid, "messaging:general");
        assert_eq!(info.member_count, 2);
        assert!(info.created);

        conn.disconnect().await.expect("should disconnect");

        let frames = server.await.expect("server task");
        assert!(matches!(
            &frames[0],
            ClientFrame::Connect { api_key, user, token }
                if api_key == "test-key" && *user == identity && token.expose() == "tok-1"
        ));
        assert!(matches!(frames[1], ClientFrame::QueryChannel { .. }));
        assert_eq!(frames.last(), Some(&ClientFrame::Disconnect));
    }

    #[tokio::test]
    async fn test_connect_rejected_token_returns_unauthorized() {
        let (url, _server) = spawn_backend(|_| {
            vec![ServerFrame::Error {
                request_id: None,
                code: 401,
                message: "token expired".into(),
            }]
        })
        .await;

        let result = backend(url)
            .connect(&Identity::new("u1", "Ada"), &SessionToken::new("old"))
            .await;

        match result {
            Err(e) => assert!(e.is_unauthorized(), "unexpected error: {e}"),
            Ok(_) => panic!("connect should be rejected"),
        }
    }

    #[tokio::test]
    async fn test_query_unknown_channel_returns_404() {
        let (url, _server) = spawn_backend(friendly).await;
        let conn = backend(url)
            .connect(&Identity::new("u1", "Ada"), &SessionToken::new("tok"))
            .await
            .expect("should connect");

        let missing = ChannelRef::new("messaging", ChannelId::new("nope").unwrap());
        let result = conn.query_channel(&missing).await;

        assert!(
            matches!(result, Err(TransportError::Rejected { code: 404, .. })),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_connect_unreachable_returns_connect_failed() {
        // Bind then drop, so the port is (almost certainly) closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = backend(format!("ws://{addr}"))
            .connect(&Identity::new("u1", "Ada"), &SessionToken::new("tok"))
            .await;

        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }

    #[tokio::test]
    async fn test_disconnect_does_not_wait_for_pending_query() {
        // Accepts the connection but never answers a channel query.
        let (url, server) = spawn_backend(|frame| match frame {
            ClientFrame::Connect { .. } => vec![ServerFrame::Connected {
                connection_id: "remote-1".into(),
            }],
            _ => vec![],
        })
        .await;
        let conn = Arc::new(
            backend(url)
                .connect(&Identity::new("u1", "Ada"), &SessionToken::new("tok"))
                .await
                .expect("should connect"),
        );

        let pending = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.query_channel(&general()).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), conn.disconnect())
            .await
            .expect("disconnect should not queue behind the query")
            .expect("should disconnect");

        let frames = server.await.expect("server task");
        assert!(matches!(frames[1], ClientFrame::QueryChannel { .. }));
        assert_eq!(frames.last(), Some(&ClientFrame::Disconnect));

        let query = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .expect("query should end once the socket closes")
            .expect("query task");
        assert!(query.is_err());
    }
}
