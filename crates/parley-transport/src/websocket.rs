//! WebSocket messaging backend using `tokio-tungstenite`.

use parley_protocol::{
    ChannelInfo, ChannelRef, ClientFrame, Codec, Identity, JsonCodec,
    ServerFrame, SessionToken,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use rand::Rng;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{BackendConnection, ConnectionId, MessagingBackend, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Where the backend lives and which application we connect as.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// WebSocket endpoint, e.g. `wss://chat.example.com/connect`.
    pub url: String,

    /// Public application key sent with every `connect` frame.
    pub api_key: String,
}

impl BackendConfig {
    /// Reads `PARLEY_BACKEND_URL` and `PARLEY_API_KEY`.
    ///
    /// Returns `None` if the URL is unset. A missing API key is sent as
    /// an empty string and left for the backend to reject.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("PARLEY_BACKEND_URL").ok()?;
        let api_key = std::env::var("PARLEY_API_KEY").unwrap_or_default();
        Some(Self { url, api_key })
    }
}

/// A [`MessagingBackend`] that speaks JSON frames over a WebSocket.
pub struct WebSocketBackend {
    config: BackendConfig,
    codec: JsonCodec,
}

impl WebSocketBackend {
    /// Creates a backend client. No connection is opened until
    /// [`connect`](MessagingBackend::connect) is called.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            codec: JsonCodec,
        }
    }
}

impl MessagingBackend for WebSocketBackend {
    type Connection = WebSocketConnection;

    async fn connect(
        &self,
        identity: &Identity,
        token: &SessionToken,
    ) -> Result<Self::Connection, TransportError> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.config.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let hello = ClientFrame::Connect {
            api_key: self.config.api_key.clone(),
            user: identity.clone(),
            token: token.clone(),
        };
        send_frame(&mut ws, &self.codec, &hello).await?;

        loop {
            match next_frame(&mut ws, &self.codec).await? {
                Some(ServerFrame::Connected { connection_id }) => {
                    let id = ConnectionId::next();
                    tracing::debug!(
                        %id,
                        remote_id = %connection_id,
                        user_id = %identity.id,
                        "WebSocket connection established"
                    );
                    let (sink, stream) = ws.split();
                    return Ok(WebSocketConnection {
                        id,
                        remote_id: connection_id,
                        sink: Mutex::new(sink),
                        stream: Mutex::new(stream),
                        codec: self.codec,
                    });
                }
                Some(ServerFrame::Error { code, message, .. }) => {
                    let _ = ws.close(None).await;
                    return Err(TransportError::Rejected { code, message });
                }
                Some(_) => continue,
                None => {
                    return Err(TransportError::ConnectionClosed(
                        "backend closed the socket before accepting the connection"
                            .into(),
                    ));
                }
            }
        }
    }
}

/// A single authenticated WebSocket connection.
///
/// The socket is split into its write and read halves, each behind its
/// own mutex. A channel query holds the read half from sending its
/// request until its reply arrives, so queries run one at a time.
/// Disconnecting only needs the write half and never waits on a reader.
pub struct WebSocketConnection {
    id: ConnectionId,
    remote_id: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    codec: JsonCodec,
}

impl WebSocketConnection {
    /// The id the backend assigned to this connection.
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }
}

impl BackendConnection for WebSocketConnection {
    async fn query_channel(
        &self,
        channel: &ChannelRef,
    ) -> Result<ChannelInfo, TransportError> {
        let request_id = generate_request_id();
        let mut stream = self.stream.lock().await;

        let query = ClientFrame::QueryChannel {
            request_id: request_id.clone(),
            channel: channel.clone(),
        };
        send_frame(&mut *self.sink.lock().await, &self.codec, &query).await?;

        loop {
            match next_frame(&mut *stream, &self.codec).await? {
                Some(ServerFrame::ChannelState {
                    request_id: reply_to,
                    channel,
                }) if reply_to == request_id => return Ok(channel),
                Some(ServerFrame::Error {
                    request_id: reply_to,
                    code,
                    message,
                }) if reply_to.as_deref().is_none_or(|id| id == request_id) => {
                    return Err(TransportError::Rejected { code, message });
                }
                Some(_) => continue,
                None => {
                    return Err(TransportError::ConnectionClosed(format!(
                        "closed while querying {channel}"
                    )));
                }
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        send_frame(&mut *sink, &self.codec, &ClientFrame::Disconnect).await?;
        sink.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })?;
        tracing::debug!(id = %self.id, remote_id = %self.remote_id, "WebSocket connection closed");
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

async fn send_frame<S>(
    ws: &mut S,
    codec: &JsonCodec,
    frame: &ClientFrame,
) -> Result<(), TransportError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let bytes = codec.encode(frame)?;
    ws.send(Message::Binary(bytes.into())).await.map_err(|e| {
        TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            e,
        ))
    })
}

/// Reads the next frame this layer understands.
///
/// Returns `Ok(None)` when the socket is cleanly closed. Ping/pong and
/// frame types outside connection and channel lookup (message traffic,
/// typing events, ...) are skipped.
async fn next_frame<S>(
    ws: &mut S,
    codec: &JsonCodec,
) -> Result<Option<ServerFrame>, TransportError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let data = match ws.next().await {
            Some(Ok(Message::Binary(data))) => data.to_vec(),
            Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(TransportError::ReceiveFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    e,
                )));
            }
        };

        match codec.decode::<ServerFrame>(&data) {
            Ok(ServerFrame::HealthCheck) => continue,
            Ok(frame) => return Ok(Some(frame)),
            Err(e) => {
                tracing::trace!(error = %e, "skipping unrecognized frame");
                continue;
            }
        }
    }
}

/// Generates a random 16-character hex string used to pair a request
/// with its reply.
fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
