//! Client for the Matter server WebSocket API.
//!
//! [`CoordinationClient`] and [`Connector`] are the seams the configurator is
//! written against; [`MatterClient`] and [`MatterConnector`] implement them
//! over a live WebSocket connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use types::{AttributePath, AttributeValue};

pub mod protocol;

use protocol::{
    extract_attribute_value, write_failure_status, ApiCommand, CommandMessage, IncomingMessage,
    ReadAttributeArgs, ServerInfoMessage, WriteAttributeArgs, SCHEMA_VERSION,
};

/// Connection options for the Matter server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for the WebSocket handshake plus the server info greeting.
    pub connect_timeout_ms: u64,
    /// Per-command timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url {0}")]
    InvalidUrl(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("server requires schema {required}, client supports {supported}")]
    IncompatibleServer { required: u32, supported: u32 },
    #[error("unexpected message from server: {0}")]
    UnexpectedMessage(String),
    #[error("server error {code}: {details}")]
    Server { code: i32, details: String },
    #[error("write rejected with status {status}")]
    WriteRejected { status: i64 },
}

/// Attribute access on an established connection to a coordination service.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Read one attribute. `Ok(None)` means the service reported no value.
    async fn read_attribute(
        &self,
        node_id: u64,
        path: &AttributePath,
    ) -> Result<Option<AttributeValue>, ClientError>;

    async fn write_attribute(
        &self,
        node_id: u64,
        path: &AttributePath,
        value: i64,
    ) -> Result<(), ClientError>;

    /// Release the connection. Dropping the client releases it as well.
    async fn close(&self);
}

/// Opens connections to a coordination service.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: CoordinationClient;

    async fn connect(&self, server_url: &str) -> Result<Self::Client, ClientError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = Result<Value, ClientError>;
type PendingMap = Arc<Mutex<Pending>>;

/// Requests waiting for a reply. `closed` is set by the listener once the
/// socket is gone so late requests fail instead of waiting out the timeout.
#[derive(Default)]
struct Pending {
    closed: bool,
    waiters: HashMap<String, oneshot::Sender<Reply>>,
}

/// A live connection to the Matter server.
///
/// A background task owns the read half of the socket and hands every reply
/// to the request waiting on its `message_id`.
pub struct MatterClient {
    config: ClientConfig,
    sink: Mutex<SplitSink<WsStream, Message>>,
    pending: PendingMap,
    listener: JoinHandle<()>,
    next_message_id: AtomicU64,
    server_info: ServerInfoMessage,
}

impl MatterClient {
    pub async fn connect(server_url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let request = server_url
            .into_client_request()
            .map_err(|_| ClientError::InvalidUrl(server_url.to_string()))?;
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);

        let (socket, _) = timeout(connect_timeout, connect_async(request))
            .await
            .map_err(|_| ClientError::Timeout {
                timeout_ms: config.connect_timeout_ms,
            })??;
        let (sink, mut stream) = socket.split();

        let server_info = timeout(connect_timeout, read_server_info(&mut stream))
            .await
            .map_err(|_| ClientError::Timeout {
                timeout_ms: config.connect_timeout_ms,
            })??;
        if server_info.min_supported_schema_version > SCHEMA_VERSION {
            return Err(ClientError::IncompatibleServer {
                required: server_info.min_supported_schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        debug!(
            schema_version = server_info.schema_version,
            sdk_version = %server_info.sdk_version,
            "matter server info received"
        );

        let pending: PendingMap = Arc::new(Mutex::new(Pending::default()));
        let listener = tokio::spawn(listen(stream, Arc::clone(&pending)));

        let client = Self {
            config,
            sink: Mutex::new(sink),
            pending,
            listener,
            next_message_id: AtomicU64::new(1),
            server_info,
        };
        client.start_listening().await?;
        Ok(client)
    }

    pub fn server_info(&self) -> &ServerInfoMessage {
        &self.server_info
    }

    /// Subscribe to the server. Its reply is the one-shot readiness signal:
    /// attribute commands are only issued after it resolves.
    async fn start_listening(&self) -> Result<(), ClientError> {
        let nodes = self
            .send_command(ApiCommand::StartListening, Value::Object(Default::default()))
            .await?;
        let node_count = nodes.as_array().map(Vec::len).unwrap_or(0);
        info!(node_count, "listening on matter server");
        Ok(())
    }

    async fn send_command(&self, command: ApiCommand, args: Value) -> Reply {
        let message_id = self
            .next_message_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let payload = serde_json::to_string(&CommandMessage {
            message_id: message_id.clone(),
            command,
            args,
        })?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(ClientError::ConnectionClosed);
            }
            pending.waiters.insert(message_id.clone(), tx);
        }

        let sent = self.sink.lock().await.send(Message::Text(payload)).await;
        if let Err(err) = sent {
            self.pending.lock().await.waiters.remove(&message_id);
            return Err(err.into());
        }

        let timeout_ms = self.config.request_timeout_ms;
        match timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.waiters.remove(&message_id);
                warn!(?command, message_id = %message_id, timeout_ms, "matter command timeout");
                Err(ClientError::Timeout { timeout_ms })
            }
        }
    }
}

#[async_trait]
impl CoordinationClient for MatterClient {
    async fn read_attribute(
        &self,
        node_id: u64,
        path: &AttributePath,
    ) -> Result<Option<AttributeValue>, ClientError> {
        let attribute_path = path.to_string();
        let args = serde_json::to_value(ReadAttributeArgs {
            node_id,
            attribute_path: &attribute_path,
        })?;
        let result = self.send_command(ApiCommand::ReadAttribute, args).await?;
        debug!(node_id, path = %attribute_path, %result, "read_attribute reply");

        Ok(extract_attribute_value(&attribute_path, result))
    }

    async fn write_attribute(
        &self,
        node_id: u64,
        path: &AttributePath,
        value: i64,
    ) -> Result<(), ClientError> {
        let attribute_path = path.to_string();
        let args = serde_json::to_value(WriteAttributeArgs {
            node_id,
            attribute_path: &attribute_path,
            value,
        })?;
        let result = self.send_command(ApiCommand::WriteAttribute, args).await?;
        debug!(node_id, path = %attribute_path, %result, "write_attribute reply");

        match write_failure_status(&result) {
            Some(status) => Err(ClientError::WriteRejected { status }),
            None => Ok(()),
        }
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(err) = sink.close().await {
            debug!(error = %err, "websocket close failed");
        }
        self.listener.abort();
    }
}

impl std::fmt::Debug for MatterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatterClient")
            .field("config", &self.config)
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

impl Drop for MatterClient {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// [`Connector`] for the Matter server WebSocket API.
#[derive(Debug, Clone, Default)]
pub struct MatterConnector {
    config: ClientConfig,
}

impl MatterConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MatterConnector {
    type Client = MatterClient;

    async fn connect(&self, server_url: &str) -> Result<MatterClient, ClientError> {
        MatterClient::connect(server_url, self.config.clone()).await
    }
}

async fn read_server_info(
    stream: &mut SplitStream<WsStream>,
) -> Result<ServerInfoMessage, ClientError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                return match IncomingMessage::parse(&text)? {
                    IncomingMessage::ServerInfo(info) => Ok(info),
                    _ => Err(ClientError::UnexpectedMessage(text)),
                };
            }
            Message::Close(_) => return Err(ClientError::ConnectionClosed),
            Message::Binary(_) => {
                return Err(ClientError::UnexpectedMessage("binary frame".to_string()))
            }
            _ => {}
        }
    }
    Err(ClientError::ConnectionClosed)
}

async fn listen(mut stream: SplitStream<WsStream>, pending: PendingMap) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch(&text, &pending).await,
            Ok(Message::Close(frame)) => {
                debug!(?frame, "matter server closed connection");
                break;
            }
            Ok(Message::Binary(_)) => warn!("ignoring binary websocket frame"),
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "websocket receive failed");
                break;
            }
        }
    }

    let mut pending = pending.lock().await;
    pending.closed = true;
    for (_, tx) in pending.waiters.drain() {
        let _ = tx.send(Err(ClientError::ConnectionClosed));
    }
}

async fn dispatch(text: &str, pending: &PendingMap) {
    let message = match IncomingMessage::parse(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "unparseable message from matter server");
            return;
        }
    };

    let (message_id, reply) = match message {
        IncomingMessage::Success(result) => (result.message_id, Ok(result.result)),
        IncomingMessage::Error(result) => (
            result.message_id,
            Err(ClientError::Server {
                code: result.error_code,
                details: result.details.unwrap_or_default(),
            }),
        ),
        IncomingMessage::Event(event) => {
            debug!(event = %event.event, "matter server event");
            return;
        }
        IncomingMessage::ServerInfo(_) => {
            debug!("ignoring repeated server info");
            return;
        }
    };

    match pending.lock().await.waiters.remove(&message_id) {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => debug!(message_id = %message_id, "reply for unknown message id"),
    }
}
