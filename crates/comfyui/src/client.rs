//! Session management for one ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the connection configuration. Each call to
//! [`ComfyUIClient::connect`] opens a fresh [`ComfyUISession`]: a live
//! WebSocket event channel plus a newly generated client id. One session
//! serves exactly one orchestration run; concurrent runs must each open
//! their own session so their event streams cannot cross-talk.

use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ComfyUIConfig;
use crate::error::ComfyUIError;

/// The WebSocket stream type used for the event channel.
pub type EventStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Handle for connecting to a ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIClient {
    config: ComfyUIConfig,
}

/// One open session against a ComfyUI instance.
///
/// Owns the event channel for the lifetime of a single run. Call
/// [`close`](Self::close) exactly once on every exit path; the
/// orchestrator in [`crate::generate`] guarantees this.
pub struct ComfyUISession {
    /// Unique client id sent during the WebSocket handshake. Never
    /// reused across sessions.
    pub client_id: String,
    /// HTTP API base URL for the same instance.
    pub api_url: String,
    /// The live event channel.
    pub ws_stream: EventStream,
}

impl ComfyUIClient {
    /// Create a client for the instance described by `config`.
    pub fn new(config: ComfyUIConfig) -> Self {
        Self { config }
    }

    /// The connection configuration this client was built with.
    pub fn config(&self) -> &ComfyUIConfig {
        &self.config
    }

    /// Open the event channel and derive a fresh session identity.
    ///
    /// Generates a UUID-v4 client id and appends it as the `clientId`
    /// query parameter so the server can address messages back to this
    /// session.
    pub async fn connect(&self) -> Result<ComfyUISession, ComfyUIError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws?clientId={}", self.config.ws_url(), client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIError::Connection(format!(
                "failed to connect to ComfyUI at {}: {e}",
                self.config.ws_url()
            ))
        })?;

        tracing::info!(
            server = %self.config.server_address,
            client_id = %client_id,
            "Connected to ComfyUI event channel",
        );

        Ok(ComfyUISession {
            client_id,
            api_url: self.config.api_url(),
            ws_stream,
        })
    }
}

impl ComfyUISession {
    /// Close the event channel.
    ///
    /// A close failure is logged rather than propagated: by the time a
    /// run closes its session the outcome of the run is already decided.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_stream.send(Message::Close(None)).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "WebSocket close failed");
        } else {
            tracing::debug!(client_id = %self.client_id, "Session closed");
        }
    }
}
