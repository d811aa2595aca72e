//! Connection configuration for a ComfyUI instance.
//!
//! The address is an explicit value threaded through the client rather
//! than ambient state, so two clients can target two instances in the
//! same process.

use std::time::Duration;

/// Configuration for reaching one ComfyUI server.
#[derive(Debug, Clone)]
pub struct ComfyUIConfig {
    /// Host and port of the ComfyUI server, without a scheme
    /// (e.g. `127.0.0.1:8188`).
    pub server_address: String,
    /// Maximum time to wait between WebSocket frames before a run is
    /// declared stuck and fails with a stream error.
    pub idle_timeout: Duration,
}

impl ComfyUIConfig {
    /// Configuration for a specific server address with the default
    /// idle timeout.
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            ..Self::default()
        }
    }

    /// WebSocket base URL, e.g. `ws://127.0.0.1:8188`.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.server_address)
    }

    /// HTTP API base URL, e.g. `http://127.0.0.1:8188`.
    pub fn api_url(&self) -> String {
        format!("http://{}", self.server_address)
    }
}

impl Default for ComfyUIConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8188".to_string(),
            idle_timeout: Duration::from_secs(120),
        }
    }
}
