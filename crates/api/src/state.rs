use std::sync::Arc;

use fluxgate_comfyui::ComfyUIClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable: the config is behind `Arc` and the client only
/// holds connection configuration (each request opens its own session).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// ComfyUI client handle for the configured instance.
    pub client: ComfyUIClient,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let client = ComfyUIClient::new(config.comfyui_config());
        Self {
            config: Arc::new(config),
            client,
        }
    }
}
