use std::path::PathBuf;
use std::time::Duration;

use fluxgate_comfyui::ComfyUIConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development next to a
/// ComfyUI instance on its default port. Override via environment
/// variables in production.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// ComfyUI host:port, no scheme (default: `127.0.0.1:8188`).
    pub comfyui_address: String,
    /// Path to the workflow template JSON.
    pub workflow_path: PathBuf,
    /// Node id in the template whose `inputs.text` receives the prompt.
    pub prompt_node_id: String,
    /// Directory generated images are persisted to.
    pub output_dir: PathBuf,
    /// Whether intermediate previews are fetched and saved too.
    pub save_previews: bool,
    /// Event-channel idle timeout in seconds (default: `120`).
    pub idle_timeout_secs: u64,
    /// HTTP request timeout in seconds (default: `600` -- generation
    /// runs for minutes, so this must outlive a full run).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                          |
    /// |------------------------|----------------------------------|
    /// | `HOST`                 | `0.0.0.0`                        |
    /// | `PORT`                 | `3000`                           |
    /// | `COMFYUI_ADDRESS`      | `127.0.0.1:8188`                 |
    /// | `WORKFLOW_PATH`        | `./workflows/flux_dev_api.json`  |
    /// | `PROMPT_NODE_ID`       | `6`                              |
    /// | `OUTPUT_DIR`           | `./output`                       |
    /// | `SAVE_PREVIEWS`        | `false`                          |
    /// | `IDLE_TIMEOUT_SECS`    | `120`                            |
    /// | `REQUEST_TIMEOUT_SECS` | `600`                            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let comfyui_address =
            std::env::var("COMFYUI_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8188".into());

        let workflow_path = PathBuf::from(
            std::env::var("WORKFLOW_PATH")
                .unwrap_or_else(|_| "./workflows/flux_dev_api.json".into()),
        );

        let prompt_node_id = std::env::var("PROMPT_NODE_ID").unwrap_or_else(|_| "6".into());

        let output_dir =
            PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".into()));

        let save_previews: bool = std::env::var("SAVE_PREVIEWS")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("SAVE_PREVIEWS must be true or false");

        let idle_timeout_secs: u64 = std::env::var("IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("IDLE_TIMEOUT_SECS must be a valid u64");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            comfyui_address,
            workflow_path,
            prompt_node_id,
            output_dir,
            save_previews,
            idle_timeout_secs,
            request_timeout_secs,
        }
    }

    /// The core-library connection configuration derived from this
    /// server configuration.
    pub fn comfyui_config(&self) -> ComfyUIConfig {
        ComfyUIConfig {
            server_address: self.comfyui_address.clone(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}
