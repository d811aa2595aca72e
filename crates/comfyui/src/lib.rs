//! ComfyUI orchestration client.
//!
//! Submits a workflow to a ComfyUI instance, follows its execution over
//! the WebSocket event channel, and retrieves and persists the produced
//! image artifacts. The entry point for a full run is
//! [`generate::generate`]; the individual stages (session, submission,
//! tracking, collection, materialization) are usable on their own.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod generate;
pub mod history;
pub mod outputs;
pub mod tracker;

pub use client::{ComfyUIClient, ComfyUISession};
pub use config::ComfyUIConfig;
pub use error::ComfyUIError;
pub use generate::generate;
