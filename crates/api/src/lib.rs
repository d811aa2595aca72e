//! HTTP front end for prompt-to-image generation.
//!
//! One endpoint (`POST /generate_image`) accepts a form-encoded prompt,
//! parametrizes the configured workflow template, and drives a full
//! orchestration run via `fluxgate-comfyui`, streaming the resulting
//! image back to the caller.

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
pub mod workflow;
