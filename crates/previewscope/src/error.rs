//! Error types for Previewscope
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for the previewscope engine
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("{}", friendly_network_error(.0))]
    Network(#[from] reqwest::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Failed to load audio file: {0}")]
    FileLoad(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Audio engine is not ready")]
    EngineNotReady,

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Previewscope
pub type Result<T> = std::result::Result<T, PlayerError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!("Could not connect to {}", url.host_str().unwrap_or("server"));
        }
        return "Could not connect to server".to_string();
    }
    if e.is_timeout() {
        return "Connection timed out".to_string();
    }
    if e.is_status() {
        if let Some(status) = e.status() {
            return format!("Server returned {}", status);
        }
    }
    format!("Network error: {e}")
}
