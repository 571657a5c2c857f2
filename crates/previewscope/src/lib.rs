//! Previewscope — Audio Preview Engine
//!
//! Streaming-preview playback with windowed-FFT spectrum analysis.
//!
//! ## Quick start
//!
//! ```no_run
//! use previewscope::session::Session;
//! use previewscope::config::SessionConfig;
//!
//! let session = Session::new(SessionConfig::default())?;
//! session.load("https://cdn.example.com/previews/track.m4a");
//! # Ok::<(), previewscope::error::PlayerError>(())
//! ```

pub mod audio;
pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod session;
