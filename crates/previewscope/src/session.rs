//! Playback session
//!
//! `Session` is the top-level handle: it owns a [`PlaybackEngine`], fetches
//! previews through an [`AudioSource`], and wires display observers up via
//! [`DisplaySync`]. One session drives one preview at a time; loading a new
//! URL replaces whatever is playing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::audio::decoder::decode_bytes;
use crate::audio::engine::PlaybackEngine;
use crate::audio::types::{EngineEvent, Snapshot};
use crate::config::{engine::SKIP_STEP_SECS, SessionConfig};
use crate::display::{DisplaySync, SnapshotSource};
use crate::error::Result;
use crate::fetch::{AudioSource, HttpAudioSource};

pub struct Session {
    engine: PlaybackEngine,
    source: Arc<dyn AudioSource>,
    tick_interval: Duration,
}

impl Session {
    /// Create a session fetching previews over HTTP
    pub fn new(config: SessionConfig) -> Result<Self> {
        let source = Arc::new(HttpAudioSource::new()?);
        Self::with_source(config, source)
    }

    /// Create a session with a custom audio source
    pub fn with_source(config: SessionConfig, source: Arc<dyn AudioSource>) -> Result<Self> {
        let engine = PlaybackEngine::new(config.engine)?;
        Ok(Self {
            engine,
            source,
            tick_interval: config.tick_interval,
        })
    }

    /// Fetch, decode, and start playing the preview at `url`.
    ///
    /// Returns immediately; progress arrives as `Loaded`/`Playing` (or
    /// `Failed`) events. Playback starts as soon as the preview is ready.
    pub fn load(&self, url: &str) {
        self.load_with_autoplay(url, true);
    }

    /// Fetch and decode without starting playback when `autoplay` is false
    pub fn load_with_autoplay(&self, url: &str, autoplay: bool) {
        let source = self.source.clone();
        let url = url.to_string();
        self.engine.load(
            Box::new(move || {
                let fetched = source.fetch(&url)?;
                decode_bytes(fetched.bytes, fetched.extension_hint.as_deref())
            }),
            autoplay,
        );
    }

    /// Load a local audio file and start playing it
    pub fn load_file(&self, path: PathBuf) {
        self.engine.load_file(path, true);
    }

    /// Load a local audio file without starting playback when `autoplay` is false
    pub fn load_file_with_autoplay(&self, path: PathBuf, autoplay: bool) {
        self.engine.load_file(path, autoplay);
    }

    /// Start or resume playback
    pub fn play(&self) {
        self.engine.play();
    }

    /// Pause playback
    pub fn pause(&self) {
        self.engine.pause();
    }

    /// Toggle between playing and paused based on the latest snapshot
    pub fn toggle(&self) {
        if self.snapshot().is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the playhead to an absolute offset in seconds
    pub fn seek(&self, seconds: f64) {
        self.engine.seek(seconds);
    }

    /// Jump forward by the configured skip step
    pub fn skip_forward(&self) {
        self.seek(self.engine.position().seconds() + SKIP_STEP_SECS);
    }

    /// Jump backward by the configured skip step
    pub fn skip_backward(&self) {
        self.seek(self.engine.position().seconds() - SKIP_STEP_SECS);
    }

    /// Stop playback and release the current preview
    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Set volume (clamped to 0.0..=2.0)
    pub fn set_volume(&self, volume: f32) {
        self.engine.set_volume(volume);
    }

    /// Capture a one-off snapshot of playback state
    pub fn snapshot(&self) -> Snapshot {
        SnapshotSource::from_engine(&self.engine).capture()
    }

    /// Start a display ticker delivering snapshots at the session cadence
    pub fn start_display<F>(&self, on_tick: F) -> Result<DisplaySync>
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        DisplaySync::start(
            SnapshotSource::from_engine(&self.engine),
            self.tick_interval,
            on_tick,
        )
    }

    /// Non-blocking poll for the next engine event
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.engine.try_recv_event()
    }

    /// Event receiver for use with `select!`
    pub fn event_receiver(&self) -> &Receiver<EngineEvent> {
        self.engine.event_receiver()
    }

    /// Graceful shutdown (consumes self)
    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}
