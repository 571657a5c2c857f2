//! Display-rate snapshot delivery
//!
//! `DisplaySync` runs a ticker thread that captures a [`Snapshot`] of
//! playback state at a fixed cadence and hands it to a callback. The ticker
//! only reads shared handles, so it never blocks the engine; `stop` joins the
//! thread, guaranteeing no callback fires after it returns.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use crate::audio::channel::MagnitudeChannel;
use crate::audio::engine::PlaybackEngine;
use crate::audio::position::PositionTracker;
use crate::audio::types::{PlaybackState, SharedStatus, Snapshot};
use crate::error::{PlayerError, Result};

/// Bundle of read-only handles a snapshot is assembled from
#[derive(Clone)]
pub struct SnapshotSource {
    status: SharedStatus,
    position: Arc<PositionTracker>,
    magnitudes: MagnitudeChannel,
}

impl SnapshotSource {
    pub fn new(
        status: SharedStatus,
        position: Arc<PositionTracker>,
        magnitudes: MagnitudeChannel,
    ) -> Self {
        Self {
            status,
            position,
            magnitudes,
        }
    }

    /// Collect handles from a running engine
    pub fn from_engine(engine: &PlaybackEngine) -> Self {
        Self::new(engine.status(), engine.position(), engine.magnitudes())
    }

    /// Capture a coherent snapshot of the current playback state
    pub fn capture(&self) -> Snapshot {
        let (is_playing, is_loading, error) = match self.status.lock() {
            Ok(guard) => (
                guard.state == PlaybackState::Playing,
                guard.state == PlaybackState::Loading,
                match guard.state {
                    PlaybackState::Failed(ref msg) => Some(msg.clone()),
                    _ => None,
                },
            ),
            Err(_) => (false, false, None),
        };

        Snapshot {
            position: self.position.seconds(),
            duration: self.position.duration_secs(),
            magnitudes: self.magnitudes.read_latest(),
            is_playing,
            is_loading,
            error,
        }
    }
}

/// Ticker thread delivering snapshots at display rate
pub struct DisplaySync {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl DisplaySync {
    /// Start delivering snapshots every `interval` to `on_tick`
    pub fn start<F>(source: SnapshotSource, interval: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let thread = thread::Builder::new()
            .name("display-sync".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => on_tick(source.capture()),
                    recv(stop_rx) -> _ => break,
                }
            })
            .map_err(|e| PlayerError::Audio(format!("Failed to spawn display thread: {}", e)))?;

        Ok(Self {
            stop_tx,
            thread: Some(thread),
        })
    }

    /// Stop the ticker and wait for it to exit (consumes self)
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DisplaySync {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
