//! Sample-accurate playback position
//!
//! `PositionTracker` derives the playhead from a seek-base frame offset plus
//! a rendered-frame counter incremented by the render path. Seeking rebases
//! the offset and zeroes the counter, so position reads are immediate even
//! while the underlying sink reschedules asynchronously.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Lock-free position state shared between the engine, the render source,
/// and display-rate readers.
#[derive(Debug, Default)]
pub struct PositionTracker {
    base_frames: AtomicU64,
    rendered_frames: AtomicU64,
    sample_rate: AtomicU32,
    total_frames: AtomicU64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a track's dimensions and rewind to zero
    pub fn set_track(&self, sample_rate: u32, total_frames: u64) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.total_frames.store(total_frames, Ordering::Relaxed);
        self.rebase(0);
    }

    /// Clear all state (no track loaded)
    pub fn clear(&self) {
        self.sample_rate.store(0, Ordering::Relaxed);
        self.total_frames.store(0, Ordering::Relaxed);
        self.rebase(0);
    }

    /// Re-base the playhead at the given frame, zeroing the rendered counter
    pub fn rebase(&self, frame: u64) {
        let frame = frame.min(self.total_frames.load(Ordering::Relaxed));
        self.base_frames.store(frame, Ordering::Relaxed);
        self.rendered_frames.store(0, Ordering::Relaxed);
    }

    /// Record rendered frames (called from the render path)
    pub fn record_rendered(&self, frames: u64) {
        self.rendered_frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Current playhead frame, saturated at the track length
    pub fn frame(&self) -> u64 {
        let absolute = self
            .base_frames
            .load(Ordering::Relaxed)
            .saturating_add(self.rendered_frames.load(Ordering::Relaxed));
        absolute.min(self.total_frames.load(Ordering::Relaxed))
    }

    /// Current playhead in seconds, in `[0, duration]`; 0.0 with no track
    pub fn seconds(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.frame() as f64 / rate as f64
    }

    /// Track duration in seconds; 0.0 with no track
    pub fn duration_secs(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.total_frames.load(Ordering::Relaxed) as f64 / rate as f64
    }

    /// Total frames of the loaded track
    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Relaxed)
    }

    /// Sample rate of the loaded track (0 when none)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }
}
