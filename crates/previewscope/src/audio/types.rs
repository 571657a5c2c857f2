//! Shared audio types
//!
//! Pure data types used across the playback subsystem.

use std::fmt;
use std::num::NonZero;
use std::sync::Arc;

use crate::audio::decoder::DecodedTrack;
use crate::error::Result;

/// Transport state of the playback engine.
///
/// Exactly one instance is live per engine; transitions are serialized on the
/// engine thread.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Finished,
    Failed(String),
}

impl PlaybackState {
    /// States from which `seek` is accepted
    pub fn is_seekable(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Finished
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Loading => write!(f, "Loading"),
            PlaybackState::Ready => write!(f, "Ready"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
            PlaybackState::Finished => write!(f, "Finished"),
            PlaybackState::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// Metadata for the loaded track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub codec_name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel_str = if self.channels == 1 { "Mono" } else { "Stereo" };
        write!(
            f,
            "{} · {} Hz · {} · {:.0}s",
            self.codec_name, self.sample_rate, channel_str, self.duration_secs
        )
    }
}

/// A deferred load: fetches and/or decodes a track off the engine thread.
pub type LoadJob = Box<dyn FnOnce() -> Result<DecodedTrack> + Send + 'static>;

/// Commands sent to the playback engine
pub enum EngineCommand {
    /// Replace the current track with the result of `job`
    Load { job: LoadJob, autoplay: bool },
    /// Start or resume playback; restarts from 0 when Finished
    Play,
    /// Pause playback (only valid while Playing)
    Pause,
    /// Move the playhead to the given offset in seconds (clamped)
    Seek(f64),
    /// Release the track and return to Idle
    Stop,
    /// Set volume (0.0..=2.0)
    SetVolume(f32),
    /// Shut down the engine thread
    Shutdown,
}

impl fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Load { autoplay, .. } => {
                f.debug_struct("Load").field("autoplay", autoplay).finish()
            }
            EngineCommand::Play => write!(f, "Play"),
            EngineCommand::Pause => write!(f, "Pause"),
            EngineCommand::Seek(secs) => write!(f, "Seek({})", secs),
            EngineCommand::Stop => write!(f, "Stop"),
            EngineCommand::SetVolume(v) => write!(f, "SetVolume({})", v),
            EngineCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Events emitted by the playback engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A track finished loading and the engine is Ready
    Loaded(TrackInfo),
    /// Playback started or resumed
    Playing,
    /// Playback paused
    Paused,
    /// Engine returned to Idle
    Stopped,
    /// Position reached the end of the track
    Finished,
    /// Seek applied; payload is the clamped target in seconds
    SeekedTo(f64),
    /// Load failed; engine is in the Failed state
    Failed(String),
    /// A command was rejected in the current state
    Rejected(String),
}

/// One display-tick-aligned bundle of playback position and spectral state
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub position: f64,
    pub duration: f64,
    pub magnitudes: Vec<f32>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Engine state mirror shared with observers (position lives in
/// [`PositionTracker`](crate::audio::position::PositionTracker), which updates
/// at render rate rather than on the engine tick).
#[derive(Debug, Clone, Default)]
pub struct EngineStatus {
    pub state: PlaybackState,
    pub track: Option<TrackInfo>,
}

/// Thread-safe handle to the shared engine status
pub type SharedStatus = Arc<std::sync::Mutex<EngineStatus>>;

/// Create a new shared status instance
pub fn new_shared_status() -> SharedStatus {
    Arc::new(std::sync::Mutex::new(EngineStatus::default()))
}

/// Helper for constructing rodio's `NonZero` channel counts in one place
pub(crate) fn nonzero_u16(v: u16) -> NonZero<u16> {
    NonZero::new(v).unwrap_or(NonZero::<u16>::MIN)
}

/// Helper for constructing rodio's `NonZero` sample rates in one place
pub(crate) fn nonzero_u32(v: u32) -> NonZero<u32> {
    NonZero::new(v).unwrap_or(NonZero::<u32>::MIN)
}
