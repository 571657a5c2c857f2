//! Audio subsystem
//!
//! Preview decoding, playback, and windowed-FFT spectrum analysis.

pub mod analyzer;
pub mod channel;
pub mod decoder;
pub mod engine;
pub mod position;
pub mod source;
pub mod types;

pub use analyzer::SpectrumAnalyzer;
pub use channel::MagnitudeChannel;
pub use decoder::{decode_bytes, decode_file, DecodedTrack};
pub use engine::PlaybackEngine;
pub use position::PositionTracker;
pub use source::{AnalyzerTap, TrackSource};
pub use types::{
    new_shared_status, EngineCommand, EngineEvent, EngineStatus, PlaybackState, SharedStatus,
    Snapshot, TrackInfo,
};
