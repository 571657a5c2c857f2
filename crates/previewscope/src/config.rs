//! Configuration for the previewscope engine
//!
//! Tuning constants live in nested modules; the `*Config` structs expose them
//! as overridable parameters with these values as defaults.

use std::time::Duration;

use crate::error::{PlayerError, Result};

/// Spectrum-analysis configuration
pub mod analysis {
    /// FFT window size (samples per analysis frame)
    pub const FFT_SIZE: usize = 2048;

    /// Number of frequency bands in the magnitude vector
    pub const BAND_COUNT: usize = 64;

    /// EMA weight given to the newest band reading (retained = 1 - this)
    pub const SMOOTHING_FACTOR: f32 = 0.3;

    /// Floor applied before the dB conversion, avoids log10(0)
    pub const DB_FLOOR: f32 = 1e-6;

    /// Normalization window in dB: -DB_RANGE maps to 0, 0 dB maps to 1
    pub const DB_RANGE: f32 = 60.0;
}

/// Engine scheduling configuration
pub mod engine {
    /// Engine thread command-poll interval in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 50;

    /// Default display tick rate in Hz
    pub const DISPLAY_TICK_HZ: u64 = 60;

    /// Skip step used by the session's skip forward/backward helpers (seconds)
    pub const SKIP_STEP_SECS: f64 = 10.0;
}

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("Previewscope/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Read timeout in seconds
    pub const READ_TIMEOUT_SECS: u64 = 30;
}

/// Overridable spectrum-analysis parameters.
///
/// The dB window and smoothing coefficients are empirical tuning values
/// carried as defaults, not derived quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    pub fft_size: usize,
    pub band_count: usize,
    pub smoothing_factor: f32,
    pub db_floor: f32,
    pub db_range: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: analysis::FFT_SIZE,
            band_count: analysis::BAND_COUNT,
            smoothing_factor: analysis::SMOOTHING_FACTOR,
            db_floor: analysis::DB_FLOOR,
            db_range: analysis::DB_RANGE,
        }
    }
}

impl AnalyzerConfig {
    /// Validate the configuration as an analyzer-construction precondition.
    pub fn validate(&self) -> Result<()> {
        if self.band_count == 0 {
            return Err(PlayerError::InvalidConfig(
                "band_count must be nonzero".to_string(),
            ));
        }
        if self.fft_size / 2 < self.band_count {
            return Err(PlayerError::InvalidConfig(format!(
                "fft_size/2 ({}) must be >= band_count ({})",
                self.fft_size / 2,
                self.band_count
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(PlayerError::InvalidConfig(format!(
                "smoothing_factor {} outside [0, 1]",
                self.smoothing_factor
            )));
        }
        if self.db_floor <= 0.0 || self.db_range <= 0.0 {
            return Err(PlayerError::InvalidConfig(
                "db_floor and db_range must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Playback engine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    /// How often the engine thread wakes to poll pending loads and stream end
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            poll_interval: Duration::from_millis(engine::POLL_INTERVAL_MS),
        }
    }
}

/// Session configuration (engine + display cadence)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub engine: EngineConfig,
    /// Interval between display snapshots
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            tick_interval: Duration::from_nanos(1_000_000_000 / engine::DISPLAY_TICK_HZ),
        }
    }
}
