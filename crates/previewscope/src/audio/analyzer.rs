//! Windowed FFT spectrum analysis
//!
//! `SpectrumAnalyzer` turns fixed-size blocks of mono samples into a smoothed
//! vector of normalized band magnitudes. The FFT plan, Hann window, and all
//! working buffers are allocated once at construction; `analyze` itself does
//! not allocate.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::AnalyzerConfig;
use crate::error::Result;

/// Stateful analyzer: one FFT pass plus exponential smoothing per block
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    band_buf: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for the given configuration
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let n = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let scratch_len = fft.get_inplace_scratch_len();

        // Hann window
        let window: Vec<f32> = (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
            .collect();

        Ok(Self {
            config,
            fft,
            window,
            fft_buf: vec![Complex::new(0.0, 0.0); n],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            band_buf: vec![0.0; config.band_count],
            smoothed: vec![0.0; config.band_count],
        })
    }

    /// Create an analyzer with the default configuration
    pub fn with_defaults() -> Self {
        // The default config passes validate() by construction.
        match Self::new(AnalyzerConfig::default()) {
            Ok(analyzer) => analyzer,
            Err(_) => unreachable!("default analyzer config is valid"),
        }
    }

    /// The configuration this analyzer was built with
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Number of samples `analyze` expects per block
    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    /// Number of bands in the output vector
    pub fn band_count(&self) -> usize {
        self.config.band_count
    }

    /// Analyze one block of mono samples.
    ///
    /// Returns the smoothed magnitude vector, or `None` when the block is not
    /// exactly `fft_size` samples long (partial tail blocks are dropped rather
    /// than zero-padded, which would dilute the magnitudes).
    pub fn analyze(&mut self, samples: &[f32]) -> Option<&[f32]> {
        let n = self.config.fft_size;
        if samples.len() != n {
            return None;
        }

        for (slot, (&s, &w)) in self
            .fft_buf
            .iter_mut()
            .zip(samples.iter().zip(self.window.iter()))
        {
            *slot = Complex::new(s * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.fft_buf, &mut self.scratch);

        // Equal-width band averages over the first N/2 bins. Magnitudes are
        // deliberately left unnormalized: the dB window below was tuned
        // against raw FFT output.
        let half = n / 2;
        let bands = self.config.band_count;
        let band_width = half / bands;
        for (band, avg) in self.band_buf.iter_mut().enumerate() {
            let start = band * band_width;
            let end = start + band_width;
            let sum: f32 = self.fft_buf[start..end].iter().map(|c| c.norm()).sum();
            *avg = sum / band_width as f32;
        }

        let alpha = self.config.smoothing_factor;
        let floor = self.config.db_floor;
        let range = self.config.db_range;
        for (smoothed, &avg) in self.smoothed.iter_mut().zip(self.band_buf.iter()) {
            let db = 20.0 * avg.max(floor).log10();
            let norm = ((db + range) / range).clamp(0.0, 1.0);
            *smoothed = *smoothed * (1.0 - alpha) + norm * alpha;
        }

        Some(&self.smoothed)
    }

    /// Clear smoothing history (used on stop and track changes)
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    /// The current smoothed magnitude vector
    pub fn magnitudes(&self) -> &[f32] {
        &self.smoothed
    }
}
