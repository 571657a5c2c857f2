//! Playback sources
//!
//! `TrackSource` plays a decoded preview from an arbitrary frame offset and
//! feeds the shared position tracker as it renders. `AnalyzerTap` wraps any
//! f32 source, downmixes to mono, and runs full FFT blocks through a shared
//! [`SpectrumAnalyzer`], publishing each result to a [`MagnitudeChannel`].

use std::num::NonZero;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::Source;

use crate::audio::analyzer::SpectrumAnalyzer;
use crate::audio::channel::MagnitudeChannel;
use crate::audio::decoder::DecodedTrack;
use crate::audio::position::PositionTracker;

/// Renders a decoded track starting at a frame offset
pub struct TrackSource {
    track: DecodedTrack,
    cursor: usize,
    samples_into_frame: u16,
    position: Arc<PositionTracker>,
}

impl TrackSource {
    /// Create a source positioned at `start_frame` (clamped to track length)
    pub fn new(track: DecodedTrack, start_frame: u64, position: Arc<PositionTracker>) -> Self {
        let start_frame = start_frame.min(track.frames());
        let cursor = start_frame as usize * track.channels.get() as usize;
        Self {
            track,
            cursor,
            samples_into_frame: 0,
            position,
        }
    }
}

impl Iterator for TrackSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = *self.track.samples.get(self.cursor)?;
        self.cursor += 1;
        self.samples_into_frame += 1;
        // Count whole frames only; a torn frame at EOF never happens because
        // the decoder truncates trailing partial frames
        if self.samples_into_frame == self.track.channels.get() {
            self.samples_into_frame = 0;
            self.position.record_rendered(1);
        }
        Some(sample)
    }
}

impl Source for TrackSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> NonZero<u16> {
        self.track.channels
    }

    fn sample_rate(&self) -> NonZero<u32> {
        self.track.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.track.duration_secs()))
    }
}

/// Wrapper source that taps rendered samples for spectrum analysis
pub struct AnalyzerTap<S> {
    inner: S,
    channels: NonZero<u16>,
    sample_rate: NonZero<u32>,
    analyzer: Arc<Mutex<SpectrumAnalyzer>>,
    output: MagnitudeChannel,
    mono_buf: Vec<f32>,
    frame_sum: f32,
    frame_fill: u16,
    fft_size: usize,
}

impl<S> AnalyzerTap<S>
where
    S: Source<Item = f32>,
{
    /// Wrap `source`, analyzing its output with the shared analyzer
    pub fn new(
        source: S,
        analyzer: Arc<Mutex<SpectrumAnalyzer>>,
        output: MagnitudeChannel,
    ) -> Self {
        let channels = source.channels();
        let sample_rate = source.sample_rate();
        let fft_size = match analyzer.lock() {
            Ok(a) => a.fft_size(),
            Err(_) => crate::config::analysis::FFT_SIZE,
        };
        Self {
            inner: source,
            channels,
            sample_rate,
            analyzer,
            output,
            mono_buf: Vec::with_capacity(fft_size),
            frame_sum: 0.0,
            frame_fill: 0,
            fft_size,
        }
    }

    fn analyze_block(&mut self) {
        if let Ok(mut analyzer) = self.analyzer.lock() {
            if let Some(bands) = analyzer.analyze(&self.mono_buf) {
                self.output.publish(bands);
            }
        }
        self.mono_buf.clear();
    }
}

impl<S> Iterator for AnalyzerTap<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;

        self.frame_sum += sample;
        self.frame_fill += 1;
        if self.frame_fill == self.channels.get() {
            self.mono_buf
                .push(self.frame_sum / self.channels.get() as f32);
            self.frame_sum = 0.0;
            self.frame_fill = 0;

            if self.mono_buf.len() == self.fft_size {
                self.analyze_block();
            }
        }

        Some(sample)
    }
}

impl<S> Source for AnalyzerTap<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> NonZero<u16> {
        self.channels
    }

    fn sample_rate(&self) -> NonZero<u32> {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
