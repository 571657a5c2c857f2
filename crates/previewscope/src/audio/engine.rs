//! Playback engine
//!
//! Runs preview playback on a dedicated thread, accepting commands via
//! crossbeam channels and emitting events back. Decode work happens on a
//! short-lived loader thread so the engine stays responsive; band magnitudes
//! flow out through a [`MagnitudeChannel`] and the playhead through a shared
//! [`PositionTracker`].

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use rodio::{DeviceSinkBuilder, Player};

use crate::config::EngineConfig;
use crate::error::{PlayerError, Result};

use super::analyzer::SpectrumAnalyzer;
use super::channel::MagnitudeChannel;
use super::decoder::DecodedTrack;
use super::position::PositionTracker;
use super::source::{AnalyzerTap, TrackSource};
use super::types::{
    new_shared_status, EngineCommand, EngineEvent, LoadJob, PlaybackState, SharedStatus,
};

/// State held while a load job runs on the loader thread
struct PendingLoad {
    result_rx: Receiver<Result<DecodedTrack>>,
    generation: u64,
    autoplay: bool,
}

/// Playback engine that manages a preview on a dedicated thread
pub struct PlaybackEngine {
    cmd_tx: Sender<EngineCommand>,
    event_rx: Receiver<EngineEvent>,
    status: SharedStatus,
    position: Arc<PositionTracker>,
    magnitudes: MagnitudeChannel,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    /// Create a new engine, spawning the engine thread.
    ///
    /// Blocks until the audio output stream is initialized (or fails).
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.analyzer.validate()?;

        let (cmd_tx, cmd_rx) = bounded::<EngineCommand>(16);
        let (event_tx, event_rx) = bounded::<EngineEvent>(64);
        let (init_tx, init_rx) = bounded::<std::result::Result<(), String>>(1);

        let status = new_shared_status();
        let position = Arc::new(PositionTracker::new());
        let magnitudes = MagnitudeChannel::new(config.analyzer.band_count);

        let status_thread = status.clone();
        let position_thread = position.clone();
        let magnitudes_thread = magnitudes.clone();

        let thread = thread::Builder::new()
            .name("playback-engine".to_string())
            .spawn(move || {
                Self::run(
                    config,
                    cmd_rx,
                    event_tx,
                    init_tx,
                    status_thread,
                    position_thread,
                    magnitudes_thread,
                );
            })
            .map_err(|e| PlayerError::Audio(format!("Failed to spawn engine thread: {}", e)))?;

        let init_result = init_rx
            .recv()
            .map_err(|_| PlayerError::Audio("Engine thread terminated during init".to_string()))?;
        init_result.map_err(PlayerError::Audio)?;

        Ok(Self {
            cmd_tx,
            event_rx,
            status,
            position,
            magnitudes,
            thread: Some(thread),
        })
    }

    /// Create an engine with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    /// Send a command to the engine
    pub fn send(&self, cmd: EngineCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// Replace the current track with the result of `job`.
    ///
    /// The job runs off the engine thread; `Loaded` (and `Playing`, when
    /// `autoplay` is set) or `Failed` is emitted when it completes.
    pub fn load(&self, job: LoadJob, autoplay: bool) {
        self.send(EngineCommand::Load { job, autoplay });
    }

    /// Load an audio file from disk
    pub fn load_file(&self, path: std::path::PathBuf, autoplay: bool) {
        self.load(
            Box::new(move || super::decoder::decode_file(&path)),
            autoplay,
        );
    }

    /// Start or resume playback
    pub fn play(&self) {
        self.send(EngineCommand::Play);
    }

    /// Pause playback
    pub fn pause(&self) {
        self.send(EngineCommand::Pause);
    }

    /// Move the playhead to `seconds` (clamped to the track bounds)
    pub fn seek(&self, seconds: f64) {
        self.send(EngineCommand::Seek(seconds));
    }

    /// Release the current track and return to Idle
    pub fn stop(&self) {
        self.send(EngineCommand::Stop);
    }

    /// Set volume (clamped to 0.0..=2.0)
    pub fn set_volume(&self, volume: f32) {
        self.send(EngineCommand::SetVolume(volume));
    }

    /// Non-blocking poll for the next event
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get a reference to the event receiver for use with `select!`
    pub fn event_receiver(&self) -> &Receiver<EngineEvent> {
        &self.event_rx
    }

    /// Get a handle to the shared status mirror
    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Get a handle to the shared position tracker
    pub fn position(&self) -> Arc<PositionTracker> {
        self.position.clone()
    }

    /// Get a handle to the magnitude channel
    pub fn magnitudes(&self) -> MagnitudeChannel {
        self.magnitudes.clone()
    }

    /// Graceful shutdown (consumes self)
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// The engine's main loop, running on the dedicated thread
    fn run(
        config: EngineConfig,
        cmd_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
        init_tx: Sender<std::result::Result<(), String>>,
        status: SharedStatus,
        position: Arc<PositionTracker>,
        magnitudes: MagnitudeChannel,
    ) {
        // Create audio output on this thread (cpal streams may be !Send)
        let mut stream = match DeviceSinkBuilder::open_default_sink() {
            Ok(s) => s,
            Err(e) => {
                let _ = init_tx.send(Err(format!("Failed to open audio output: {}", e)));
                return;
            }
        };
        stream.log_on_drop(false);

        let analyzer = match SpectrumAnalyzer::new(config.analyzer) {
            Ok(a) => Arc::new(Mutex::new(a)),
            Err(e) => {
                let _ = init_tx.send(Err(format!("{}", e)));
                return;
            }
        };

        // `stream` must be declared before `sink` so Rust drops sink first
        let sink = Player::connect_new(stream.mixer());

        let _ = init_tx.send(Ok(()));

        let mut state = PlaybackState::Idle;
        let mut track: Option<DecodedTrack> = None;
        let mut current_volume: f32 = 1.0;
        let mut pending_load: Option<PendingLoad> = None;
        // Bumped on every Load/Stop; results from older generations are stale
        let mut generation: u64 = 0;

        let set_state = |state: &mut PlaybackState,
                         status: &SharedStatus,
                         track: &Option<DecodedTrack>,
                         next: PlaybackState| {
            *state = next;
            if let Ok(mut guard) = status.lock() {
                guard.state = state.clone();
                guard.track = track.as_ref().map(|t| t.info());
            }
        };

        let reset_analysis = |magnitudes: &MagnitudeChannel| {
            if let Ok(mut a) = analyzer.lock() {
                a.reset();
            }
            magnitudes.reset();
        };

        // Queue a segment starting at `frame`; the sink stays paused until
        // the caller decides to play
        let schedule = |sink: &Player, t: &DecodedTrack, frame: u64| {
            let source = TrackSource::new(t.clone(), frame, position.clone());
            let tap = AnalyzerTap::new(source, analyzer.clone(), magnitudes.clone());
            sink.append(tap);
        };

        loop {
            match cmd_rx.recv_timeout(config.poll_interval) {
                Ok(cmd) => match cmd {
                    EngineCommand::Load { job, autoplay } => {
                        generation += 1;
                        pending_load = None;
                        sink.stop();
                        track = None;
                        position.clear();
                        reset_analysis(&magnitudes);
                        set_state(&mut state, &status, &track, PlaybackState::Loading);

                        let (result_tx, result_rx) = bounded(1);
                        let spawned = thread::Builder::new()
                            .name("track-loader".to_string())
                            .spawn(move || {
                                let _ = result_tx.send(job());
                            });
                        match spawned {
                            Ok(_) => {
                                pending_load = Some(PendingLoad {
                                    result_rx,
                                    generation,
                                    autoplay,
                                });
                            }
                            Err(e) => {
                                let msg = format!("Failed to spawn loader thread: {}", e);
                                set_state(
                                    &mut state,
                                    &status,
                                    &track,
                                    PlaybackState::Failed(msg.clone()),
                                );
                                let _ = event_tx.send(EngineEvent::Failed(msg));
                            }
                        }
                    }
                    EngineCommand::Play => match state {
                        PlaybackState::Ready | PlaybackState::Paused => {
                            if let Some(ref t) = track {
                                if sink.empty() {
                                    schedule(&sink, t, position.frame());
                                }
                                sink.set_volume(current_volume);
                                sink.play();
                                set_state(&mut state, &status, &track, PlaybackState::Playing);
                                let _ = event_tx.send(EngineEvent::Playing);
                            }
                        }
                        PlaybackState::Finished => {
                            if let Some(ref t) = track {
                                // Restart from the top after a natural finish
                                position.rebase(0);
                                sink.stop();
                                schedule(&sink, t, 0);
                                sink.set_volume(current_volume);
                                sink.play();
                                set_state(&mut state, &status, &track, PlaybackState::Playing);
                                let _ = event_tx.send(EngineEvent::Playing);
                            }
                        }
                        PlaybackState::Playing => {}
                        _ => {
                            let _ = event_tx.send(EngineEvent::Rejected(format!(
                                "cannot play while {}",
                                state
                            )));
                        }
                    },
                    EngineCommand::Pause => {
                        if state == PlaybackState::Playing {
                            sink.pause();
                            set_state(&mut state, &status, &track, PlaybackState::Paused);
                            let _ = event_tx.send(EngineEvent::Paused);
                        }
                    }
                    EngineCommand::Seek(seconds) => {
                        if state.is_seekable() {
                            if let Some(ref t) = track {
                                let frame = t.frame_at(seconds);
                                let target_secs =
                                    frame as f64 / t.sample_rate.get() as f64;
                                position.rebase(frame);
                                // stop() clears the queued segment; only a
                                // playing engine reschedules immediately
                                sink.stop();
                                if state == PlaybackState::Playing {
                                    schedule(&sink, t, frame);
                                    sink.set_volume(current_volume);
                                    sink.play();
                                } else if state == PlaybackState::Finished {
                                    set_state(&mut state, &status, &track, PlaybackState::Paused);
                                }
                                let _ = event_tx.send(EngineEvent::SeekedTo(target_secs));
                            }
                        } else {
                            let _ = event_tx.send(EngineEvent::Rejected(format!(
                                "cannot seek while {}",
                                state
                            )));
                        }
                    }
                    EngineCommand::Stop => {
                        generation += 1;
                        pending_load = None;
                        sink.stop();
                        track = None;
                        position.clear();
                        reset_analysis(&magnitudes);
                        if state != PlaybackState::Idle {
                            set_state(&mut state, &status, &track, PlaybackState::Idle);
                            let _ = event_tx.send(EngineEvent::Stopped);
                        }
                    }
                    EngineCommand::SetVolume(vol) => {
                        current_volume = vol.clamp(0.0, 2.0);
                        sink.set_volume(current_volume);
                    }
                    EngineCommand::Shutdown => {
                        sink.stop();
                        break;
                    }
                },
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    // Poll the pending load for completion
                    if let Some(ref pending) = pending_load {
                        match pending.result_rx.try_recv() {
                            Ok(result) => {
                                let p = match pending_load.take() {
                                    Some(p) => p,
                                    None => continue,
                                };
                                // Stale result: a Stop or newer Load superseded it
                                if p.generation != generation {
                                    continue;
                                }
                                match result {
                                    Ok(loaded) => {
                                        position.set_track(
                                            loaded.sample_rate.get(),
                                            loaded.frames(),
                                        );
                                        let info = loaded.info();
                                        track = Some(loaded);
                                        set_state(
                                            &mut state,
                                            &status,
                                            &track,
                                            PlaybackState::Ready,
                                        );
                                        let _ = event_tx.send(EngineEvent::Loaded(info));
                                        if p.autoplay {
                                            if let Some(ref t) = track {
                                                schedule(&sink, t, 0);
                                                sink.set_volume(current_volume);
                                                sink.play();
                                                set_state(
                                                    &mut state,
                                                    &status,
                                                    &track,
                                                    PlaybackState::Playing,
                                                );
                                                let _ = event_tx.send(EngineEvent::Playing);
                                            }
                                        }
                                    }
                                    Err(e) => {
                                        let msg = e.to_string();
                                        set_state(
                                            &mut state,
                                            &status,
                                            &track,
                                            PlaybackState::Failed(msg.clone()),
                                        );
                                        let _ = event_tx.send(EngineEvent::Failed(msg));
                                    }
                                }
                            }
                            Err(TryRecvError::Empty) => {}
                            Err(TryRecvError::Disconnected) => {
                                let p = match pending_load.take() {
                                    Some(p) => p,
                                    None => continue,
                                };
                                if p.generation != generation {
                                    continue;
                                }
                                let msg = "Loader thread panicked".to_string();
                                set_state(
                                    &mut state,
                                    &status,
                                    &track,
                                    PlaybackState::Failed(msg.clone()),
                                );
                                let _ = event_tx.send(EngineEvent::Failed(msg));
                            }
                        }
                    }

                    // Detect natural end of the preview. The last magnitude
                    // vector is kept so the visualization holds its final
                    // frame; stop/reload zero it.
                    if state == PlaybackState::Playing && sink.empty() {
                        position.rebase(position.total_frames());
                        set_state(&mut state, &status, &track, PlaybackState::Finished);
                        let _ = event_tx.send(EngineEvent::Finished);
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::decode_bytes;
    use crate::audio::types::TrackInfo;

    /// Build a minimal valid WAV file in memory
    fn make_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let bits_per_sample: u16 = 16;
        let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
        let block_align = channels * (bits_per_sample / 8);
        let data_size = (samples.len() * 2) as u32;
        let file_size = 36 + data_size;

        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        buf
    }

    /// Generate 1 second of mono sine wave
    fn make_one_second_wav() -> Vec<u8> {
        let samples: Vec<i16> = (0..44100)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
            .collect();
        make_wav(44100, 1, &samples)
    }

    /// Generate a short WAV (10ms)
    fn make_short_wav() -> Vec<u8> {
        let samples: Vec<i16> = (0..441)
            .map(|i| ((i as f32 * 0.5).sin() * 5000.0) as i16)
            .collect();
        make_wav(44100, 1, &samples)
    }

    /// Generate a tonal WAV spanning two full analysis blocks (~93ms)
    fn make_two_block_wav() -> Vec<u8> {
        let samples: Vec<i16> = (0..4096)
            .map(|i| ((i as f32 * 0.2).sin() * 12000.0) as i16)
            .collect();
        make_wav(44100, 1, &samples)
    }

    fn wav_job(wav: Vec<u8>) -> LoadJob {
        Box::new(move || decode_bytes(wav, Some("wav")))
    }

    /// Helper: wait for a specific event within a timeout
    fn wait_for_event(engine: &PlaybackEngine, timeout_ms: u64) -> Option<EngineEvent> {
        let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(evt) = engine.try_recv_event() {
                return Some(evt);
            }
            if std::time::Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(25));
        }
    }

    /// Helper: try to create an engine; return None if audio hardware is unavailable
    fn try_engine() -> Option<PlaybackEngine> {
        PlaybackEngine::with_defaults().ok()
    }

    /// Helper: load a clip and wait until Loaded, returning the track info
    fn load_and_wait(engine: &PlaybackEngine, wav: Vec<u8>) -> TrackInfo {
        engine.load(wav_job(wav), false);
        match wait_for_event(engine, 2000) {
            Some(EngineEvent::Loaded(info)) => info,
            other => panic!("Expected Loaded event, got {:?}", other),
        }
    }

    // --- Lifecycle ---

    #[test]
    fn create_and_shutdown() {
        let Some(engine) = try_engine() else { return };
        engine.shutdown();
    }

    #[test]
    fn drop_triggers_shutdown() {
        let Some(engine) = try_engine() else { return };
        drop(engine);
        // If we get here without hanging, shutdown worked
    }

    #[test]
    fn create_multiple_engines_sequentially() {
        for _ in 0..3 {
            let Some(engine) = try_engine() else { return };
            engine.shutdown();
        }
    }

    #[test]
    fn invalid_config_rejected_before_spawn() {
        let config = EngineConfig {
            analyzer: crate::config::AnalyzerConfig {
                band_count: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(PlaybackEngine::new(config).is_err());
    }

    // --- Loading ---

    #[test]
    fn load_emits_loaded_with_track_info() {
        let Some(engine) = try_engine() else { return };

        let info = load_and_wait(&engine, make_one_second_wav());
        assert_eq!(info.channels, 1);
        assert_eq!(info.sample_rate, 44100);
        assert!((info.duration_secs - 1.0).abs() < 0.01);

        engine.shutdown();
    }

    #[test]
    fn load_without_autoplay_stays_ready() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        thread::sleep(Duration::from_millis(100));

        let status = engine.status();
        let guard = status.lock().unwrap();
        assert_eq!(guard.state, PlaybackState::Ready);
        assert!(guard.track.is_some());

        drop(guard);
        engine.shutdown();
    }

    #[test]
    fn load_with_autoplay_emits_loaded_then_playing() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_one_second_wav()), true);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Loaded(_)) => {}
            other => panic!("Expected Loaded, got {:?}", other),
        }
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            other => panic!("Expected Playing, got {:?}", other),
        }

        engine.shutdown();
    }

    #[test]
    fn load_sets_position_duration() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        let position = engine.position();
        assert!((position.duration_secs() - 1.0).abs() < 0.01);
        assert_eq!(position.seconds(), 0.0);

        engine.shutdown();
    }

    #[test]
    fn load_invalid_data_emits_failed() {
        let Some(engine) = try_engine() else { return };

        engine.load(Box::new(|| decode_bytes(vec![0u8; 100], None)), true);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Failed(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected Failed event, got {:?}", other),
        }

        let status = engine.status();
        assert!(matches!(
            status.lock().unwrap().state,
            PlaybackState::Failed(_)
        ));

        engine.shutdown();
    }

    #[test]
    fn engine_recovers_after_failed_load() {
        let Some(engine) = try_engine() else { return };

        engine.load(Box::new(|| decode_bytes(vec![0u8; 100], None)), false);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Failed(_)) => {}
            other => panic!("Expected Failed, got {:?}", other),
        }

        // Engine should still work
        let info = load_and_wait(&engine, make_one_second_wav());
        assert_eq!(info.channels, 1);

        engine.shutdown();
    }

    #[test]
    fn load_replaces_current_track() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());

        let wav2 = make_wav(48000, 2, &vec![0i16; 96000]);
        let info = load_and_wait(&engine, wav2);
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.channels, 2);

        engine.shutdown();
    }

    #[test]
    fn stop_during_load_discards_stale_result() {
        let Some(engine) = try_engine() else { return };

        // A slow job that completes after the stop
        engine.load(
            Box::new(|| {
                thread::sleep(Duration::from_millis(300));
                decode_bytes(make_one_second_wav(), Some("wav"))
            }),
            true,
        );
        engine.stop();

        // The stale load must produce neither Loaded nor Playing
        thread::sleep(Duration::from_millis(800));
        while let Some(evt) = engine.try_recv_event() {
            assert!(
                !matches!(evt, EngineEvent::Loaded(_) | EngineEvent::Playing),
                "stale load leaked event {:?}",
                evt
            );
        }
        assert_eq!(engine.status().lock().unwrap().state, PlaybackState::Idle);

        engine.shutdown();
    }

    // --- Play / Pause ---

    #[test]
    fn play_pause_resume_cycle() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());

        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            other => panic!("Expected Playing, got {:?}", other),
        }

        engine.pause();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Paused) => {}
            other => panic!("Expected Paused, got {:?}", other),
        }

        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            other => panic!("Expected Playing after resume, got {:?}", other),
        }

        engine.shutdown();
    }

    #[test]
    fn play_without_track_is_rejected() {
        let Some(engine) = try_engine() else { return };

        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Rejected(msg)) => assert!(msg.contains("Idle")),
            other => panic!("Expected Rejected, got {:?}", other),
        }

        engine.shutdown();
    }

    #[test]
    fn pause_when_not_playing_is_noop() {
        let Some(engine) = try_engine() else { return };

        engine.pause();
        thread::sleep(Duration::from_millis(200));
        assert!(
            engine.try_recv_event().is_none(),
            "Pause when idle should not emit event"
        );

        engine.shutdown();
    }

    #[test]
    fn double_pause_only_emits_once() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            other => panic!("Expected Playing, got {:?}", other),
        }

        engine.pause();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Paused) => {}
            other => panic!("Expected Paused, got {:?}", other),
        }

        engine.pause();
        thread::sleep(Duration::from_millis(200));
        assert!(engine.try_recv_event().is_none());

        engine.shutdown();
    }

    #[test]
    fn position_advances_during_playback() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            _ => {
                engine.shutdown();
                return;
            }
        }

        thread::sleep(Duration::from_millis(400));
        let position = engine.position();
        assert!(
            position.seconds() > 0.0,
            "position should advance while playing"
        );
        assert!(position.seconds() <= position.duration_secs() + 1e-9);

        engine.shutdown();
    }

    // --- Finish ---

    #[test]
    fn short_clip_finishes_naturally() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_short_wav()), true);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Loaded(_)) => {}
            other => panic!("Expected Loaded, got {:?}", other),
        }
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            other => panic!("Expected Playing, got {:?}", other),
        }

        match wait_for_event(&engine, 3000) {
            Some(EngineEvent::Finished) => {}
            other => panic!("Expected Finished for short clip, got {:?}", other),
        }

        // Position pins to the end on finish
        let position = engine.position();
        assert!((position.seconds() - position.duration_secs()).abs() < 1e-9);

        engine.shutdown();
    }

    #[test]
    fn finish_retains_last_magnitudes_until_stop() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_two_block_wav()), true);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            match engine.try_recv_event() {
                Some(EngineEvent::Finished) => break,
                Some(_) => continue,
                None if std::time::Instant::now() >= deadline => {
                    panic!("never saw Finished")
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        }

        // The visualization holds its final frame after a natural finish
        let latest = engine.magnitudes().read_latest();
        assert!(
            latest.iter().any(|&v| v > 0.0),
            "finish should keep the last vector, got all zeros"
        );

        engine.stop();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Stopped) => {}
            other => panic!("Expected Stopped, got {:?}", other),
        }
        thread::sleep(Duration::from_millis(100));
        assert!(
            engine.magnitudes().read_latest().iter().all(|&v| v == 0.0),
            "stop should zero the magnitudes"
        );

        engine.shutdown();
    }

    #[test]
    fn play_after_finish_restarts_from_zero() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_short_wav()), true);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            match engine.try_recv_event() {
                Some(EngineEvent::Finished) => break,
                Some(_) => continue,
                None if std::time::Instant::now() >= deadline => {
                    panic!("never saw Finished")
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        }

        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            other => panic!("Expected Playing after finish, got {:?}", other),
        }

        engine.shutdown();
    }

    // --- Seek ---

    #[test]
    fn seek_while_ready_moves_playhead() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        engine.seek(0.5);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::SeekedTo(secs)) => assert!((secs - 0.5).abs() < 0.001),
            other => panic!("Expected SeekedTo, got {:?}", other),
        }

        let position = engine.position();
        assert!((position.seconds() - 0.5).abs() < 0.001);

        engine.shutdown();
    }

    #[test]
    fn seek_clamps_to_duration() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        engine.seek(99.0);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::SeekedTo(secs)) => assert!((secs - 1.0).abs() < 0.001),
            other => panic!("Expected SeekedTo clamped to end, got {:?}", other),
        }

        engine.seek(-5.0);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::SeekedTo(secs)) => assert_eq!(secs, 0.0),
            other => panic!("Expected SeekedTo clamped to start, got {:?}", other),
        }

        engine.shutdown();
    }

    #[test]
    fn seek_while_playing_keeps_playing() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            _ => {
                engine.shutdown();
                return;
            }
        }

        engine.seek(0.5);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::SeekedTo(_)) => {}
            other => panic!("Expected SeekedTo, got {:?}", other),
        }

        thread::sleep(Duration::from_millis(100));
        assert_eq!(
            engine.status().lock().unwrap().state,
            PlaybackState::Playing
        );
        let position = engine.position();
        assert!(position.seconds() >= 0.5);

        engine.shutdown();
    }

    #[test]
    fn seek_while_idle_is_rejected() {
        let Some(engine) = try_engine() else { return };

        engine.seek(1.0);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Rejected(msg)) => assert!(msg.contains("seek")),
            other => panic!("Expected Rejected, got {:?}", other),
        }

        engine.shutdown();
    }

    #[test]
    fn seek_after_finish_resumes_from_target() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_short_wav()), true);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            match engine.try_recv_event() {
                Some(EngineEvent::Finished) => break,
                Some(_) => continue,
                None if std::time::Instant::now() >= deadline => {
                    panic!("never saw Finished")
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        }

        engine.seek(0.0);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::SeekedTo(secs)) => assert_eq!(secs, 0.0),
            other => panic!("Expected SeekedTo, got {:?}", other),
        }

        // Seeking out of Finished leaves the engine paused at the target
        thread::sleep(Duration::from_millis(100));
        assert_eq!(engine.status().lock().unwrap().state, PlaybackState::Paused);

        engine.shutdown();
    }

    // --- Stop ---

    #[test]
    fn stop_returns_to_idle_and_clears_track() {
        let Some(engine) = try_engine() else { return };

        load_and_wait(&engine, make_one_second_wav());
        engine.play();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Playing) => {}
            _ => {
                engine.shutdown();
                return;
            }
        }

        engine.stop();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Stopped) => {}
            other => panic!("Expected Stopped, got {:?}", other),
        }

        let status = engine.status();
        let guard = status.lock().unwrap();
        assert_eq!(guard.state, PlaybackState::Idle);
        assert!(guard.track.is_none());
        drop(guard);

        let position = engine.position();
        assert_eq!(position.seconds(), 0.0);
        assert_eq!(position.duration_secs(), 0.0);

        engine.shutdown();
    }

    #[test]
    fn stop_when_idle_does_not_emit_event() {
        let Some(engine) = try_engine() else { return };

        engine.stop();
        thread::sleep(Duration::from_millis(200));
        assert!(
            engine.try_recv_event().is_none(),
            "Stop when already idle should not emit event"
        );

        engine.shutdown();
    }

    #[test]
    fn stop_resets_magnitudes() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_one_second_wav()), true);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Loaded(_)) => {}
            _ => {
                engine.shutdown();
                return;
            }
        }

        // Let some audio render to build up magnitudes
        thread::sleep(Duration::from_millis(300));

        engine.stop();
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Stopped) => {}
            _ => {}
        }
        thread::sleep(Duration::from_millis(100));

        let latest = engine.magnitudes().read_latest();
        assert!(
            latest.iter().all(|&v| v == 0.0),
            "magnitudes should reset after stop"
        );

        engine.shutdown();
    }

    // --- Volume ---

    #[test]
    fn set_volume_does_not_crash() {
        let Some(engine) = try_engine() else { return };
        engine.set_volume(0.5);
        engine.set_volume(0.0);
        engine.set_volume(2.0);
        engine.set_volume(5.0); // should clamp to 2.0
        engine.set_volume(-1.0); // should clamp to 0.0
        engine.shutdown();
    }

    #[test]
    fn set_volume_during_playback() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_one_second_wav()), true);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Loaded(_)) => {}
            _ => {
                engine.shutdown();
                return;
            }
        }

        engine.set_volume(0.0);
        thread::sleep(Duration::from_millis(50));
        engine.set_volume(1.0);

        engine.shutdown();
    }

    // --- Shared handles ---

    #[test]
    fn magnitudes_start_at_zero() {
        let Some(engine) = try_engine() else { return };

        let latest = engine.magnitudes().read_latest();
        assert_eq!(latest.len(), crate::config::analysis::BAND_COUNT);
        assert!(latest.iter().all(|&v| v == 0.0));

        engine.shutdown();
    }

    #[test]
    fn magnitudes_become_nonzero_during_playback() {
        let Some(engine) = try_engine() else { return };

        engine.load(wav_job(make_one_second_wav()), true);
        match wait_for_event(&engine, 2000) {
            Some(EngineEvent::Loaded(_)) => {}
            _ => {
                engine.shutdown();
                return;
            }
        }

        // Give the render thread time to push a few FFT blocks through
        thread::sleep(Duration::from_millis(400));

        let latest = engine.magnitudes().read_latest();
        assert!(
            latest.iter().any(|&v| v > 0.0),
            "tonal playback should produce nonzero magnitudes"
        );

        engine.shutdown();
    }

    #[test]
    fn status_returns_same_arc() {
        let Some(engine) = try_engine() else { return };
        let s1 = engine.status();
        let s2 = engine.status();
        assert!(Arc::ptr_eq(&s1, &s2));
        engine.shutdown();
    }

    #[test]
    fn position_returns_same_arc() {
        let Some(engine) = try_engine() else { return };
        let p1 = engine.position();
        let p2 = engine.position();
        assert!(Arc::ptr_eq(&p1, &p2));
        engine.shutdown();
    }

    // --- Rapid command sequences ---

    #[test]
    fn rapid_load_stop_sequence() {
        let Some(engine) = try_engine() else { return };

        for _ in 0..5 {
            engine.load(wav_job(make_one_second_wav()), true);
            engine.stop();
        }
        thread::sleep(Duration::from_millis(500));

        // Engine should still be responsive
        let info = load_and_wait(&engine, make_one_second_wav());
        assert_eq!(info.channels, 1);

        engine.shutdown();
    }

    #[test]
    fn send_raw_shutdown_command() {
        let Some(engine) = try_engine() else { return };

        engine.send(EngineCommand::Shutdown);
        thread::sleep(Duration::from_millis(200));
        drop(engine);
    }
}
