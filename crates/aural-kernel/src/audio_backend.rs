//! Voice Backends
//!
//! A voice is one playing instance of a sound on the output device. The
//! mixer owns logical channels and drives voices through the
//! [`VoiceBackend`] trait:
//!
//! - [`RodioBackend`]: plays through rodio on the default output device
//! - [`HeadlessBackend`]: keeps voice timing against a manually advanced
//!   clock, for tests and machines without an audio device
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Mixer                              │
//! │   channels[0..N] ──── VoiceId ────┐                          │
//! └───────────────────────────────────┼──────────────────────────┘
//!                                     ▼
//!                ┌────────────────────────────────────┐
//!                │        dyn VoiceBackend            │
//!                ├──────────────────┬─────────────────┤
//!                │  RodioBackend    │ HeadlessBackend │
//!                │  Sink per voice  │ HeadlessClock   │
//!                │  output thread   │                 │
//!                └──────────────────┴─────────────────┘
//! ```
//!
//! rodio's `OutputStream` must stay on the thread that created it, so the
//! rodio backend opens it on a dedicated output thread and keeps only the
//! `Send` stream handle.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio_resource::{SampleData, SoundResource, SoundSource};

/// Identifier of a voice inside a backend.
pub type VoiceId = u64;

/// Audio engine error types.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    /// Failed to create audio sink.
    #[error("Failed to create audio sink: {0}")]
    SinkCreationFailed(String),

    /// Failed to load audio file.
    #[error("Failed to load audio file '{path}': {message}")]
    LoadFailed {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// No free channels available.
    #[error("No free channels available (max: {max})")]
    NoFreeChannels {
        /// Maximum number of channels.
        max: u32,
    },

    /// Invalid channel handle.
    #[error("Invalid channel handle")]
    InvalidHandle,

    /// Invalid sound handle.
    #[error("Invalid sound handle")]
    InvalidSound,

    /// Channel index outside the channel table or not in use.
    #[error("Invalid channel index: {0}")]
    InvalidChannelIndex(i32),

    /// Parameter outside its accepted range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Audio engine not initialized.
    #[error("Audio engine not initialized")]
    NotInitialized,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Per-side output gains of a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGains {
    /// Left channel gain.
    pub left: f32,
    /// Right channel gain.
    pub right: f32,
}

impl StereoGains {
    /// Both sides silent.
    pub const SILENT: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    /// Same gain on both sides.
    #[must_use]
    pub const fn uniform(gain: f32) -> Self {
        Self {
            left: gain,
            right: gain,
        }
    }
}

/// Playback of voices on an output.
pub trait VoiceBackend: Send + fmt::Debug {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Starts a voice for `sound` in the paused state.
    fn start_voice(&mut self, sound: &SoundResource, gains: StereoGains) -> AudioResult<VoiceId>;

    /// Pauses or resumes a voice.
    fn set_paused(&mut self, voice: VoiceId, paused: bool);

    /// Sets the output gains of a voice.
    fn set_gains(&mut self, voice: VoiceId, gains: StereoGains);

    /// Sets the playback speed (pitch) of a voice.
    fn set_speed(&mut self, voice: VoiceId, speed: f32);

    /// Stops a voice and releases it. Unknown voices are ignored.
    fn stop_voice(&mut self, voice: VoiceId);

    /// Whether a voice has run out of samples. Unknown voices are finished.
    fn is_finished(&self, voice: VoiceId) -> bool;

    /// Advances backend bookkeeping. Called once per mixer update.
    fn update(&mut self) {}

    /// Stops every voice.
    fn stop_all(&mut self);
}

/// Decodes an audio file fully into memory.
pub fn decode_file(path: &Path) -> AudioResult<SampleData> {
    let decoder = open_decoder(path)?;
    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    debug!(
        "Decoded {:?}: {} samples, {} Hz, {} channels",
        path,
        samples.len(),
        sample_rate,
        channels
    );
    Ok(SampleData::new(samples, sample_rate, channels))
}

/// Opens a file for streaming and reports its length when the format
/// allows it. Fails when the file is missing or not decodable.
pub fn probe_stream(path: &Path) -> AudioResult<Option<Duration>> {
    let decoder = open_decoder(path)?;
    Ok(decoder.total_duration())
}

fn open_reader(path: &Path) -> AudioResult<BufReader<File>> {
    let file = File::open(path).map_err(|e| AudioError::LoadFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(BufReader::new(file))
}

fn open_decoder(path: &Path) -> AudioResult<Decoder<BufReader<File>>> {
    Decoder::new(open_reader(path)?).map_err(|e| AudioError::LoadFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// ============================================
// Rodio
// ============================================

/// Gains shared between the mixer thread and the audio thread.
#[derive(Debug)]
struct GainControl {
    left: AtomicU32,
    right: AtomicU32,
}

impl GainControl {
    fn new(gains: StereoGains) -> Self {
        Self {
            left: AtomicU32::new(gains.left.to_bits()),
            right: AtomicU32::new(gains.right.to_bits()),
        }
    }

    fn store(&self, gains: StereoGains) {
        self.left.store(gains.left.to_bits(), Ordering::Relaxed);
        self.right.store(gains.right.to_bits(), Ordering::Relaxed);
    }

    fn load(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left.load(Ordering::Relaxed)),
            f32::from_bits(self.right.load(Ordering::Relaxed)),
        )
    }
}

/// Source adapter applying per-side gains. Mono input is spread to stereo.
struct GainSource<S> {
    inner: S,
    gains: Arc<GainControl>,
    pending_right: Option<f32>,
    position: u16,
}

impl<S> GainSource<S>
where
    S: Source<Item = f32>,
{
    fn new(inner: S, gains: Arc<GainControl>) -> Self {
        Self {
            inner,
            gains,
            pending_right: None,
            position: 0,
        }
    }

    fn is_mono(&self) -> bool {
        self.inner.channels() == 1
    }
}

impl<S> Iterator for GainSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if let Some(right) = self.pending_right.take() {
            return Some(right);
        }

        let sample = self.inner.next()?;
        let (left, right) = self.gains.load();

        if self.is_mono() {
            self.pending_right = Some(sample * right);
            return Some(sample * left);
        }

        let gain = if self.position % 2 == 0 { left } else { right };
        self.position = (self.position + 1) % self.inner.channels().max(1);
        Some(sample * gain)
    }
}

impl<S> Source for GainSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        let len = self.inner.current_frame_len()?;
        Some(if self.is_mono() { len * 2 } else { len })
    }

    fn channels(&self) -> u16 {
        if self.is_mono() {
            2
        } else {
            self.inner.channels()
        }
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

struct RodioVoice {
    sink: Sink,
    gains: Arc<GainControl>,
}

/// Voice backend playing through rodio on the default output device.
pub struct RodioBackend {
    handle: OutputStreamHandle,
    shutdown: Option<Sender<()>>,
    output_thread: Option<JoinHandle<()>>,
    voices: HashMap<VoiceId, RodioVoice>,
    next_voice: VoiceId,
}

impl fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RodioBackend")
            .field("voices", &self.voices.len())
            .finish_non_exhaustive()
    }
}

impl RodioBackend {
    /// Opens the default output device on a dedicated output thread.
    pub fn new() -> AudioResult<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<OutputStreamHandle, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let output_thread = std::thread::Builder::new()
            .name("aural-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        // Blocks until the backend drops its sender.
                        let _ = shutdown_rx.recv();
                    }
                    drop(stream);
                },
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                },
            })?;

        let handle = ready_rx
            .recv()
            .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?
            .map_err(AudioError::DeviceInitFailed)?;

        info!("Audio output device opened");
        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            output_thread: Some(output_thread),
            voices: HashMap::new(),
            next_voice: 1,
        })
    }

    fn append<S>(sink: &Sink, source: S, gains: &Arc<GainControl>)
    where
        S: Source<Item = f32> + Send + 'static,
    {
        sink.append(GainSource::new(source, Arc::clone(gains)));
    }
}

impl VoiceBackend for RodioBackend {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn start_voice(&mut self, sound: &SoundResource, gains: StereoGains) -> AudioResult<VoiceId> {
        let sink =
            Sink::try_new(&self.handle).map_err(|e| AudioError::SinkCreationFailed(e.to_string()))?;
        sink.pause();
        let control = Arc::new(GainControl::new(gains));

        match &sound.source {
            SoundSource::Buffered(data) => {
                let buffer = SamplesBuffer::new(
                    data.channels,
                    data.sample_rate,
                    data.samples.as_ref().clone(),
                );
                if sound.mode.looping {
                    Self::append(&sink, buffer.repeat_infinite(), &control);
                } else {
                    Self::append(&sink, buffer, &control);
                }
            },
            SoundSource::Stream { path, .. } => {
                let reader = open_reader(path)?;
                let load_failed = |e: rodio::decoder::DecoderError| AudioError::LoadFailed {
                    path: path.clone(),
                    message: e.to_string(),
                };
                if sound.mode.looping {
                    let decoder = Decoder::new_looped(reader).map_err(load_failed)?;
                    Self::append(&sink, decoder.convert_samples::<f32>(), &control);
                } else {
                    let decoder = Decoder::new(reader).map_err(load_failed)?;
                    Self::append(&sink, decoder.convert_samples::<f32>(), &control);
                }
            },
        }

        let id = self.next_voice;
        self.next_voice += 1;
        self.voices.insert(
            id,
            RodioVoice {
                sink,
                gains: control,
            },
        );
        Ok(id)
    }

    fn set_paused(&mut self, voice: VoiceId, paused: bool) {
        if let Some(v) = self.voices.get(&voice) {
            if paused {
                v.sink.pause();
            } else {
                v.sink.play();
            }
        }
    }

    fn set_gains(&mut self, voice: VoiceId, gains: StereoGains) {
        if let Some(v) = self.voices.get(&voice) {
            v.gains.store(gains);
        }
    }

    fn set_speed(&mut self, voice: VoiceId, speed: f32) {
        if let Some(v) = self.voices.get(&voice) {
            v.sink.set_speed(speed);
        }
    }

    fn stop_voice(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.remove(&voice) {
            v.sink.stop();
        }
    }

    fn is_finished(&self, voice: VoiceId) -> bool {
        self.voices.get(&voice).map_or(true, |v| v.sink.empty())
    }

    fn stop_all(&mut self) {
        for (_, v) in self.voices.drain() {
            v.sink.stop();
        }
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.stop_all();
        self.shutdown.take();
        if let Some(thread) = self.output_thread.take() {
            if thread.join().is_err() {
                warn!("Audio output thread panicked");
            }
        }
        debug!("Audio output device closed");
    }
}

// ============================================
// Headless
// ============================================

/// Manually advanced clock driving a [`HeadlessBackend`].
///
/// Clones share the same time, so a test can keep one and hand another to
/// the engine.
#[derive(Debug, Clone, Default)]
pub struct HeadlessClock {
    micros: Arc<AtomicU64>,
}

impl HeadlessClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::Relaxed);
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct HeadlessVoice {
    length: Option<Duration>,
    looping: bool,
    paused: bool,
    speed: f32,
    played: Duration,
    finished: bool,
}

/// Voice backend without an output device.
///
/// Voices consume their length as the [`HeadlessClock`] advances, scaled
/// by their speed, and finish when a non-looping voice reaches its end.
#[derive(Debug)]
pub struct HeadlessBackend {
    clock: HeadlessClock,
    last_update: Duration,
    voices: HashMap<VoiceId, HeadlessVoice>,
    next_voice: VoiceId,
}

impl HeadlessBackend {
    /// Create a headless backend driven by `clock`.
    #[must_use]
    pub fn new(clock: HeadlessClock) -> Self {
        let last_update = clock.now();
        Self {
            clock,
            last_update,
            voices: HashMap::new(),
            next_voice: 1,
        }
    }

    /// Number of live voices.
    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }
}

impl VoiceBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn start_voice(&mut self, sound: &SoundResource, _gains: StereoGains) -> AudioResult<VoiceId> {
        if let SoundSource::Stream { path, .. } = &sound.source {
            // Match rodio: a stream that vanished since creation fails to start.
            open_reader(path)?;
        }

        let id = self.next_voice;
        self.next_voice += 1;
        self.voices.insert(
            id,
            HeadlessVoice {
                length: sound.source.duration(),
                looping: sound.mode.looping,
                paused: true,
                speed: 1.0,
                played: Duration::ZERO,
                finished: false,
            },
        );
        Ok(id)
    }

    fn set_paused(&mut self, voice: VoiceId, paused: bool) {
        if let Some(v) = self.voices.get_mut(&voice) {
            v.paused = paused;
        }
    }

    fn set_gains(&mut self, _voice: VoiceId, _gains: StereoGains) {}

    fn set_speed(&mut self, voice: VoiceId, speed: f32) {
        if let Some(v) = self.voices.get_mut(&voice) {
            v.speed = speed.max(0.0);
        }
    }

    fn stop_voice(&mut self, voice: VoiceId) {
        self.voices.remove(&voice);
    }

    fn is_finished(&self, voice: VoiceId) -> bool {
        self.voices.get(&voice).map_or(true, |v| v.finished)
    }

    fn update(&mut self) {
        let now = self.clock.now();
        let delta = now.saturating_sub(self.last_update);
        self.last_update = now;

        for voice in self.voices.values_mut() {
            if voice.paused || voice.finished {
                continue;
            }
            voice.played += delta.mul_f32(voice.speed);
            if let Some(length) = voice.length {
                if !voice.looping && voice.played >= length {
                    voice.finished = true;
                }
            }
        }
    }

    fn stop_all(&mut self) {
        self.voices.clear();
    }
}
