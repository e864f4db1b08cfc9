//! # Aural Kernel
//!
//! The audio engine capability.
//!
//! This crate provides playback of sounds on logical channels:
//! - `audio`: the process-scoped `AudioEngine` handle with sentinel-returning
//!   operations
//! - `mixer`: sound table, channel table, listener, virtual voices
//! - `audio_backend`: voice output through rodio or a headless clock
//! - `audio_spatial`: rolloff, cone, pan and Doppler calculations
//! - `audio_resource`: handles, sound modes and cone settings
//! - `tone`: WAV synthesis for generated assets
//!
//! ## Threading
//!
//! `AudioEngine` is `Send + Sync`. The rodio backend keeps its output
//! stream on a dedicated thread; everything else runs on the caller's
//! thread under the engine lock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod audio;
pub mod audio_backend;
pub mod audio_resource;
pub mod audio_spatial;
pub mod mixer;
pub mod tone;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audio::{AudioEngine, BackendKind, EngineState};
    pub use crate::audio_backend::{AudioError, AudioResult, HeadlessClock};
    pub use crate::audio_resource::{ChannelHandle, ConeSettings, SoundHandle, SoundMode};
    pub use crate::tone::{write_wav, ToneSpec};
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_is_send_sync() {
        assert_send_sync::<AudioEngine>();
    }

    #[test]
    fn test_fresh_engine_state() {
        let engine = AudioEngine::headless(HeadlessClock::new());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(!engine.is_initialized());
    }
}
