//! # Aural Engine
//!
//! Runtime layer that binds audio assets to live channels.
//!
//! - `source`: what a scene object needs from an audio source
//! - `provider`: the asset-to-channel state machine
//! - `emitter`: scene object that owns a provider and mirrors its position
//! - `scene`: scheduler that ticks only active providers
//! - `script`: global audio functions by asset id and channel index
//! - `timing`: fixed tick accumulator
//! - `config`: runtime configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod emitter;
pub mod provider;
pub mod scene;
pub mod script;
pub mod source;
pub mod timing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::AuralConfig;
    pub use crate::emitter::{AudioEmitter, EmitterDebugInfo};
    pub use crate::provider::{AudioEndCallback, AudioProvider, ProviderState};
    pub use crate::scene::AudioScene;
    pub use crate::script::AudioFunctions;
    pub use crate::source::AudioSource;
    pub use crate::timing::TickTimer;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_scene_is_send() {
        assert_send::<AudioScene>();
        assert_send::<AudioProvider>();
    }
}
