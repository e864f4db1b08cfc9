//! Spatial Audio
//!
//! Computes how a positional channel is heard from the listener:
//! - **Linear rolloff**: full volume inside the minimum distance, silent
//!   at the maximum distance, linear in between
//! - **Stereo panning**: left/right balance from the source's position
//!   relative to the listener's facing
//! - **Cone attenuation**: directional sources get quieter as the
//!   listener moves out of their cone
//! - **Doppler effect**: pitch shift from relative velocity
//!
//! # Example
//!
//! ```
//! use aural_kernel::audio_spatial::{ListenerData, SpatialAudioProcessor, SpatialSource};
//! use glam::Vec3;
//!
//! let mut processor = SpatialAudioProcessor::new();
//! processor.set_listener(ListenerData::default());
//!
//! let source = SpatialSource::new(Vec3::new(5.0, 0.0, 0.0)).with_distances(1.0, 10.0);
//! let params = processor.calculate(&source);
//! assert!(params.audible);
//! assert!(params.pan > 0.0);
//! ```

use std::f32::consts::{FRAC_PI_4, SQRT_2};

use glam::Vec3;
use tracing::debug;

use crate::audio_resource::{ConeSettings, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_DISTANCE};

/// Speed of sound in world units per second (for Doppler calculations).
pub const SPEED_OF_SOUND: f32 = 343.0;

/// Minimum volume threshold for audibility.
pub const MIN_AUDIBLE_VOLUME: f32 = 0.001;

/// Linear rolloff between a minimum and maximum distance.
///
/// Returns 1.0 at or inside `min_distance` and 0.0 at or beyond
/// `max_distance`. A range where `max <= min` behaves as a hard cutoff at
/// `min_distance`.
#[must_use]
pub fn linear_rolloff(distance: f32, min_distance: f32, max_distance: f32) -> f32 {
    if distance <= min_distance {
        return 1.0;
    }
    let range = max_distance - min_distance;
    if range <= 0.0 {
        return 0.0;
    }
    (1.0 - (distance - min_distance) / range).clamp(0.0, 1.0)
}

/// Converts a cone heading in degrees to a unit vector in the X/Y plane.
#[must_use]
pub fn cone_vector_from_degrees(degrees: f32) -> Vec3 {
    let radians = degrees.to_radians();
    Vec3::new(radians.cos(), radians.sin(), 0.0)
}

/// Converts a cone vector back to a heading in degrees, in `(-180, 180]`.
#[must_use]
pub fn degrees_from_cone_vector(vector: Vec3) -> f32 {
    vector.y.atan2(vector.x).to_degrees()
}

/// Volume multiplier of a cone for a listener in direction `to_listener`.
///
/// The inside and outside angles are full cone widths, so a listener at
/// `angle` off the cone axis is compared against half of each.
#[must_use]
pub fn cone_attenuation(cone: &ConeSettings, orientation: Vec3, to_listener: Vec3) -> f32 {
    if cone.is_omnidirectional() {
        return 1.0;
    }
    let (Some(axis), Some(dir)) = (orientation.try_normalize(), to_listener.try_normalize()) else {
        return 1.0;
    };

    let angle = axis.dot(dir).clamp(-1.0, 1.0).acos().to_degrees();
    let inside = cone.inside_angle * 0.5;
    let outside = cone.outside_angle * 0.5;

    if angle <= inside {
        1.0
    } else if angle >= outside || outside <= inside {
        cone.outside_volume
    } else {
        let t = (angle - inside) / (outside - inside);
        1.0 + (cone.outside_volume - 1.0) * t
    }
}

/// Stereo gains for a pan position in `[-1, 1]`.
///
/// Constant power law scaled so the center position leaves both sides at
/// full gain.
#[must_use]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (
        (angle.cos() * SQRT_2).min(1.0),
        (angle.sin() * SQRT_2).min(1.0),
    )
}

/// Listener position and orientation for spatial calculations.
#[derive(Debug, Clone, Copy)]
pub struct ListenerData {
    /// Position in world coordinates.
    pub position: Vec3,
    /// Velocity for Doppler effect (world units per second).
    pub velocity: Vec3,
    /// Facing direction (normalized vector).
    pub forward: Vec3,
    /// Master volume multiplier (0.0-1.0).
    pub volume: f32,
}

impl Default for ListenerData {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::Y,
            volume: 1.0,
        }
    }
}

impl ListenerData {
    /// Create a listener at a position.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Vector pointing to the listener's right in the X/Y plane.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.forward.y, -self.forward.x, 0.0)
    }
}

/// Positional channel data for spatial calculations.
#[derive(Debug, Clone, Copy)]
pub struct SpatialSource {
    /// Position in world coordinates.
    pub position: Vec3,
    /// Velocity for Doppler effect (world units per second).
    pub velocity: Vec3,
    /// Channel volume (0.0-1.0).
    pub volume: f32,
    /// Distance inside which the source is at full volume.
    pub min_distance: f32,
    /// Distance at which the source becomes silent.
    pub max_distance: f32,
    /// Directional cone.
    pub cone: ConeSettings,
    /// Direction the cone points in.
    pub cone_orientation: Vec3,
}

impl Default for SpatialSource {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            volume: 1.0,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            cone: ConeSettings::default(),
            cone_orientation: Vec3::X,
        }
    }
}

impl SpatialSource {
    /// Create a new source at a position.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the rolloff distances.
    #[must_use]
    pub const fn with_distances(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    /// Set the cone and the direction it points in.
    #[must_use]
    pub const fn with_cone(mut self, cone: ConeSettings, orientation: Vec3) -> Self {
        self.cone = cone;
        self.cone_orientation = orientation;
        self
    }

    /// Set velocity for Doppler effect.
    #[must_use]
    pub const fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }
}

/// Calculated spatial audio parameters for playback.
#[derive(Debug, Clone, Copy)]
pub struct SpatialParams {
    /// Left channel gain (0.0-1.0).
    pub left_volume: f32,
    /// Right channel gain (0.0-1.0).
    pub right_volume: f32,
    /// Pitch multiplier from Doppler.
    pub pitch: f32,
    /// Distance from listener.
    pub distance: f32,
    /// Pan position (-1.0 = full left, 0.0 = center, 1.0 = full right).
    pub pan: f32,
    /// Volume after rolloff and cone, before panning.
    pub mono_volume: f32,
    /// Whether the source is audible at all.
    pub audible: bool,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self::silent()
    }
}

impl SpatialParams {
    /// Create non-audible params.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            left_volume: 0.0,
            right_volume: 0.0,
            pitch: 1.0,
            distance: 0.0,
            pan: 0.0,
            mono_volume: 0.0,
            audible: false,
        }
    }
}

/// Spatial processor holding the listener and Doppler settings.
#[derive(Debug)]
pub struct SpatialAudioProcessor {
    listener: ListenerData,
    doppler_enabled: bool,
    doppler_factor: f32,
    speed_of_sound: f32,
}

impl Default for SpatialAudioProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialAudioProcessor {
    /// Create a new spatial audio processor.
    #[must_use]
    pub fn new() -> Self {
        debug!("Created spatial audio processor");
        Self {
            listener: ListenerData::default(),
            doppler_enabled: true,
            doppler_factor: 1.0,
            speed_of_sound: SPEED_OF_SOUND,
        }
    }

    /// Set the listener state.
    pub fn set_listener(&mut self, listener: ListenerData) {
        self.listener = listener;
    }

    /// Update listener position and velocity.
    pub fn set_listener_attributes(&mut self, position: Vec3, velocity: Vec3) {
        self.listener.position = position;
        self.listener.velocity = velocity;
    }

    /// Update listener facing (will be normalized).
    pub fn set_listener_forward(&mut self, forward: Vec3) {
        if let Some(forward) = forward.try_normalize() {
            self.listener.forward = forward;
        }
    }

    /// Get the current listener state.
    #[must_use]
    pub const fn listener(&self) -> &ListenerData {
        &self.listener
    }

    /// Enable or disable Doppler effect.
    pub fn set_doppler_enabled(&mut self, enabled: bool) {
        self.doppler_enabled = enabled;
    }

    /// Set Doppler effect strength.
    pub fn set_doppler_factor(&mut self, factor: f32) {
        self.doppler_factor = factor.clamp(0.0, 2.0);
    }

    /// Calculate spatial parameters for a positional source.
    #[must_use]
    pub fn calculate(&self, source: &SpatialSource) -> SpatialParams {
        let offset = source.position - self.listener.position;
        let distance = offset.length();

        let rolloff = linear_rolloff(distance, source.min_distance, source.max_distance);
        let cone = cone_attenuation(&source.cone, source.cone_orientation, -offset);
        let mono_volume = source.volume * rolloff * cone * self.listener.volume;

        if mono_volume < MIN_AUDIBLE_VOLUME {
            return SpatialParams {
                distance,
                mono_volume,
                ..SpatialParams::silent()
            };
        }

        let pan = if distance > 0.01 {
            (offset / distance).dot(self.listener.right()).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let (left, right) = pan_gains(pan);

        let pitch = if self.doppler_enabled && distance > 0.01 {
            self.calculate_doppler(source, offset / distance)
        } else {
            1.0
        };

        SpatialParams {
            left_volume: mono_volume * left,
            right_volume: mono_volume * right,
            pitch,
            distance,
            pan,
            mono_volume,
            audible: true,
        }
    }

    /// Doppler pitch multiplier along the listener-to-source direction.
    fn calculate_doppler(&self, source: &SpatialSource, direction: Vec3) -> f32 {
        // Positive listener speed means moving toward the source.
        let listener_vel = self.listener.velocity.dot(direction);
        // Positive source speed means moving away from the listener.
        let source_vel = source.velocity.dot(direction);

        let numerator = self.speed_of_sound + listener_vel * self.doppler_factor;
        let denominator = self.speed_of_sound + source_vel * self.doppler_factor;

        if denominator.abs() > 0.01 {
            (numerator / denominator).clamp(0.25, 4.0)
        } else {
            1.0
        }
    }
}
