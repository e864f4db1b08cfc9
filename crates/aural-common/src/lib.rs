//! # Aural Common
//!
//! Common types, utilities, and shared abstractions for Aural.
//!
//! This crate provides foundational types used across all Aural subsystems:
//! - ID types (AssetId, EmitterId)
//! - Float comparison and clamping helpers
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod float;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::float::*;
    pub use crate::ids::*;
    pub use glam::{Vec2, Vec3};
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_id_generation() {
        let id1 = EmitterId::new();
        let id2 = EmitterId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_asset_id_parts() {
        let id = AssetId::new("ToyAssets:FireAudio");
        assert_eq!(id.module(), Some("ToyAssets"));
        assert_eq!(id.name(), "FireAudio");
    }
}
