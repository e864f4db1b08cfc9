//! ID types for emitters and assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for emitter IDs.
static EMITTER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Separator between the module and asset name parts of an [`AssetId`].
pub const ASSET_ID_SEPARATOR: char = ':';

/// Unique identifier for an audio emitter in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmitterId(u64);

impl EmitterId {
    /// Creates a new unique emitter ID.
    #[must_use]
    pub fn new() -> Self {
        Self(EMITTER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an emitter ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for EmitterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emitter#{}", self.0)
    }
}

/// Identifier of an asset in the asset database, `"<module>:<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Creates an asset ID from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds an asset ID from a module name and an asset name.
    #[must_use]
    pub fn from_parts(module: &str, name: &str) -> Self {
        Self(format!("{module}{ASSET_ID_SEPARATOR}{name}"))
    }

    /// The empty ID, used by unbound asset pointers.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Returns true for the empty ID.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the module part, if the ID has one.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.0.split_once(ASSET_ID_SEPARATOR).map(|(module, _)| module)
    }

    /// Returns the asset name part.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .split_once(ASSET_ID_SEPARATOR)
            .map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_without_module() {
        let id = AssetId::new("Loose");
        assert_eq!(id.module(), None);
        assert_eq!(id.name(), "Loose");
    }

    #[test]
    fn test_asset_id_from_parts() {
        let id = AssetId::from_parts("ToyAssets", "BeeAudio");
        assert_eq!(id.as_str(), "ToyAssets:BeeAudio");
        assert!(!id.is_null());
        assert!(AssetId::null().is_null());
    }

    #[test]
    fn test_emitter_id_raw() {
        let id = EmitterId::from_raw(7);
        assert_eq!(id.raw(), 7);
        assert_eq!(id.to_string(), "emitter#7");
    }
}
