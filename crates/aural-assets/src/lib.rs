//! # Aural Assets
//!
//! Audio asset model and the asset database.
//!
//! - `audio_asset`: `AudioAsset`, its persisted record and refresh observers
//! - `database`: id lookup, lazy loading, reference counting and hot reload
//! - `asset_ptr`: counted asset references for emitters
//! - `asset_path`: module-relative path expansion and collapse
//! - `hot_reload`: polling file watcher

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod asset_path;
pub mod asset_ptr;
pub mod audio_asset;
pub mod database;
pub mod error;
pub mod hot_reload;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::asset_ptr::AssetPtr;
    pub use crate::audio_asset::{AssetObserver, AudioAsset, AudioAssetData, AudioAssetRecord};
    pub use crate::database::AssetDatabase;
    pub use crate::error::{AssetError, AssetResult};
    pub use crate::hot_reload::HotReloadConfig;
}

pub use prelude::*;
