//! Counted reference to a database asset.

use std::sync::Arc;

use aural_common::AssetId;

use crate::audio_asset::AudioAsset;
use crate::database::AssetDatabase;

#[derive(Debug)]
struct Binding {
    database: AssetDatabase,
    id: AssetId,
    asset: Arc<AudioAsset>,
}

/// Holds one database reference to an asset and releases it on drop or
/// rebind.
#[derive(Debug, Default)]
pub struct AssetPtr {
    binding: Option<Binding>,
}

impl AssetPtr {
    /// Null pointer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebind to `id`. The new asset is acquired before the old one is
    /// released, so rebinding to the same id never unloads it. A null or
    /// unknown id leaves the pointer null.
    pub fn set_asset_id(&mut self, database: &AssetDatabase, id: &AssetId) -> bool {
        let next = if id.is_null() {
            None
        } else {
            database.acquire_asset(id).map(|asset| Binding {
                database: database.clone(),
                id: id.clone(),
                asset,
            })
        };
        let bound = next.is_some();
        let previous = std::mem::replace(&mut self.binding, next);
        if let Some(previous) = previous {
            previous.database.release_asset(&previous.id);
        }
        bound
    }

    /// Whether no asset is bound.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.binding.is_none()
    }

    /// Bound id.
    #[must_use]
    pub fn asset_id(&self) -> Option<&AssetId> {
        self.binding.as_ref().map(|b| &b.id)
    }

    /// Bound asset.
    #[must_use]
    pub fn get(&self) -> Option<&Arc<AudioAsset>> {
        self.binding.as_ref().map(|b| &b.asset)
    }

    /// Release the bound asset.
    pub fn clear(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.database.release_asset(&binding.id);
        }
    }
}

impl Drop for AssetPtr {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> (AssetDatabase, AssetId) {
        let db = AssetDatabase::new();
        let id = AssetId::new("Test:Tone");
        db.declare_asset(id.clone(), AudioAsset::new("Tone"))
            .expect("declare");
        (db, id)
    }

    #[test]
    fn test_bind_and_drop() {
        let (db, id) = database();
        {
            let mut ptr = AssetPtr::new();
            assert!(ptr.is_null());
            assert!(ptr.set_asset_id(&db, &id));
            assert_eq!(ptr.asset_id(), Some(&id));
            assert_eq!(ptr.get().map(|a| a.name().to_string()), Some("Tone".to_string()));
            assert_eq!(db.reference_count(&id), 1);
        }
        assert_eq!(db.reference_count(&id), 0);
    }

    #[test]
    fn test_rebind_same_id_keeps_one_reference() {
        let (db, id) = database();
        let mut ptr = AssetPtr::new();
        ptr.set_asset_id(&db, &id);
        ptr.set_asset_id(&db, &id);
        assert_eq!(db.reference_count(&id), 1);
    }

    #[test]
    fn test_null_and_unknown_ids() {
        let (db, id) = database();
        let mut ptr = AssetPtr::new();
        ptr.set_asset_id(&db, &id);

        assert!(!ptr.set_asset_id(&db, &AssetId::null()));
        assert!(ptr.is_null());
        assert_eq!(db.reference_count(&id), 0);

        assert!(!ptr.set_asset_id(&db, &AssetId::new("Test:Missing")));
        assert!(ptr.get().is_none());
    }

    #[test]
    fn test_clear() {
        let (db, id) = database();
        let mut ptr = AssetPtr::new();
        ptr.set_asset_id(&db, &id);
        ptr.clear();
        assert!(ptr.is_null());
        assert_eq!(db.reference_count(&id), 0);
    }
}
