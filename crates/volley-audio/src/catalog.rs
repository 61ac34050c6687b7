//! Asset catalog.
//!
//! The engine only needs `id -> descriptor`. [`StaticCatalog`] is the
//! in-memory implementation, filled in code or from a manifest:
//!
//! ```toml
//! [[asset]]
//! id = "Gunfire"
//! clip = { path = "sfx/gunfire.wav", duration = 0.4 }
//! min_time_between_plays = 0.05
//! max_concurrent_instances = 3
//! ```

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use serde::Deserialize;
use tracing::{debug, info};
use volley_common::{AssetId, CatalogError};

use crate::asset::AudioAsset;

/// Lookup of immutable asset descriptors.
pub trait AudioCatalog: fmt::Debug {
    /// Descriptor for `id`, if known.
    fn lookup(&self, id: &AssetId) -> Option<Arc<AudioAsset>>;

    /// Every known descriptor. Used for bulk preloading.
    fn assets(&self) -> Vec<Arc<AudioAsset>>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "asset", alias = "assets")]
    assets: Vec<AudioAsset>,
}

/// In-memory catalog.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    assets: AHashMap<AssetId, Arc<AudioAsset>>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor. Values are clamped into range on the way in.
    pub fn insert(&mut self, asset: AudioAsset) -> Result<(), CatalogError> {
        if self.assets.contains_key(&asset.id) {
            return Err(CatalogError::Duplicate(asset.id));
        }
        let asset = asset.normalized();
        debug!("Catalog: registered '{}'", asset.id);
        self.assets.insert(asset.id.clone(), Arc::new(asset));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_asset(mut self, asset: AudioAsset) -> Result<Self, CatalogError> {
        self.insert(asset)?;
        Ok(self)
    }

    /// Parses a TOML manifest of `[[asset]]` tables.
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let manifest: Manifest =
            toml::from_str(source).map_err(|e| CatalogError::InvalidManifest(e.to_string()))?;
        Self::from_manifest(manifest)
    }

    /// Parses a JSON manifest (`{"asset": [...]}`).
    pub fn from_json_str(source: &str) -> Result<Self, CatalogError> {
        let manifest: Manifest = serde_json::from_str(source)
            .map_err(|e| CatalogError::InvalidManifest(e.to_string()))?;
        Self::from_manifest(manifest)
    }

    fn from_manifest(manifest: Manifest) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for asset in manifest.assets {
            catalog.insert(asset)?;
        }
        info!("Loaded catalog manifest with {} assets", catalog.len());
        Ok(catalog)
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AudioCatalog for StaticCatalog {
    fn lookup(&self, id: &AssetId) -> Option<Arc<AudioAsset>> {
        self.assets.get(id).cloned()
    }

    fn assets(&self) -> Vec<Arc<AudioAsset>> {
        self.assets.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_common::AudioCategory;
    use volley_kernel::ClipRef;

    const MANIFEST: &str = r#"
        [[asset]]
        id = "Gunfire"
        clip = { path = "sfx/gunfire.wav", duration = 0.4 }
        min_time_between_plays = 0.05
        max_concurrent_instances = 3

        [[asset]]
        id = "Theme"
        category = "music"
        looping = true
        default_volume = 2.0
        clip = { path = "music/theme.ogg", duration = 120.0 }
    "#;

    #[test]
    fn test_toml_manifest() {
        let catalog = StaticCatalog::from_toml_str(MANIFEST).expect("manifest");
        assert_eq!(catalog.len(), 2);

        let theme = catalog.lookup(&AssetId::new("Theme")).expect("theme");
        assert_eq!(theme.category, AudioCategory::Music);
        assert!(theme.looping);
        // clamped on insert
        assert!((theme.default_volume - 1.0).abs() < f32::EPSILON);

        assert!(catalog.lookup(&AssetId::new("Missing")).is_none());
    }

    #[test]
    fn test_json_manifest() {
        let catalog = StaticCatalog::from_json_str(
            r#"{"asset": [{"id": "Click", "category": "ui",
                "clip": {"path": "ui/click.wav", "duration": 0.1}}]}"#,
        )
        .expect("manifest");
        let click = catalog.lookup(&AssetId::new("Click")).expect("click");
        assert_eq!(click.category, AudioCategory::Ui);
    }

    #[test]
    fn test_duplicate_rejected() {
        let clip = ClipRef::new("a.wav", 1.0);
        let mut catalog = StaticCatalog::new();
        catalog
            .insert(AudioAsset::new("A", clip.clone()))
            .expect("first insert");
        let err = catalog.insert(AudioAsset::new("A", clip)).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(_)));
    }

    #[test]
    fn test_invalid_manifest() {
        let err = StaticCatalog::from_toml_str("[[asset]]\nid = 5").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidManifest(_)));
    }
}
