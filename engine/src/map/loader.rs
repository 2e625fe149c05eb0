//! Tile image loading with an explicit per-path cache

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

use super::tile::{TileCatalog, TileKind};
use crate::config::TileSpec;
use crate::error::{MapError, Result};

/// Decoded images keyed by path. Repeated loads of one path share a decode.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<PathBuf, Arc<RgbaImage>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an image, decoding it only the first time its path is seen
    pub fn load(&mut self, path: &Path) -> Result<Arc<RgbaImage>> {
        if let Some(image) = self.images.get(path) {
            return Ok(Arc::clone(image));
        }
        let image = Arc::new(load_image(path)?);
        log::debug!(
            "Loaded image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        self.images.insert(path.to_path_buf(), Arc::clone(&image));
        Ok(image)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.images.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

/// Decode RGBA pixels from encoded image bytes
pub fn decode_tile_image(data: &[u8]) -> std::result::Result<RgbaImage, image::ImageError> {
    let img = image::load_from_memory(data)?;
    Ok(img.to_rgba8())
}

/// Read and decode an image file
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let data = fs::read(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_tile_image(&data).map_err(|source| MapError::Asset {
        path: path.to_path_buf(),
        source,
    })
}

impl TileCatalog {
    /// Build the catalog from tile specs; every tile image must load
    pub fn from_specs(specs: &[TileSpec], images: &mut ImageCache) -> Result<Self> {
        let kinds = specs
            .iter()
            .map(|spec| {
                let image = images.load(&spec.image)?;
                Ok(TileKind::new(spec.name.clone(), image, spec.solid))
            })
            .collect::<Result<Vec<_>>>()?;
        let catalog = Self::new(kinds)?;
        for kind in catalog.iter() {
            if kind.mask().is_none() {
                log::debug!("Tile {} has no occupancy mask", kind.name);
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_cache_shares_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "grass.png", 32, 32);

        let mut cache = ImageCache::new();
        let a = cache.load(&path).unwrap();
        let b = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&path));
    }

    #[test]
    fn test_missing_and_corrupt_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ImageCache::new();
        assert!(matches!(
            cache.load(&dir.path().join("nope.png")),
            Err(MapError::Io { .. })
        ));

        let junk = dir.path().join("junk.png");
        fs::write(&junk, b"not an image").unwrap();
        assert!(matches!(cache.load(&junk), Err(MapError::Asset { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_catalog_from_specs() {
        let dir = tempfile::tempdir().unwrap();
        let grass = write_png(dir.path(), "grass.png", 32, 32);
        let tree = write_png(dir.path(), "tree.png", 32, 64);
        let specs = vec![
            TileSpec {
                name: "grass".into(),
                image: grass.clone(),
                solid: false,
            },
            TileSpec {
                name: "tree".into(),
                image: tree,
                solid: true,
            },
            TileSpec {
                name: "meadow".into(),
                image: grass,
                solid: false,
            },
        ];

        let mut cache = ImageCache::new();
        let catalog = TileCatalog::from_specs(&specs, &mut cache).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(1).unwrap().size(), (32, 64));
        assert!(catalog.get(1).unwrap().is_solid);
        assert_eq!(cache.len(), 2);
    }
}
