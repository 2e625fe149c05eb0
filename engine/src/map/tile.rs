//! Tile types, occupancy masks and the tile catalog

use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};

use super::next_revision;
use crate::error::{MapError, Result};

/// Name of the tile type that gets composited over ground and rescaled
pub const TREE_TILE: &str = "tree";

/// Ground types a tree is composited onto, in order of preference
pub const GROUND_TILES: [&str; 2] = ["grass", "dirt"];

/// Per-pixel occupancy derived from image alpha
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl OccupancyMask {
    /// Pixels with alpha strictly above this count as occupied
    pub const ALPHA_THRESHOLD: u8 = 127;

    /// Build a mask from an image. Returns `None` for degenerate (empty) images.
    pub fn from_image(image: &RgbaImage) -> Option<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        let bits = image
            .pixels()
            .map(|p| p.0[3] > Self::ALPHA_THRESHOLD)
            .collect();
        Some(Self {
            width,
            height,
            bits,
        })
    }

    /// A mask with every pixel set
    pub fn filled(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![true; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Read a pixel; anything outside the mask is unset
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.bits[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Number of occupied pixels
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// First pixel (in this mask's coordinates) set in both masks, with `other`
    /// placed at `offset` relative to this mask's origin.
    pub fn overlap(&self, other: &OccupancyMask, offset: (i64, i64)) -> Option<(u32, u32)> {
        let (ox, oy) = offset;
        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + other.width as i64).min(self.width as i64);
        let y1 = (oy + other.height as i64).min(self.height as i64);

        for y in y0..y1 {
            for x in x0..x1 {
                if self.get(x, y) && other.get(x - ox, y - oy) {
                    return Some((x as u32, y as u32));
                }
            }
        }
        None
    }
}

/// Offset that anchors an image to its tile cell: centered horizontally,
/// resting on the cell's bottom edge.
pub fn anchor_offset(width: u32, height: u32, tile_size: u32) -> (i64, i64) {
    let x_offset = (width as i64 - tile_size as i64).div_euclid(2);
    let y_offset = (height as i64 - tile_size as i64).max(0);
    (x_offset, y_offset)
}

/// A single tile type
#[derive(Clone, Debug)]
pub struct TileKind {
    pub name: String,
    pub is_solid: bool,
    image: Arc<RgbaImage>,
    mask: Option<OccupancyMask>,
}

impl TileKind {
    pub fn new(name: impl Into<String>, image: Arc<RgbaImage>, is_solid: bool) -> Self {
        let mask = OccupancyMask::from_image(&image);
        Self {
            name: name.into(),
            is_solid,
            image,
            mask,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn mask(&self) -> Option<&OccupancyMask> {
        self.mask.as_ref()
    }

    /// Image size in pixels
    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Replace the image; the mask is rebuilt from the new pixels
    pub fn set_image(&mut self, image: Arc<RgbaImage>) {
        self.mask = OccupancyMask::from_image(&image);
        self.image = image;
    }

    /// Smoothly rescale the image to `width` × `height`
    pub fn rescale(&mut self, width: u32, height: u32) {
        let scaled = imageops::resize(&*self.image, width, height, FilterType::Triangle);
        self.set_image(Arc::new(scaled));
    }
}

/// Ordered set of tile types; grid cells index into it
#[derive(Clone, Debug)]
pub struct TileCatalog {
    kinds: Vec<TileKind>,
    revision: u64,
}

impl TileCatalog {
    pub fn new(kinds: Vec<TileKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(MapError::EmptyCatalog);
        }
        Ok(Self {
            kinds,
            revision: next_revision(),
        })
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TileKind> {
        self.kinds.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileKind> {
        self.kinds.iter()
    }

    /// Bumped on every image change; chunk caches compare against it
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.kinds.iter().position(|k| k.name == name)
    }

    pub fn tree_index(&self) -> Option<usize> {
        self.index_of(TREE_TILE)
    }

    /// Ground type trees are composited onto: grass, falling back to dirt
    pub fn ground_index(&self) -> Option<usize> {
        GROUND_TILES.iter().find_map(|name| self.index_of(name))
    }

    /// Largest image width and height across the catalog
    pub fn max_image_size(&self) -> (u32, u32) {
        self.kinds.iter().fold((0, 0), |(w, h), kind| {
            let (kw, kh) = kind.size();
            (w.max(kw), h.max(kh))
        })
    }

    /// Replace one tile type's image
    pub fn replace_image(&mut self, index: usize, image: Arc<RgbaImage>) -> bool {
        match self.kinds.get_mut(index) {
            Some(kind) => {
                kind.set_image(image);
                self.revision = next_revision();
                true
            }
            None => false,
        }
    }

    /// Rescale every tree so its height is `tile_size * scale` pixels,
    /// preserving aspect ratio. Returns whether any image changed.
    pub fn scale_trees(&mut self, tile_size: u32, scale: f32) -> bool {
        let desired_h = ((tile_size as f32 * scale) as u32).max(1);
        let mut changed = false;
        for kind in self.kinds.iter_mut().filter(|k| k.name == TREE_TILE) {
            let (w, h) = kind.size();
            if h == desired_h || h == 0 {
                continue;
            }
            let new_w = ((w as f64 * (desired_h as f64 / h as f64)) as u32).max(1);
            log::debug!("Scaling {} from {}x{} to {}x{}", kind.name, w, h, new_w, desired_h);
            kind.rescale(new_w, desired_h);
            changed = true;
        }
        if changed {
            self.revision = next_revision();
        }
        changed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    pub fn kind(name: &str, width: u32, height: u32, solid: bool) -> TileKind {
        TileKind::new(name, solid_image(width, height, [40, 160, 40, 255]), solid)
    }

    #[test]
    fn test_anchor_offset() {
        assert_eq!(anchor_offset(32, 32, 32), (0, 0));
        assert_eq!(anchor_offset(32, 64, 32), (0, 32));
        assert_eq!(anchor_offset(64, 128, 32), (16, 96));
        // Narrower than a cell: floor division goes negative
        assert_eq!(anchor_offset(29, 16, 32), (-2, 0));
    }

    #[test]
    fn test_mask_from_alpha() {
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        img.put_pixel(2, 1, Rgba([0, 0, 0, 127]));
        img.put_pixel(3, 1, Rgba([0, 0, 0, 128]));
        let mask = OccupancyMask::from_image(&img).unwrap();
        assert!(mask.get(1, 0));
        assert!(!mask.get(2, 1));
        assert!(mask.get(3, 1));
        assert_eq!(mask.count(), 2);
        assert!(OccupancyMask::from_image(&RgbaImage::new(0, 5)).is_none());
    }

    #[test]
    fn test_mask_overlap_offsets() {
        let a = OccupancyMask::filled(4, 4);
        let b = OccupancyMask::filled(2, 2);
        assert_eq!(a.overlap(&b, (3, 3)), Some((3, 3)));
        assert_eq!(a.overlap(&b, (-1, -1)), Some((0, 0)));
        assert_eq!(a.overlap(&b, (4, 0)), None);
        assert_eq!(a.overlap(&b, (-2, 0)), None);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = TileCatalog::new(vec![
            kind("dirt", 32, 32, false),
            kind("grass", 32, 32, false),
            kind("tree", 32, 64, true),
        ])
        .unwrap();
        assert_eq!(catalog.tree_index(), Some(2));
        assert_eq!(catalog.ground_index(), Some(1));
        assert_eq!(catalog.max_image_size(), (32, 64));
        assert!(TileCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_ground_falls_back_to_dirt() {
        let catalog =
            TileCatalog::new(vec![kind("water", 32, 32, false), kind("dirt", 32, 32, false)])
                .unwrap();
        assert_eq!(catalog.ground_index(), Some(1));
    }

    #[test]
    fn test_scale_trees_renews_revision() {
        let mut catalog =
            TileCatalog::new(vec![kind("grass", 32, 32, false), kind("tree", 16, 32, true)])
                .unwrap();
        let before = catalog.revision();
        assert!(catalog.scale_trees(32, 2.0));
        assert_eq!(catalog.get(1).unwrap().size(), (32, 64));
        assert_eq!(catalog.get(1).unwrap().mask().unwrap().height(), 64);
        let scaled = catalog.revision();
        assert_ne!(scaled, before);

        // Already at the target height
        assert!(!catalog.scale_trees(32, 2.0));
        assert_eq!(catalog.revision(), scaled);
    }
}
