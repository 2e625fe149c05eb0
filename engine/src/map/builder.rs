//! Chunk building: padding search and tree-over-ground compositing
//!
//! A chunk is `chunk_size` × `chunk_size` tiles pre-rendered into one image.
//! Sprites taller or wider than a tile hang outside their cell, so every chunk
//! image carries a padding margin on each side. The margin is shared by all
//! chunks of a build and is grown by a bounded search until no sprite is cut.

use std::collections::HashMap;
use std::ops::Range;

use image::RgbaImage;
use image::imageops;
use serde::Deserialize;

use super::grid::{TileCoord, TileGrid};
use super::tile::{TileCatalog, anchor_offset};
use crate::error::{MapError, Result};

/// Chunk edge in tiles when none is configured
pub const DEFAULT_CHUNK_SIZE: u32 = 8;

/// Padding search gives up after this many passes
pub const MAX_PADDING_ITERATIONS: usize = 4;

/// Padding on either axis never exceeds this many tiles
pub const MAX_PADDING_TILES: u32 = 4;

/// Extra pixels around a chunk's nominal tile area, per side
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct Padding {
    pub x: u32,
    pub y: u32,
}

impl Padding {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Starting estimate: how far the largest image overhangs a cell
    pub fn for_catalog(catalog: &TileCatalog, tile_size: u32) -> Self {
        let (max_w, max_h) = catalog.max_image_size();
        Self {
            x: max_w.saturating_sub(tile_size),
            y: max_h.saturating_sub(tile_size),
        }
    }
}

/// Chunk coordinates (grid position divided by chunk size)
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i64,
    pub y: i64,
}

impl ChunkCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// What to do when padding is still too small after the search bound
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingPolicy {
    /// Log the clipped tiles and draw them cut off
    #[default]
    Degrade,
    /// Refuse to build
    Strict,
}

/// A sprite that does not fit inside its chunk image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClippedTile {
    pub chunk: ChunkCoord,
    pub tile: TileCoord,
    pub image_size: (u32, u32),
    pub local: (i64, i64),
    pub chunk_pixels: (u32, u32),
}

/// Outcome of the padding search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaddingSearch {
    pub padding: Padding,
    pub iterations: usize,
    pub converged: bool,
}

/// Diagnostics from one build
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildReport {
    pub padding: Padding,
    pub iterations: usize,
    pub converged: bool,
    pub clipped: Vec<ClippedTile>,
}

impl BuildReport {
    /// Apply the padding policy to this build
    pub fn check(&self, policy: PaddingPolicy) -> Result<()> {
        if policy == PaddingPolicy::Strict && !self.clipped.is_empty() {
            return Err(MapError::PaddingInsufficient {
                extra_x: self.padding.x,
                extra_y: self.padding.y,
                clipped: self.clipped.len(),
            });
        }
        Ok(())
    }
}

/// Chunk images produced by a build
pub struct BuiltChunks {
    pub chunks: HashMap<ChunkCoord, RgbaImage>,
    pub report: BuildReport,
}

/// Compose a tree over its ground tile. The surface is large enough for both;
/// each image is centered horizontally and rests on the bottom edge. A tree
/// wider than its ground widens the surface instead of being cropped to the
/// ground's width.
pub fn composite_tree(ground: &RgbaImage, tree: &RgbaImage) -> RgbaImage {
    let (gw, gh) = ground.dimensions();
    let (tw, th) = tree.dimensions();
    let (cw, ch) = (gw.max(tw), gh.max(th));

    let mut composite = RgbaImage::new(cw, ch);
    imageops::overlay(
        &mut composite,
        ground,
        ((cw - gw) / 2) as i64,
        (ch - gh) as i64,
    );
    imageops::overlay(&mut composite, tree, ((cw - tw) / 2) as i64, (ch - th) as i64);
    composite
}

/// The image drawn for each tile index during one build
struct SpriteTable<'a> {
    catalog: &'a TileCatalog,
    tree: Option<(usize, RgbaImage)>,
}

impl<'a> SpriteTable<'a> {
    fn new(catalog: &'a TileCatalog) -> Self {
        let tree = match (catalog.tree_index(), catalog.ground_index()) {
            (Some(tree), Some(ground)) => {
                let tree_img = catalog.get(tree).map(|k| k.image());
                let ground_img = catalog.get(ground).map(|k| k.image());
                match (tree_img, ground_img) {
                    (Some(t), Some(g)) => Some((tree, composite_tree(g, t))),
                    _ => None,
                }
            }
            _ => None,
        };
        Self { catalog, tree }
    }

    fn get(&self, index: usize) -> Option<&RgbaImage> {
        match &self.tree {
            Some((tree, composite)) if *tree == index => Some(composite),
            _ => self.catalog.get(index).map(|k| k.image()),
        }
    }
}

/// Partitions a grid into chunks and renders them
pub struct ChunkBuilder<'a> {
    grid: &'a TileGrid,
    catalog: &'a TileCatalog,
    tile_size: u32,
    chunk_size: u32,
}

impl<'a> ChunkBuilder<'a> {
    pub fn new(grid: &'a TileGrid, catalog: &'a TileCatalog, tile_size: u32, chunk_size: u32) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            grid,
            catalog,
            tile_size,
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Pixel size of every chunk image for a given padding
    pub fn chunk_pixel_size(&self, padding: Padding) -> (u32, u32) {
        let span = self.chunk_size * self.tile_size;
        (span + 2 * padding.x, span + 2 * padding.y)
    }

    /// Number of chunk columns and rows covering the grid
    pub fn chunk_counts(&self) -> (usize, usize) {
        let cs = self.chunk_size as usize;
        (
            self.grid.width().div_ceil(cs),
            self.grid.height().div_ceil(cs),
        )
    }

    /// Tile ranges covered by a chunk; the last row/column may be partial
    fn chunk_tiles(&self, cx: usize, cy: usize) -> (Range<usize>, Range<usize>) {
        let cs = self.chunk_size as usize;
        let xs = cx * cs..((cx + 1) * cs).min(self.grid.width());
        let ys = cy * cs..((cy + 1) * cs).min(self.grid.height());
        (xs, ys)
    }

    /// Top-left of an image inside its chunk
    fn local_position(&self, padding: Padding, col: usize, row: usize, size: (u32, u32)) -> (i64, i64) {
        let (x_offset, y_offset) = anchor_offset(size.0, size.1, self.tile_size);
        let tile = self.tile_size as i64;
        (
            padding.x as i64 + col as i64 * tile - x_offset,
            padding.y as i64 + row as i64 * tile - y_offset,
        )
    }

    /// Visit every placed sprite: (chunk, tile, image, local position)
    fn for_each_placement<F>(&self, sprites: &SpriteTable<'_>, padding: Padding, mut visit: F)
    where
        F: FnMut(ChunkCoord, TileCoord, &RgbaImage, (i64, i64)),
    {
        let (cols, rows) = self.chunk_counts();
        for cy in 0..rows {
            for cx in 0..cols {
                let chunk = ChunkCoord::new(cx as i64, cy as i64);
                let (xs, ys) = self.chunk_tiles(cx, cy);
                for ty in ys.clone() {
                    for tx in xs.clone() {
                        let Some(image) = self.grid.get(tx, ty).and_then(|i| sprites.get(i)) else {
                            continue;
                        };
                        let local = self.local_position(
                            padding,
                            tx - xs.start,
                            ty - ys.start,
                            image.dimensions(),
                        );
                        visit(chunk, TileCoord::new(tx, ty), image, local);
                    }
                }
            }
        }
    }

    /// Extra padding needed so every sprite fits with `padding` applied
    fn shortfall(&self, sprites: &SpriteTable<'_>, padding: Padding) -> Padding {
        let (cw, ch) = self.chunk_pixel_size(padding);
        let (cw, ch) = (cw as i64, ch as i64);
        let mut needed_x = 0i64;
        let mut needed_y = 0i64;
        self.for_each_placement(sprites, padding, |_, _, image, (lx, ly)| {
            let (w, h) = (image.width() as i64, image.height() as i64);
            needed_x = needed_x.max(-lx).max(lx + w - cw);
            needed_y = needed_y.max(-ly).max(ly + h - ch);
        });
        Padding::new(needed_x as u32, needed_y as u32)
    }

    /// Grow `start` until every sprite fits, bounded by
    /// `MAX_PADDING_ITERATIONS` passes and a ceiling of `MAX_PADDING_TILES` tiles.
    pub fn resolve_padding(&self, start: Padding) -> PaddingSearch {
        let sprites = SpriteTable::new(self.catalog);
        self.search(&sprites, start)
    }

    fn search(&self, sprites: &SpriteTable<'_>, start: Padding) -> PaddingSearch {
        let max_pad = self.tile_size * MAX_PADDING_TILES;
        let mut padding = Padding::new(start.x.min(max_pad), start.y.min(max_pad));
        if padding != start {
            log::warn!(
                "Starting padding ({}, {}) exceeds max allowed padding {}",
                start.x,
                start.y,
                max_pad
            );
        }

        for iteration in 0..MAX_PADDING_ITERATIONS {
            let mut grow = self.shortfall(sprites, padding);
            if grow.is_zero() {
                return PaddingSearch {
                    padding,
                    iterations: iteration + 1,
                    converged: true,
                };
            }

            if padding.x + grow.x > max_pad {
                grow.x = max_pad.saturating_sub(padding.x);
                log::warn!("Clamped extra_x to max allowed padding {}", max_pad);
            }
            if padding.y + grow.y > max_pad {
                grow.y = max_pad.saturating_sub(padding.y);
                log::warn!("Clamped extra_y to max allowed padding {}", max_pad);
            }

            padding.x += grow.x;
            padding.y += grow.y;
            log::info!(
                "Adjusted chunk padding, extra_x -> {}, extra_y -> {} (iteration {})",
                padding.x,
                padding.y,
                iteration + 1
            );
        }

        // The last adjustment has not been checked yet
        let converged = self.shortfall(sprites, padding).is_zero();
        if !converged {
            log::warn!(
                "Chunk padding still insufficient after {} attempts (extra_x={}, extra_y={})",
                MAX_PADDING_ITERATIONS,
                padding.x,
                padding.y
            );
        }
        PaddingSearch {
            padding,
            iterations: MAX_PADDING_ITERATIONS,
            converged,
        }
    }

    /// Render every chunk touching the grid, starting the padding search at `start`
    pub fn build(&self, start: Padding) -> BuiltChunks {
        let sprites = SpriteTable::new(self.catalog);
        let search = self.search(&sprites, start);
        let padding = search.padding;
        let (cw, ch) = self.chunk_pixel_size(padding);

        let mut chunks: HashMap<ChunkCoord, RgbaImage> = HashMap::new();
        let mut clipped = Vec::new();
        let (cols, rows) = self.chunk_counts();
        for cy in 0..rows {
            for cx in 0..cols {
                chunks.insert(ChunkCoord::new(cx as i64, cy as i64), RgbaImage::new(cw, ch));
            }
        }

        self.for_each_placement(&sprites, padding, |chunk, tile, image, (lx, ly)| {
            let (w, h) = image.dimensions();
            if lx < 0 || ly < 0 || lx + w as i64 > cw as i64 || ly + h as i64 > ch as i64 {
                clipped.push(ClippedTile {
                    chunk,
                    tile,
                    image_size: (w, h),
                    local: (lx, ly),
                    chunk_pixels: (cw, ch),
                });
            }
            if let Some(surface) = chunks.get_mut(&chunk) {
                imageops::overlay(surface, image, lx, ly);
            }
        });

        if !clipped.is_empty() {
            log::warn!(
                "Detected {} clipped tile(s) while building chunks",
                clipped.len()
            );
            for c in clipped.iter().take(6) {
                log::warn!(
                    "  chunk=({},{}) tile=({},{}) img={}x{} local=({},{}) chunk={}x{}",
                    c.chunk.x,
                    c.chunk.y,
                    c.tile.x,
                    c.tile.y,
                    c.image_size.0,
                    c.image_size.1,
                    c.local.0,
                    c.local.1,
                    c.chunk_pixels.0,
                    c.chunk_pixels.1
                );
            }
        }

        BuiltChunks {
            chunks,
            report: BuildReport {
                padding,
                iterations: search.iterations,
                converged: search.converged,
                clipped,
            },
        }
    }
}
