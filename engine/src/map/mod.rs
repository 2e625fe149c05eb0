//! Tile map with chunked rendering, caching, and pixel collision

pub mod builder;
pub mod cache;
pub mod camera;
pub mod collision;
pub mod grid;
pub mod io;
pub mod loader;
pub mod renderer;
pub mod surface;
pub mod tile;

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use builder::{DEFAULT_CHUNK_SIZE, PaddingPolicy};
use cache::{CacheStats, ChunkCache};
use camera::Camera;
use collision::{CollisionProbe, WorldRect};
use grid::TileGrid;
use renderer::{DrawStats, RenderMode, ViewportRenderer};
use surface::Surface;
use tile::{OccupancyMask, TileCatalog};

use crate::error::{MapError, Result};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Revision stamp unique within the process. Grids and catalogs take a new one
/// on construction and on every mutation, so equal stamps mean equal contents.
pub(crate) fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Construction options for a `TileMap`
#[derive(Clone, Copy, Debug)]
pub struct MapSettings {
    pub tile_size: u32,
    pub chunk_size: u32,
    pub policy: PaddingPolicy,
    pub mode: RenderMode,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            tile_size: 32,
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: PaddingPolicy::Degrade,
            mode: RenderMode::Normal,
        }
    }
}

/// Integrated tile map
pub struct TileMap {
    catalog: TileCatalog,
    grid: TileGrid,
    tile_size: u32,
    chunk_size: u32,
    mode: RenderMode,
    cache: ChunkCache,
    renderer: ViewportRenderer,
}

impl TileMap {
    /// Create a map; every grid cell must name a catalog entry
    pub fn new(catalog: TileCatalog, grid: TileGrid, settings: MapSettings) -> Result<Self> {
        if settings.tile_size == 0 {
            return Err(MapError::InvalidTileSize);
        }
        grid.validate(&catalog)?;
        let chunk_size = if settings.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            settings.chunk_size
        };
        Ok(Self {
            catalog,
            grid,
            tile_size: settings.tile_size,
            chunk_size,
            mode: settings.mode,
            cache: ChunkCache::new(settings.policy),
            renderer: ViewportRenderer::new(),
        })
    }

    /// Draw the visible part of the map, building chunks first if needed
    pub fn draw<S: Surface + ?Sized>(&mut self, surface: &mut S, camera: &Camera) -> Result<DrawStats> {
        if self
            .cache
            .ensure_built(&self.grid, &self.catalog, self.tile_size, self.chunk_size)?
        {
            log::info!(
                "Rebuilt {} chunk(s) with padding ({}, {})",
                self.cache.len(),
                self.cache.padding().x,
                self.cache.padding().y
            );
        }
        Ok(self.renderer.draw(
            surface,
            &self.cache,
            &self.grid,
            &self.catalog,
            self.tile_size,
            camera,
            self.mode,
        ))
    }

    pub fn toggle_debug(&mut self) -> RenderMode {
        self.mode = self.mode.toggled();
        log::info!("Render mode: {:?}", self.mode);
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Change tiles per chunk edge. Zero falls back to the default.
    pub fn set_chunk_size(&mut self, chunk_size: u32) {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        if chunk_size != self.chunk_size {
            self.chunk_size = chunk_size;
            self.cache.invalidate();
        }
    }

    pub fn set_policy(&mut self, policy: PaddingPolicy) {
        self.cache.set_policy(policy);
    }

    /// Swap in a new grid; the previous one is returned
    pub fn replace_grid(&mut self, grid: TileGrid) -> Result<TileGrid> {
        grid.validate(&self.catalog)?;
        self.cache.invalidate();
        Ok(std::mem::replace(&mut self.grid, grid))
    }

    /// Change one cell. Returns whether anything changed; out-of-range
    /// indices are rejected.
    pub fn set_tile(&mut self, x: usize, y: usize, index: usize) -> Result<bool> {
        if index >= self.catalog.len() {
            return Err(MapError::InvalidTileIndex {
                x,
                y,
                index,
                count: self.catalog.len(),
            });
        }
        if self.grid.get(x, y).is_none_or(|current| current == index) {
            return Ok(false);
        }
        self.grid.set(x, y, index);
        self.cache.invalidate();
        Ok(true)
    }

    /// Resize tree art to `scale` tiles tall
    pub fn scale_trees(&mut self, scale: f32) -> bool {
        let changed = self.catalog.scale_trees(self.tile_size, scale);
        if changed {
            self.cache.invalidate();
        }
        changed
    }

    /// Thin trees to roughly `density` of their count
    pub fn sparsify_trees<R: Rng>(&mut self, density: f64, clustered: bool, rng: &mut R) {
        let before = self.grid.revision();
        self.grid.sparsify_trees(&self.catalog, density, clustered, rng);
        if self.grid.revision() != before {
            self.cache.invalidate();
        }
    }

    pub fn probe(&self) -> CollisionProbe<'_> {
        CollisionProbe::new(&self.grid, &self.catalog, self.tile_size)
    }

    pub fn can_move_to(&self, rect: WorldRect, mover_mask: Option<&OccupancyMask>) -> bool {
        self.probe().can_move_to(rect, mover_mask)
    }

    pub fn last_draw_stats(&self) -> Option<&DrawStats> {
        self.renderer.last_stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn catalog(&self) -> &TileCatalog {
        &self.catalog
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// World size in pixels
    pub fn pixel_size(&self) -> (u64, u64) {
        let ts = self.tile_size as u64;
        (self.grid.width() as u64 * ts, self.grid.height() as u64 * ts)
    }
}
