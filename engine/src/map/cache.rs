//! Chunk cache: built chunk images and the padding they share

use std::collections::HashMap;

use image::RgbaImage;

use super::builder::{
    BuildReport, ChunkBuilder, ChunkCoord, DEFAULT_CHUNK_SIZE, Padding, PaddingPolicy,
};
use super::grid::TileGrid;
use super::tile::TileCatalog;
use crate::error::Result;

/// One pre-rendered chunk
pub struct Chunk {
    pub image: RgbaImage,
    pub memory_size: usize,
}

/// Inputs a cache was built from; any difference means the cache is stale
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct CacheKey {
    pub catalog_revision: u64,
    pub grid_revision: u64,
    pub grid_width: usize,
    pub grid_height: usize,
    pub tile_size: u32,
    pub chunk_size: u32,
}

impl CacheKey {
    pub fn new(grid: &TileGrid, catalog: &TileCatalog, tile_size: u32, chunk_size: u32) -> Self {
        Self {
            catalog_revision: catalog.revision(),
            grid_revision: grid.revision(),
            grid_width: grid.width(),
            grid_height: grid.height(),
            tile_size,
            chunk_size,
        }
    }
}

/// Built chunks keyed by chunk coordinate. Every chunk in the cache was built
/// with the same padding from the same catalog and grid.
pub struct ChunkCache {
    chunks: Option<HashMap<ChunkCoord, Chunk>>,
    key: Option<CacheKey>,
    padding: Padding,
    chunk_size: u32,
    policy: PaddingPolicy,
    last_report: Option<BuildReport>,
}

impl ChunkCache {
    pub fn new(policy: PaddingPolicy) -> Self {
        Self {
            chunks: None,
            key: None,
            padding: Padding::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy,
            last_report: None,
        }
    }

    /// Whether a build exists for exactly these inputs
    pub fn is_built_for(&self, key: &CacheKey) -> bool {
        self.chunks.is_some() && self.key.as_ref() == Some(key)
    }

    /// Build every chunk unless a valid cache already exists.
    /// Returns whether a rebuild happened.
    pub fn ensure_built(
        &mut self,
        grid: &TileGrid,
        catalog: &TileCatalog,
        tile_size: u32,
        chunk_size: u32,
    ) -> Result<bool> {
        let key = CacheKey::new(grid, catalog, tile_size, chunk_size);
        if self.is_built_for(&key) {
            return Ok(false);
        }
        self.invalidate();

        let builder = ChunkBuilder::new(grid, catalog, tile_size, chunk_size);
        let built = builder.build(Padding::for_catalog(catalog, tile_size));
        built.report.check(self.policy)?;

        let chunks: HashMap<ChunkCoord, Chunk> = built
            .chunks
            .into_iter()
            .map(|(coord, image)| {
                let memory_size = chunk_memory_size(image.width(), image.height());
                (coord, Chunk { image, memory_size })
            })
            .collect();
        let memory: usize = chunks.values().map(|c| c.memory_size).sum();

        log::debug!(
            "Built {} chunk(s), padding ({}, {}), {} bytes",
            chunks.len(),
            built.report.padding.x,
            built.report.padding.y,
            memory
        );

        self.padding = built.report.padding;
        self.chunk_size = builder.chunk_size();
        self.chunks = Some(chunks);
        self.key = Some(key);
        self.last_report = Some(built.report);
        Ok(true)
    }

    /// Drop every chunk and the padding; the next `ensure_built` rebuilds
    pub fn invalidate(&mut self) {
        self.chunks = None;
        self.key = None;
        self.padding = Padding::default();
    }

    pub fn is_valid(&self) -> bool {
        self.chunks.is_some()
    }

    pub fn contains(&self, coord: &ChunkCoord) -> bool {
        self.chunks.as_ref().is_some_and(|c| c.contains_key(coord))
    }

    pub fn get(&self, coord: &ChunkCoord) -> Option<&Chunk> {
        self.chunks.as_ref().and_then(|c| c.get(coord))
    }

    /// Padding shared by every chunk in the cache
    pub fn padding(&self) -> Padding {
        self.padding
    }

    pub fn policy(&self) -> PaddingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: PaddingPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.invalidate();
        }
    }

    /// Chunk edge in tiles, read back from a built chunk's width
    pub fn chunk_edge(&self, tile_size: u32) -> u32 {
        if tile_size == 0 {
            return DEFAULT_CHUNK_SIZE;
        }
        let first = self.chunks.as_ref().and_then(|c| c.values().next());
        match first {
            Some(chunk) => {
                let inner = chunk.image.width().saturating_sub(2 * self.padding.x);
                (inner / tile_size).max(1)
            }
            None => DEFAULT_CHUNK_SIZE,
        }
    }

    /// Report from the most recent build
    pub fn last_report(&self) -> Option<&BuildReport> {
        self.last_report.as_ref()
    }

    pub fn len(&self) -> usize {
        self.chunks.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all cached chunk coordinates
    pub fn chunk_coords(&self) -> impl Iterator<Item = &ChunkCoord> {
        self.chunks.iter().flat_map(|c| c.keys())
    }

    /// Bytes held by all cached chunk images
    pub fn memory_used(&self) -> usize {
        self.chunks
            .as_ref()
            .map_or(0, |c| c.values().map(|chunk| chunk.memory_size).sum())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            chunk_count: self.len(),
            memory_used: self.memory_used(),
            padding: self.padding,
            chunk_size: self.chunk_size,
        }
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(PaddingPolicy::default())
    }
}

/// Cache statistics for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub chunk_count: usize,
    pub memory_used: usize,
    pub padding: Padding,
    pub chunk_size: u32,
}

/// Memory held by one RGBA8 chunk image
pub fn chunk_memory_size(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 4
}
