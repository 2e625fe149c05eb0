//! Viewport renderer: culls to the visible chunks and blits them

use std::time::Duration;

use web_time::Instant;

use super::builder::{ChunkCoord, Padding};
use super::cache::ChunkCache;
use super::camera::Camera;
use super::grid::TileGrid;
use super::surface::{CHUNK_BORDER, ScreenRect, Surface, TILE_BOUNDS};
use super::tile::{TileCatalog, anchor_offset};

/// Whether debug overlays are drawn on top of the map
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RenderMode {
    #[default]
    Normal,
    /// Chunk borders and per-tile sprite bounds
    Debug,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Normal => RenderMode::Debug,
            RenderMode::Debug => RenderMode::Normal,
        }
    }
}

/// Inclusive index range; empty when `start > end`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexRange {
    pub start: i64,
    pub end: i64,
}

impl IndexRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self { start: 0, end: -1 }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, value: i64) -> bool {
        self.start <= value && value <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

/// Tiles and chunks that can contribute pixels to the viewport
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VisibleRange {
    pub tiles_x: IndexRange,
    pub tiles_y: IndexRange,
    pub chunks_x: IndexRange,
    pub chunks_y: IndexRange,
}

impl VisibleRange {
    pub fn is_empty(&self) -> bool {
        self.tiles_x.is_empty() || self.tiles_y.is_empty()
    }
}

/// Compute the visible tile range, widened by the padding expressed in whole
/// tiles and clamped to the grid, and the chunk range that covers it.
pub fn visible_range(
    camera: &Camera,
    grid_width: usize,
    grid_height: usize,
    tile_size: u32,
    padding: Padding,
    chunk_edge: u32,
) -> VisibleRange {
    if grid_width == 0 || grid_height == 0 || tile_size == 0 || chunk_edge == 0 {
        return VisibleRange {
            tiles_x: IndexRange::empty(),
            tiles_y: IndexRange::empty(),
            chunks_x: IndexRange::empty(),
            chunks_y: IndexRange::empty(),
        };
    }
    let ts = tile_size as i64;
    let (left, top, right, bottom) = camera.pixel_bounds();

    let extra_tiles_x = (padding.x as i64 + ts - 1) / ts;
    let extra_tiles_y = (padding.y as i64 + ts - 1) / ts;

    let tiles_x = IndexRange::new(
        (left.div_euclid(ts) - extra_tiles_x).max(0),
        (right.div_euclid(ts) + extra_tiles_x).min(grid_width as i64 - 1),
    );
    let tiles_y = IndexRange::new(
        (top.div_euclid(ts) - extra_tiles_y).max(0),
        (bottom.div_euclid(ts) + extra_tiles_y).min(grid_height as i64 - 1),
    );

    let cs = chunk_edge as i64;
    let to_chunks = |tiles: IndexRange| {
        if tiles.is_empty() {
            IndexRange::empty()
        } else {
            IndexRange::new(tiles.start.div_euclid(cs), tiles.end.div_euclid(cs))
        }
    };

    VisibleRange {
        tiles_x,
        tiles_y,
        chunks_x: to_chunks(tiles_x),
        chunks_y: to_chunks(tiles_y),
    }
}

/// Timing and blit counts from the last frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_time: Duration,
    pub chunk_blits: usize,
    pub visible_cx: IndexRange,
    pub visible_cy: IndexRange,
}

impl DrawStats {
    pub fn draw_ms(&self) -> f64 {
        self.draw_time.as_secs_f64() * 1000.0
    }
}

/// Draws the visible part of a chunk cache
#[derive(Debug, Default)]
pub struct ViewportRenderer {
    last_stats: Option<DrawStats>,
}

impl ViewportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats published by the most recent `draw`
    pub fn last_stats(&self) -> Option<&DrawStats> {
        self.last_stats.as_ref()
    }

    /// Screen rectangle of a chunk image
    fn chunk_rect(
        coord: ChunkCoord,
        size: (u32, u32),
        chunk_edge: u32,
        tile_size: u32,
        padding: Padding,
        camera: &Camera,
    ) -> ScreenRect {
        let span = chunk_edge as f64 * tile_size as f64;
        let x = coord.x as f64 * span - padding.x as f64 - camera.x;
        let y = coord.y as f64 * span - padding.y as f64 - camera.y;
        ScreenRect::new(x as i64, y as i64, size.0, size.1)
    }

    /// Blit every cached chunk that intersects the viewport. The cache must
    /// already be built for `grid` and `catalog`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        cache: &ChunkCache,
        grid: &TileGrid,
        catalog: &TileCatalog,
        tile_size: u32,
        camera: &Camera,
        mode: RenderMode,
    ) -> DrawStats {
        let padding = cache.padding();
        let chunk_edge = cache.chunk_edge(tile_size);
        let range = visible_range(
            camera,
            grid.width(),
            grid.height(),
            tile_size,
            padding,
            chunk_edge,
        );

        let start = Instant::now();
        let mut chunk_blits = 0;
        if !range.is_empty() {
            for cy in range.chunks_y.iter() {
                for cx in range.chunks_x.iter() {
                    let coord = ChunkCoord::new(cx, cy);
                    let Some(chunk) = cache.get(&coord) else {
                        continue;
                    };
                    let rect = Self::chunk_rect(
                        coord,
                        chunk.image.dimensions(),
                        chunk_edge,
                        tile_size,
                        padding,
                        camera,
                    );
                    surface.blit(&chunk.image, rect.x, rect.y);
                    chunk_blits += 1;
                }
            }
        }

        let stats = DrawStats {
            draw_time: start.elapsed(),
            chunk_blits,
            visible_cx: range.chunks_x,
            visible_cy: range.chunks_y,
        };
        self.last_stats = Some(stats);

        if mode == RenderMode::Debug && !range.is_empty() {
            Self::draw_chunk_borders(surface, cache, &range, chunk_edge, tile_size, camera);
            Self::draw_tile_bounds(surface, grid, catalog, &range, tile_size, camera);
        }
        stats
    }

    fn draw_chunk_borders<S: Surface + ?Sized>(
        surface: &mut S,
        cache: &ChunkCache,
        range: &VisibleRange,
        chunk_edge: u32,
        tile_size: u32,
        camera: &Camera,
    ) {
        for cy in range.chunks_y.iter() {
            for cx in range.chunks_x.iter() {
                let coord = ChunkCoord::new(cx, cy);
                if let Some(chunk) = cache.get(&coord) {
                    let rect = Self::chunk_rect(
                        coord,
                        chunk.image.dimensions(),
                        chunk_edge,
                        tile_size,
                        cache.padding(),
                        camera,
                    );
                    surface.outline_rect(rect, CHUNK_BORDER);
                }
            }
        }
    }

    fn draw_tile_bounds<S: Surface + ?Sized>(
        surface: &mut S,
        grid: &TileGrid,
        catalog: &TileCatalog,
        range: &VisibleRange,
        tile_size: u32,
        camera: &Camera,
    ) {
        let ts = tile_size as f64;
        for ty in range.tiles_y.iter() {
            for tx in range.tiles_x.iter() {
                let Some(kind) = grid.get_signed(tx, ty).and_then(|i| catalog.get(i)) else {
                    continue;
                };
                let (w, h) = kind.size();
                let (x_offset, y_offset) = anchor_offset(w, h, tile_size);
                let x = (tx as f64 * ts - camera.x - x_offset as f64) as i64;
                let y = (ty as f64 * ts - camera.y - y_offset as f64) as i64;
                surface.outline_rect(ScreenRect::new(x, y, w, h), TILE_BOUNDS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::tile::tests::kind;
    use image::{Rgba, RgbaImage};

    /// Records blits instead of drawing them
    #[derive(Default)]
    struct RecordingSurface {
        blits: Vec<(i64, i64, u32, u32)>,
        outlines: Vec<(ScreenRect, Rgba<u8>)>,
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (640, 480)
        }

        fn blit(&mut self, image: &RgbaImage, x: i64, y: i64) {
            self.blits.push((x, y, image.width(), image.height()));
        }

        fn fill_rect(&mut self, _rect: ScreenRect, _color: Rgba<u8>) {}

        fn outline_rect(&mut self, rect: ScreenRect, color: Rgba<u8>) {
            self.outlines.push((rect, color));
        }
    }

    fn catalog() -> TileCatalog {
        TileCatalog::new(vec![kind("grass", 32, 32, false), kind("tree", 32, 64, true)]).unwrap()
    }

    #[test]
    fn test_visible_range_expands_by_padding() {
        let camera = Camera::new(320.0, 320.0, 64, 64);
        let range = visible_range(&camera, 100, 100, 32, Padding::new(0, 40), 8);
        assert_eq!(range.tiles_x, IndexRange::new(10, 12));
        // 40px of padding rounds up to two tiles each way
        assert_eq!(range.tiles_y, IndexRange::new(8, 14));
        assert_eq!(range.chunks_x, IndexRange::new(1, 1));
        assert_eq!(range.chunks_y, IndexRange::new(1, 1));
    }

    #[test]
    fn test_visible_range_clamps_to_grid() {
        let camera = Camera::new(-20.0, -20.0, 64, 64);
        let range = visible_range(&camera, 4, 4, 32, Padding::default(), 8);
        assert_eq!(range.tiles_x, IndexRange::new(0, 1));
        assert_eq!(range.chunks_x, IndexRange::new(0, 0));

        let before = Camera::new(-100.0, -100.0, 64, 64);
        assert!(visible_range(&before, 4, 4, 32, Padding::default(), 8).is_empty());

        let far = Camera::new(10_000.0, 0.0, 64, 64);
        let range = visible_range(&far, 4, 4, 32, Padding::default(), 8);
        assert!(range.is_empty());
        assert!(range.chunks_x.is_empty());
    }

    #[test]
    fn test_draw_blits_only_visible_chunks() {
        let catalog = catalog();
        let grid = TileGrid::new(64, 64, 0);
        let mut cache = ChunkCache::default();
        cache.ensure_built(&grid, &catalog, 32, 8).unwrap();
        assert_eq!(cache.len(), 64);

        let camera = Camera::new(300.0, 10.0, 200, 100);
        let mut renderer = ViewportRenderer::new();
        let mut surface = RecordingSurface::default();
        let stats = renderer.draw(
            &mut surface,
            &cache,
            &grid,
            &catalog,
            32,
            &camera,
            RenderMode::Normal,
        );

        // tiles x 9..=15, y 0..=4 (padding y=32 adds one row each side)
        assert_eq!(stats.visible_cx, IndexRange::new(1, 1));
        assert_eq!(stats.visible_cy, IndexRange::new(0, 0));
        assert_eq!(stats.chunk_blits, 1);
        assert_eq!(surface.blits, vec![(256 - 300, -32 - 10, 256, 320)]);
        assert!(surface.outlines.is_empty());
        assert_eq!(renderer.last_stats(), Some(&stats));
    }

    #[test]
    fn test_blit_position_truncates() {
        let catalog = catalog();
        let grid = TileGrid::new(8, 8, 0);
        let mut cache = ChunkCache::default();
        cache.ensure_built(&grid, &catalog, 32, 8).unwrap();

        let camera = Camera::new(0.75, -0.5, 100, 100);
        let mut surface = RecordingSurface::default();
        ViewportRenderer::new().draw(
            &mut surface,
            &cache,
            &grid,
            &catalog,
            32,
            &camera,
            RenderMode::Normal,
        );
        // -0.75 and -31.5 truncate toward zero
        assert_eq!(surface.blits[0].0, 0);
        assert_eq!(surface.blits[0].1, -31);
    }

    #[test]
    fn test_debug_overlays() {
        let catalog = catalog();
        let mut grid = TileGrid::new(2, 2, 0);
        grid.set(1, 1, 1);
        let mut cache = ChunkCache::default();
        cache.ensure_built(&grid, &catalog, 32, 8).unwrap();

        let camera = Camera::new(0.0, 0.0, 64, 64);
        let mut surface = RecordingSurface::default();
        ViewportRenderer::new().draw(
            &mut surface,
            &cache,
            &grid,
            &catalog,
            32,
            &camera,
            RenderMode::Debug,
        );

        let borders: Vec<_> = surface
            .outlines
            .iter()
            .filter(|(_, c)| *c == CHUNK_BORDER)
            .collect();
        assert_eq!(borders.len(), 1);
        assert_eq!(borders[0].0, ScreenRect::new(0, -32, 256, 320));

        let tiles: Vec<_> = surface
            .outlines
            .iter()
            .filter(|(_, c)| *c == TILE_BOUNDS)
            .map(|(r, _)| *r)
            .collect();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&ScreenRect::new(32, 0, 32, 64)));
    }

    #[test]
    fn test_empty_grid_draws_nothing() {
        let catalog = catalog();
        let grid = TileGrid::new(0, 0, 0);
        let mut cache = ChunkCache::default();
        cache.ensure_built(&grid, &catalog, 32, 8).unwrap();

        let mut surface = RecordingSurface::default();
        let stats = ViewportRenderer::new().draw(
            &mut surface,
            &cache,
            &grid,
            &catalog,
            32,
            &Camera::default(),
            RenderMode::Debug,
        );
        assert_eq!(stats.chunk_blits, 0);
        assert!(surface.blits.is_empty());
        assert!(surface.outlines.is_empty());
    }

    #[test]
    fn test_render_mode_toggle() {
        assert_eq!(RenderMode::Normal.toggled(), RenderMode::Debug);
        assert_eq!(RenderMode::Debug.toggled(), RenderMode::Normal);
    }
}
