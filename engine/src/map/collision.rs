//! Pixel-accurate collision against solid tiles

use image::RgbaImage;

use super::grid::TileGrid;
use super::renderer::IndexRange;
use super::tile::{OccupancyMask, TileCatalog, anchor_offset};

/// Axis-aligned rectangle in world pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldRect {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
}

impl WorldRect {
    pub fn new(x: f64, y: f64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Tests rectangles against the solid tiles of a grid
pub struct CollisionProbe<'a> {
    grid: &'a TileGrid,
    catalog: &'a TileCatalog,
    tile_size: u32,
}

impl<'a> CollisionProbe<'a> {
    pub fn new(grid: &'a TileGrid, catalog: &'a TileCatalog, tile_size: u32) -> Self {
        Self {
            grid,
            catalog,
            tile_size,
        }
    }

    /// Tile columns and rows the rectangle touches
    pub fn covered_tiles(&self, rect: WorldRect) -> (IndexRange, IndexRange) {
        let ts = self.tile_size as f64;
        let right = rect.x + rect.width as f64;
        let bottom = rect.y + rect.height as f64;
        (
            IndexRange::new((rect.x / ts).floor() as i64, ((right - 1.0) / ts).floor() as i64),
            IndexRange::new((rect.y / ts).floor() as i64, ((bottom - 1.0) / ts).floor() as i64),
        )
    }

    /// First tile that blocks `rect`, if any. Cells outside the grid are open.
    pub fn blocking_tile(
        &self,
        rect: WorldRect,
        mover_mask: Option<&OccupancyMask>,
    ) -> Option<(i64, i64)> {
        if self.tile_size == 0 {
            return None;
        }
        let (xs, ys) = self.covered_tiles(rect);
        let ts = self.tile_size as i64;

        for ty in ys.iter() {
            for tx in xs.iter() {
                let Some(kind) = self.grid.get_signed(tx, ty).and_then(|i| self.catalog.get(i))
                else {
                    continue;
                };
                if !kind.is_solid {
                    continue;
                }

                match (mover_mask, kind.mask()) {
                    (Some(mover), Some(tile)) => {
                        let (w, h) = kind.size();
                        let (x_offset, y_offset) = anchor_offset(w, h, self.tile_size);
                        let tile_x = tx * ts - x_offset;
                        let tile_y = ty * ts - y_offset;
                        let offset = (
                            (tile_x as f64 - rect.x) as i64,
                            (tile_y as f64 - rect.y) as i64,
                        );
                        if mover.overlap(tile, offset).is_some() {
                            return Some((tx, ty));
                        }
                    }
                    _ => {
                        log::debug!("No mask for tile ({}, {}), using its full cell", tx, ty);
                        return Some((tx, ty));
                    }
                }
            }
        }
        None
    }

    /// Whether a mover occupying `rect` overlaps no solid tile
    pub fn can_move_to(&self, rect: WorldRect, mover_mask: Option<&OccupancyMask>) -> bool {
        self.blocking_tile(rect, mover_mask).is_none()
    }
}

/// Something that moves through the map with axis-separated collision
#[derive(Clone, Debug)]
pub struct Mover {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
    mask: Option<OccupancyMask>,
}

impl Mover {
    /// A mover whose whole bounding box is solid
    pub fn new(x: f64, y: f64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            mask: None,
        }
    }

    /// A mover shaped by its sprite's alpha
    pub fn from_image(x: f64, y: f64, image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            x,
            y,
            width,
            height,
            mask: OccupancyMask::from_image(image),
        }
    }

    pub fn mask(&self) -> Option<&OccupancyMask> {
        self.mask.as_ref()
    }

    pub fn rect_at(&self, x: f64, y: f64) -> WorldRect {
        WorldRect::new(x, y, self.width, self.height)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x + self.width as f64 / 2.0,
            self.y + self.height as f64 / 2.0,
        )
    }

    /// Move by `(dx, dy)`, resolving x then y so the mover slides along walls.
    /// Returns which axes moved.
    pub fn step(&mut self, dx: f64, dy: f64, probe: &CollisionProbe<'_>) -> (bool, bool) {
        let new_x = self.x + dx;
        let moved_x = probe.can_move_to(self.rect_at(new_x, self.y), self.mask());
        if moved_x {
            self.x = new_x;
        }

        let new_y = self.y + dy;
        let moved_y = probe.can_move_to(self.rect_at(self.x, new_y), self.mask());
        if moved_y {
            self.y = new_y;
        }
        (moved_x, moved_y)
    }

    /// Move along `direction` (normalized here) at `speed` pixels per second
    pub fn advance(
        &mut self,
        direction: (f64, f64),
        speed: f64,
        dt: f64,
        probe: &CollisionProbe<'_>,
    ) -> (bool, bool) {
        let (mut dx, mut dy) = direction;
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude > 0.0 {
            dx /= magnitude;
            dy /= magnitude;
        }
        let distance = speed * dt;
        self.step(dx * distance, dy * distance, probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::tile::TileKind;
    use crate::map::tile::tests::kind;
    use image::Rgba;
    use std::sync::Arc;

    /// grass, tree with an 8px trunk at x 12..20, opaque rock
    fn catalog() -> TileCatalog {
        let mut tree = RgbaImage::new(32, 64);
        for y in 0..64 {
            for x in 12..20 {
                tree.put_pixel(x, y, Rgba([90, 60, 20, 255]));
            }
        }
        TileCatalog::new(vec![
            kind("grass", 32, 32, false),
            TileKind::new("tree", Arc::new(tree), true),
            kind("rock", 32, 32, true),
        ])
        .unwrap()
    }

    #[test]
    fn test_non_solid_never_blocks() {
        let catalog = catalog();
        let grid = TileGrid::new(3, 3, 0);
        let probe = CollisionProbe::new(&grid, &catalog, 32);
        let full = OccupancyMask::filled(16, 16);
        for y in (0..=80).step_by(8) {
            for x in (0..=80).step_by(8) {
                let rect = WorldRect::new(x as f64, y as f64, 16, 16);
                assert!(probe.can_move_to(rect, Some(&full)));
                assert!(probe.can_move_to(rect, None));
            }
        }
    }

    #[test]
    fn test_trunk_silhouette() {
        let catalog = catalog();
        let mut grid = TileGrid::new(3, 3, 0);
        grid.set(1, 1, 1);
        let probe = CollisionProbe::new(&grid, &catalog, 32);
        let mover = OccupancyMask::filled(8, 8);

        // Beside the trunk but inside the tree's cell
        assert!(probe.can_move_to(WorldRect::new(33.0, 40.0, 8, 8), Some(&mover)));
        // On the trunk
        assert_eq!(
            probe.blocking_tile(WorldRect::new(42.0, 40.0, 8, 8), Some(&mover)),
            Some((1, 1))
        );
        // Without a mover mask the whole cell blocks
        assert!(!probe.can_move_to(WorldRect::new(33.0, 40.0, 8, 8), None));
    }

    #[test]
    fn test_outside_grid_is_open() {
        let catalog = catalog();
        let grid = TileGrid::new(2, 2, 2);
        let probe = CollisionProbe::new(&grid, &catalog, 32);
        assert!(probe.can_move_to(WorldRect::new(-50.0, -50.0, 16, 16), None));
        assert!(probe.can_move_to(WorldRect::new(64.0, 0.0, 16, 16), None));
        assert!(!probe.can_move_to(WorldRect::new(63.0, 0.0, 16, 16), None));
    }

    #[test]
    fn test_covered_tiles_edges() {
        let catalog = catalog();
        let grid = TileGrid::new(4, 4, 0);
        let probe = CollisionProbe::new(&grid, &catalog, 32);
        let (xs, ys) = probe.covered_tiles(WorldRect::new(32.0, 0.0, 32, 33));
        assert_eq!(xs, IndexRange::new(1, 1));
        assert_eq!(ys, IndexRange::new(0, 1));
        let (xs, _) = probe.covered_tiles(WorldRect::new(-0.5, 0.0, 2, 1));
        assert_eq!(xs, IndexRange::new(-1, 0));
    }

    #[test]
    fn test_step_slides_along_wall() {
        let catalog = catalog();
        let mut grid = TileGrid::new(3, 3, 0);
        for y in 0..3 {
            grid.set(1, y, 2);
        }
        let probe = CollisionProbe::new(&grid, &catalog, 32);
        let mut mover = Mover::new(10.0, 10.0, 16, 16);

        assert_eq!(mover.step(10.0, 20.0, &probe), (false, true));
        assert_eq!((mover.x, mover.y), (10.0, 30.0));
    }

    #[test]
    fn test_advance_normalizes_direction() {
        let catalog = catalog();
        let grid = TileGrid::new(10, 10, 0);
        let probe = CollisionProbe::new(&grid, &catalog, 32);
        let sprite = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        let mut mover = Mover::from_image(100.0, 100.0, &sprite);
        assert!(mover.mask().is_some());

        mover.advance((3.0, 4.0), 100.0, 0.5, &probe);
        assert!((mover.x - 130.0).abs() < 1e-9);
        assert!((mover.y - 140.0).abs() < 1e-9);
        assert_eq!(mover.center(), (mover.x + 8.0, mover.y + 8.0));
    }
}
