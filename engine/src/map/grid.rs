//! Tile grid: the 2D array of tile-type indices that makes up a map

use rand::Rng;

use super::next_revision;
use super::tile::TileCatalog;
use crate::error::{MapError, Result};

/// Grid coordinates in tile units
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileCoord {
    pub x: usize,
    pub y: usize,
}

impl TileCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Row-major grid of tile indices
#[derive(Clone, Debug)]
pub struct TileGrid {
    width: usize,
    height: usize,
    cells: Vec<usize>,
    revision: u64,
}

impl PartialEq for TileGrid {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }
}

impl Eq for TileGrid {}

impl TileGrid {
    /// Create a grid with every cell set to `fill`
    pub fn new(width: usize, height: usize, fill: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width * height],
            revision: next_revision(),
        }
    }

    /// Build a grid from rows; every row must have the same length
    pub fn from_rows(rows: Vec<Vec<usize>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(width * height);
        for (row, cells_in_row) in rows.into_iter().enumerate() {
            if cells_in_row.len() != width {
                return Err(MapError::RaggedGrid {
                    row,
                    expected: width,
                    found: cells_in_row.len(),
                });
            }
            cells.extend(cells_in_row);
        }
        Ok(Self {
            width,
            height,
            cells,
            revision: next_revision(),
        })
    }

    /// Parse a text map: one row per non-empty line, one digit per cell
    pub fn parse_text(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let row = line
                .chars()
                .map(|ch| {
                    ch.to_digit(10).map(|d| d as usize).ok_or_else(|| MapError::MalformedMap {
                        line: line_no + 1,
                        reason: format!("unexpected character {:?}", ch),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Check that every cell refers to a tile type in `catalog`
    pub fn validate(&self, catalog: &TileCatalog) -> Result<()> {
        let count = catalog.len();
        match self.cells.iter().position(|&index| index >= count) {
            Some(pos) => Err(MapError::InvalidTileIndex {
                x: pos % self.width,
                y: pos / self.width,
                index: self.cells[pos],
                count,
            }),
            None => Ok(()),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Process-unique stamp, renewed on every mutation; chunk caches compare
    /// against it
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.cells[y * self.width + x])
    }

    /// Lookup with signed coordinates; anything outside the grid is `None`
    pub fn get_signed(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        self.get(x as usize, y as usize)
    }

    /// Set one cell. Returns false if the coordinate is outside the grid.
    pub fn set(&mut self, x: usize, y: usize, index: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[y * self.width + x] = index;
        self.revision = next_revision();
        true
    }

    /// Iterate rows as slices
    pub fn rows(&self) -> impl Iterator<Item = &[usize]> {
        // chunks(0) panics, and a zero-width grid has no rows to yield anyway
        self.cells.chunks(self.width.max(1))
    }

    /// Thin out trees: each tree survives with probability `density` and is
    /// otherwise replaced by ground. With `clustered`, trees then seed
    /// neighbours with a small probability so survivors form groves.
    pub fn sparsify_trees<R: Rng>(
        &mut self,
        catalog: &TileCatalog,
        density: f64,
        clustered: bool,
        rng: &mut R,
    ) {
        if !(0.0..=1.0).contains(&density) {
            return;
        }
        let Some(tree) = catalog.tree_index() else {
            return;
        };
        let replacement = catalog.ground_index().unwrap_or(0);

        for cell in self.cells.iter_mut().filter(|c| **c == tree) {
            if rng.random::<f64>() > density {
                *cell = replacement;
            }
        }

        if clustered {
            for y in 0..self.height {
                for x in 0..self.width {
                    if self.cells[y * self.width + x] == tree {
                        continue;
                    }
                    if self.has_neighbour(x, y, tree) && rng.random::<f64>() < 0.02 {
                        self.cells[y * self.width + x] = tree;
                    }
                }
            }
        }
        self.revision = next_revision();
    }

    /// Whether any cell in the 3x3 block around (x, y) holds `index`
    fn has_neighbour(&self, x: usize, y: usize, index: usize) -> bool {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 2).min(self.height);
        let x0 = x.saturating_sub(1);
        let x1 = (x + 2).min(self.width);
        (y0..y1).any(|ny| (x0..x1).any(|nx| self.cells[ny * self.width + nx] == index))
    }
}
