use std::sync::Arc;

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use tilechunk::map::builder::{ChunkBuilder, ChunkCoord, Padding};
use tilechunk::map::cache::ChunkCache;
use tilechunk::map::grid::TileGrid;
use tilechunk::map::tile::{TileCatalog, TileKind};

const TS: u32 = 32;

fn tile(name: &str, w: u32, h: u32, color: [u8; 4], solid: bool) -> TileKind {
    TileKind::new(name, Arc::new(RgbaImage::from_pixel(w, h, Rgba(color))), solid)
}

/// grass, tree and rock with the given oversized image sizes
fn catalog(tree: (u32, u32), rock: (u32, u32)) -> TileCatalog {
    TileCatalog::new(vec![
        tile("grass", TS, TS, [40, 160, 40, 255], false),
        tile("tree", tree.0, tree.1, [20, 90, 20, 255], true),
        tile("rock", rock.0, rock.1, [120, 120, 120, 255], true),
    ])
    .unwrap()
}

fn sprite_size() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=TS * 4, 1u32..=TS * 4)
}

fn grid_cells() -> impl Strategy<Value = (usize, usize, Vec<usize>)> {
    (1usize..=20, 1usize..=20).prop_flat_map(|(w, h)| {
        (Just(w), Just(h), prop::collection::vec(0usize..3, w * h))
    })
}

fn grid_from(w: usize, h: usize, cells: &[usize]) -> TileGrid {
    let rows = cells.chunks(w).map(|r| r.to_vec()).collect();
    TileGrid::from_rows(rows).unwrap()
}

proptest! {
    // Sprites within four tiles always fit, whatever padding the search starts from
    #[test]
    fn padding_search_converges_without_clipping(
        tree in sprite_size(),
        rock in sprite_size(),
        (w, h, cells) in grid_cells(),
        chunk_size in 1u32..=10,
        from_zero in any::<bool>(),
    ) {
        let catalog = catalog(tree, rock);
        let grid = grid_from(w, h, &cells);
        let builder = ChunkBuilder::new(&grid, &catalog, TS, chunk_size);
        let start = if from_zero { Padding::default() } else { Padding::for_catalog(&catalog, TS) };

        let built = builder.build(start);
        prop_assert!(built.report.converged);
        prop_assert!(built.report.iterations <= 4);
        prop_assert!(built.report.clipped.is_empty());
        prop_assert!(built.report.padding.x <= TS * 4);
        prop_assert!(built.report.padding.y <= TS * 4);
    }

    // Every cell's chunk exists after ensure_built, and nothing else does
    #[test]
    fn ensure_built_covers_every_cell(
        (w, h, cells) in grid_cells(),
        chunk_size in 1u32..=12,
    ) {
        let catalog = catalog((TS, TS * 2), (TS, TS));
        let grid = grid_from(w, h, &cells);
        let mut cache = ChunkCache::default();
        cache.ensure_built(&grid, &catalog, TS, chunk_size).unwrap();

        let cs = chunk_size as usize;
        for y in 0..h {
            for x in 0..w {
                prop_assert!(cache.contains(&ChunkCoord::new((x / cs) as i64, (y / cs) as i64)));
            }
        }
        prop_assert_eq!(cache.len(), w.div_ceil(cs) * h.div_ceil(cs));
        prop_assert_eq!(cache.chunk_edge(TS), chunk_size);
    }

    // Rebuilding after invalidate reproduces the same pixels
    #[test]
    fn invalidate_then_rebuild_is_identical(
        tree in sprite_size(),
        (w, h, cells) in grid_cells(),
        chunk_size in 1u32..=8,
    ) {
        let catalog = catalog(tree, (TS, TS));
        let grid = grid_from(w, h, &cells);
        let mut cache = ChunkCache::default();
        cache.ensure_built(&grid, &catalog, TS, chunk_size).unwrap();
        let mut before: Vec<(ChunkCoord, RgbaImage)> = cache
            .chunk_coords()
            .map(|c| (*c, cache.get(c).unwrap().image.clone()))
            .collect();
        before.sort_by_key(|(c, _)| *c);
        let padding = cache.padding();

        cache.invalidate();
        cache.invalidate();
        prop_assert!(cache.ensure_built(&grid, &catalog, TS, chunk_size).unwrap());
        prop_assert!(!cache.ensure_built(&grid, &catalog, TS, chunk_size).unwrap());

        prop_assert_eq!(cache.padding(), padding);
        prop_assert_eq!(cache.len(), before.len());
        for (coord, image) in &before {
            prop_assert!(&cache.get(coord).unwrap().image == image);
        }
    }
}
