//! Map files: text grids, image maps and color palettes

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use image::imageops::{self, FilterType};

use super::grid::TileGrid;
use super::loader::load_image;
use super::tile::TileCatalog;
use crate::error::{MapError, Result};

/// Exact RGB color to tile index
pub type Palette = HashMap<[u8; 3], usize>;

const IMAGE_MAP_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Whether a map path is loaded as an image rather than text
pub fn is_image_map(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_MAP_EXTENSIONS.contains(&e.as_str()))
}

/// Parse `R,G,B=name_or_index` lines
pub fn parse_palette(text: &str, catalog: &TileCatalog) -> Result<Palette> {
    let mut palette = Palette::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((left, right)) = line.split_once('=') else {
            continue;
        };
        let bad = |reason: String| MapError::Palette {
            line: line_no + 1,
            reason,
        };

        let parts = left
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| bad(format!("bad color {:?}: {}", left, e)))?;
        if parts.len() < 3 {
            return Err(bad(format!("expected R,G,B, got {:?}", left)));
        }

        let right = right.trim();
        let index = match right.parse::<usize>() {
            Ok(index) => index,
            Err(_) => catalog
                .index_of(right)
                .ok_or_else(|| MapError::UnknownTile(right.to_string()))?,
        };
        palette.insert([parts[0], parts[1], parts[2]], index);
    }
    Ok(palette)
}

pub fn load_palette(path: &Path, catalog: &TileCatalog) -> Result<Palette> {
    let text = fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_palette(&text, catalog)
}

/// Look for `<stem>.palette` beside the map, then in `<base>/maps/`
pub fn find_palette_for_image(map: &Path, base: Option<&Path>) -> Option<PathBuf> {
    let beside = map.with_extension("palette");
    if beside.exists() {
        return Some(beside);
    }
    let stem = map.file_stem()?;
    let mut in_maps = base?.join("maps").join(stem);
    in_maps.set_extension("palette");
    in_maps.exists().then_some(in_maps)
}

/// One color per tile type, sampled near the image's top-left corner
pub fn representative_colors(catalog: &TileCatalog) -> Vec<[u8; 3]> {
    catalog
        .iter()
        .map(|kind| {
            let img = kind.image();
            if img.width() == 0 || img.height() == 0 {
                return [0, 0, 0];
            }
            let x = 1.min(img.width() - 1);
            let y = 1.min(img.height() - 1);
            let p = img.get_pixel(x, y).0;
            [p[0], p[1], p[2]]
        })
        .collect()
}

/// Index of the closest color by squared RGB distance; ties go to the first
pub fn nearest_color_index(color: [u8; 3], colors: &[[u8; 3]]) -> usize {
    let dist = |c: &[u8; 3]| -> i32 {
        (0..3)
            .map(|i| {
                let d = c[i] as i32 - color[i] as i32;
                d * d
            })
            .sum()
    };
    colors
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| dist(c))
        .map_or(0, |(i, _)| i)
}

/// Convert an image to a grid, one tile per pixel. Images larger than
/// `max_tiles` on either side are smoothly downscaled first.
pub fn image_to_grid(
    image: &RgbaImage,
    catalog: &TileCatalog,
    max_tiles: Option<u32>,
    palette: Option<&Palette>,
) -> TileGrid {
    let (mw, mh) = image.dimensions();
    let scaled;
    let source = match max_tiles {
        Some(max) if mw > max || mh > max => {
            let scale = (max as f64 / mw as f64).min(max as f64 / mh as f64);
            let new_w = ((mw as f64 * scale) as u32).max(1);
            let new_h = ((mh as f64 * scale) as u32).max(1);
            log::info!(
                "Downscaled map image from {}x{} to {}x{} to limit tiles <= {}",
                mw,
                mh,
                new_w,
                new_h,
                max
            );
            scaled = imageops::resize(image, new_w, new_h, FilterType::Triangle);
            &scaled
        }
        _ => image,
    };

    let fallback = representative_colors(catalog);
    let rows = source
        .rows()
        .map(|row| {
            row.map(|p| {
                let color = [p.0[0], p.0[1], p.0[2]];
                palette
                    .and_then(|pal| pal.get(&color).copied())
                    .unwrap_or_else(|| nearest_color_index(color, &fallback))
            })
            .collect()
        })
        .collect();
    // Every row of an image has the same width
    TileGrid::from_rows(rows).unwrap_or_else(|_| TileGrid::new(0, 0, 0))
}

/// Load a map file as text or image and check it against the catalog
pub fn load_grid(
    path: &Path,
    catalog: &TileCatalog,
    max_tiles: Option<u32>,
    palette_path: Option<&Path>,
) -> Result<TileGrid> {
    let grid = if is_image_map(path) {
        let image = load_image(path)?;
        let palette = match palette_path {
            Some(p) => Some(load_palette(p, catalog)?),
            None => None,
        };
        image_to_grid(&image, catalog, max_tiles, palette.as_ref())
    } else {
        let text = fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        TileGrid::parse_text(&text)?
    };
    grid.validate(catalog)?;
    log::info!(
        "Loaded map {} ({}x{} tiles)",
        path.display(),
        grid.width(),
        grid.height()
    );
    Ok(grid)
}
