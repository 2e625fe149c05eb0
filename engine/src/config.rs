//! Map configuration loaded from TOML

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MapError, Result};
use crate::map::builder::{DEFAULT_CHUNK_SIZE, PaddingPolicy};

/// One tile type: a name, its image and whether it blocks movement
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TileSpec {
    pub name: String,
    pub image: PathBuf,
    #[serde(default)]
    pub solid: bool,
}

fn default_tile_size() -> u32 {
    32
}

fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE as i64
}

fn default_max_tiles() -> u32 {
    120
}

fn default_player_speed() -> f64 {
    150.0
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Tiles per chunk edge; non-positive values use the default
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,
    /// Tree height in tiles
    #[serde(default)]
    pub tree_scale: Option<f32>,
    /// Fraction of trees kept from the map
    #[serde(default)]
    pub tree_density: Option<f64>,
    #[serde(default)]
    pub clustered_trees: bool,
    /// Image maps are downscaled so neither side exceeds this
    #[serde(default = "default_max_tiles")]
    pub max_tiles: u32,
    #[serde(default)]
    pub camera_smooth: f64,
    #[serde(default)]
    pub padding_policy: PaddingPolicy,
    #[serde(default)]
    pub debug: bool,
    pub map: PathBuf,
    #[serde(default)]
    pub palette: Option<PathBuf>,
    #[serde(default)]
    pub player_image: Option<PathBuf>,
    /// Pixels per second
    #[serde(default = "default_player_speed")]
    pub player_speed: f64,
    #[serde(default)]
    pub tiles: Vec<TileSpec>,
    /// Directory relative paths were resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl MapConfig {
    /// Parse TOML; paths are left as written
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MapConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file and resolve relative paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        log::info!(
            "Loaded config {} ({} tile type(s), map {})",
            path.display(),
            config.tiles.len(),
            config.map.display()
        );
        Ok(config)
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.map);
        if let Some(p) = self.palette.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.player_image.as_mut() {
            resolve(p);
        }
        for tile in &mut self.tiles {
            resolve(&mut tile.image);
        }
        self.base_dir = Some(base.to_path_buf());
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(MapError::InvalidTileSize);
        }
        if self.tiles.is_empty() {
            return Err(MapError::EmptyCatalog);
        }
        Ok(())
    }

    /// Chunk edge in tiles with the fallback applied
    pub fn effective_chunk_size(&self) -> u32 {
        if self.chunk_size <= 0 {
            log::warn!(
                "chunk_size {} is not positive, using {}",
                self.chunk_size,
                DEFAULT_CHUNK_SIZE
            );
            return DEFAULT_CHUNK_SIZE;
        }
        u32::try_from(self.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE)
    }
}
