//! Headless driver: loads a configured map and renders frames off-screen

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use image::{Rgba, RgbaImage};

use crate::config::MapConfig;
use crate::map::builder::PaddingPolicy;
use crate::map::camera::Camera;
use crate::map::collision::Mover;
use crate::map::io::{find_palette_for_image, is_image_map, load_grid};
use crate::map::loader::ImageCache;
use crate::map::tile::TileCatalog;
use crate::map::renderer::{DrawStats, RenderMode};
use crate::map::surface::Surface;
use crate::map::{MapSettings, TileMap};

/// Tile the player starts on
const SPAWN_TILE: (u32, u32) = (11, 7);

const CLEAR_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A player sprite with its collision shape
pub struct Player {
    pub mover: Mover,
    pub speed: f64,
    image: Arc<RgbaImage>,
}

impl Player {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Headless frame driver: owns the map, camera and player
pub struct App {
    map: TileMap,
    camera: Camera,
    player: Option<Player>,
}

impl App {
    /// Load a config file and everything it references
    pub fn load(path: &Path, viewport: (u32, u32)) -> anyhow::Result<Self> {
        let config = MapConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?;
        Self::from_config(&config, viewport)
    }

    pub fn from_config(config: &MapConfig, viewport: (u32, u32)) -> anyhow::Result<Self> {
        let mut images = ImageCache::new();
        let catalog =
            TileCatalog::from_specs(&config.tiles, &mut images).context("loading tile images")?;

        let palette = match &config.palette {
            Some(p) => Some(p.clone()),
            None if is_image_map(&config.map) => {
                find_palette_for_image(&config.map, config.base_dir.as_deref())
            }
            None => None,
        };
        if let Some(p) = &palette {
            log::info!("Using palette {}", p.display());
        }
        let grid = load_grid(
            &config.map,
            &catalog,
            Some(config.max_tiles),
            palette.as_deref(),
        )
        .with_context(|| format!("loading map {}", config.map.display()))?;

        let settings = MapSettings {
            tile_size: config.tile_size,
            chunk_size: config.effective_chunk_size(),
            policy: config.padding_policy,
            mode: if config.debug {
                RenderMode::Debug
            } else {
                RenderMode::Normal
            },
        };
        let mut map = TileMap::new(catalog, grid, settings)?;

        if let Some(scale) = config.tree_scale {
            if map.scale_trees(scale) {
                log::info!("Scaled trees to {} tile(s) tall", scale);
            }
        }
        if let Some(density) = config.tree_density {
            map.sparsify_trees(density, config.clustered_trees, &mut rand::rng());
        }

        let player = match &config.player_image {
            Some(path) => {
                let image = images
                    .load(path)
                    .with_context(|| format!("loading player image {}", path.display()))?;
                let ts = config.tile_size as f64;
                let mover = Mover::from_image(
                    ts * SPAWN_TILE.0 as f64,
                    ts * SPAWN_TILE.1 as f64,
                    &image,
                );
                Some(Player {
                    mover,
                    speed: config.player_speed,
                    image,
                })
            }
            None => None,
        };

        let mut camera =
            Camera::new(0.0, 0.0, viewport.0, viewport.1).with_smoothing(config.camera_smooth);
        if let Some(player) = &player {
            let (cx, cy) = player.mover.center();
            camera.center_on(cx, cy);
        }

        Ok(Self {
            map,
            camera,
            player,
        })
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut TileMap {
        &mut self.map
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn toggle_debug(&mut self) -> RenderMode {
        self.map.toggle_debug()
    }

    pub fn set_policy(&mut self, policy: PaddingPolicy) {
        self.map.set_policy(policy);
    }

    /// Advance the player along `direction` for `dt` seconds and let the
    /// camera follow
    pub fn update(&mut self, direction: (f64, f64), dt: f64) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        let probe = self.map.probe();
        player.mover.advance(direction, player.speed, dt, &probe);
        let (cx, cy) = player.mover.center();
        self.camera.follow(cx, cy);
    }

    /// Render one frame into a new framebuffer
    pub fn render_frame(&mut self) -> anyhow::Result<(RgbaImage, DrawStats)> {
        let mut frame = RgbaImage::from_pixel(
            self.camera.viewport_width,
            self.camera.viewport_height,
            CLEAR_COLOR,
        );
        let stats = self.map.draw(&mut frame, &self.camera)?;
        if let Some(player) = &self.player {
            let (x, y) = self.camera.world_to_screen(player.mover.x, player.mover.y);
            frame.blit(player.image(), x, y);
        }
        Ok((frame, stats))
    }
}
