use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use tilechunk::app::App;
use tilechunk::map::renderer::RenderMode;

/// Render a tile map viewport to a PNG
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Map configuration (TOML)
    #[arg(short, long, default_value = "map.toml")]
    config: PathBuf,

    /// Output image
    #[arg(short, long, default_value = "frame.png")]
    out: PathBuf,

    /// Camera top-left in world pixels; defaults to centering the player
    #[arg(long, allow_hyphen_values = true)]
    x: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    y: Option<f64>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Draw chunk borders and tile bounds
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut app = App::load(&args.config, (args.width, args.height))?;
    if args.debug && app.map().mode() != RenderMode::Debug {
        app.toggle_debug();
    }
    {
        let camera = app.camera_mut();
        if let Some(x) = args.x {
            camera.x = x;
        }
        if let Some(y) = args.y {
            camera.y = y;
        }
    }

    let (frame, stats) = app.render_frame()?;
    frame
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;

    let cache = app.map().cache_stats();
    log::info!(
        "Drew {} chunk(s) in {:.3} ms, visible cx {}..={} cy {}..={}",
        stats.chunk_blits,
        stats.draw_ms(),
        stats.visible_cx.start,
        stats.visible_cx.end,
        stats.visible_cy.start,
        stats.visible_cy.end
    );
    log::info!(
        "Cache: {} chunk(s), {} bytes, padding ({}, {}), chunk size {}",
        cache.chunk_count,
        cache.memory_used,
        cache.padding.x,
        cache.padding.y,
        cache.chunk_size
    );
    log::info!("Wrote {}", args.out.display());
    Ok(())
}
