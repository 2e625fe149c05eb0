//! Error types for map loading, chunk building and configuration

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring, loading or building a tile map
#[derive(Debug, Error)]
pub enum MapError {
    /// A tile or map image could not be decoded
    #[error("failed to decode image {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Reading a file failed
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for `MapConfig`
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("tile size must be greater than zero")]
    InvalidTileSize,

    #[error("tile catalog is empty")]
    EmptyCatalog,

    #[error("unknown tile name: {0}")]
    UnknownTile(String),

    /// A grid cell refers to a tile type the catalog does not have
    #[error("tile index {index} at ({x}, {y}) is out of range for a catalog of {count} tiles")]
    InvalidTileIndex {
        x: usize,
        y: usize,
        index: usize,
        count: usize,
    },

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("malformed map at line {line}: {reason}")]
    MalformedMap { line: usize, reason: String },

    #[error("malformed palette at line {line}: {reason}")]
    Palette { line: usize, reason: String },

    /// Padding search gave up and the strict policy refuses to clip
    #[error(
        "chunk padding insufficient (extra_x={extra_x}, extra_y={extra_y}): {clipped} tile(s) would be clipped"
    )]
    PaddingInsufficient {
        extra_x: u32,
        extra_y: u32,
        clipped: usize,
    },
}

pub type Result<T> = std::result::Result<T, MapError>;
