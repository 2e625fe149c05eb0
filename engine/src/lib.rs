//! Chunked tile map rendering with padding-aware chunk images and
//! pixel-accurate collision

pub mod app;
pub mod config;
pub mod error;
pub mod map;

pub use error::{MapError, Result};
