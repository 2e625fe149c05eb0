//! Display surface the renderer draws onto

use image::imageops;
use image::{Rgba, RgbaImage};

/// Axis-aligned rectangle in screen pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }
}

/// Chunk border color in debug mode
pub const CHUNK_BORDER: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Tile bounding box color in debug mode
pub const TILE_BOUNDS: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Something images can be blitted onto
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Alpha-blend `image` with its top-left at `(x, y)`
    fn blit(&mut self, image: &RgbaImage, x: i64, y: i64);

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgba<u8>);

    /// 1px outline along the inside of `rect`
    fn outline_rect(&mut self, rect: ScreenRect, color: Rgba<u8>);
}

/// Off-screen framebuffer
impl Surface for RgbaImage {
    fn size(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn blit(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::overlay(self, image, x, y);
    }

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgba<u8>) {
        let (w, h) = self.dimensions();
        let x0 = rect.x.clamp(0, w as i64) as u32;
        let x1 = rect.right().clamp(0, w as i64) as u32;
        let y0 = rect.y.clamp(0, h as i64) as u32;
        let y1 = rect.bottom().clamp(0, h as i64) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                self.put_pixel(x, y, color);
            }
        }
    }

    fn outline_rect(&mut self, rect: ScreenRect, color: Rgba<u8>) {
        if rect.width == 0 || rect.height == 0 {
            return;
        }
        let right = rect.right() - 1;
        let bottom = rect.bottom() - 1;
        self.fill_rect(ScreenRect::new(rect.x, rect.y, rect.width, 1), color);
        self.fill_rect(ScreenRect::new(rect.x, bottom, rect.width, 1), color);
        self.fill_rect(ScreenRect::new(rect.x, rect.y, 1, rect.height), color);
        self.fill_rect(ScreenRect::new(right, rect.y, 1, rect.height), color);
    }
}
