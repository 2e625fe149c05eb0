//! Camera for viewport management and following a target

/// Camera state. Position is the world-space top-left of the viewport.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub x: f64,
    pub y: f64,

    /// Viewport size in pixels
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Smoothing factor in [0, 1]; 0 snaps to the target immediately
    pub smooth: f64,
}

impl Camera {
    pub fn new(x: f64, y: f64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            viewport_width: width,
            viewport_height: height,
            smooth: 0.0,
        }
    }

    pub fn with_smoothing(mut self, smooth: f64) -> Self {
        self.smooth = smooth.clamp(0.0, 1.0);
        self
    }

    /// Update viewport size
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    /// Float position
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Position truncated toward zero
    pub fn xi(&self) -> i64 {
        self.x as i64
    }

    pub fn yi(&self) -> i64 {
        self.y as i64
    }

    /// Move the camera by a pixel delta
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Top-left that puts `(cx, cy)` in the middle of the viewport
    fn target_for(&self, cx: f64, cy: f64) -> (f64, f64) {
        (
            cx - self.viewport_width as f64 / 2.0,
            cy - self.viewport_height as f64 / 2.0,
        )
    }

    /// Snap so that `(cx, cy)` is centered
    pub fn center_on(&mut self, cx: f64, cy: f64) {
        (self.x, self.y) = self.target_for(cx, cy);
    }

    /// Move toward centering `(cx, cy)`: lerp by `smooth` when it is strictly
    /// between 0 and 1, snap otherwise.
    pub fn follow(&mut self, cx: f64, cy: f64) {
        let (tx, ty) = self.target_for(cx, cy);
        if self.smooth > 0.0 && self.smooth < 1.0 {
            self.x += (tx - self.x) * self.smooth;
            self.y += (ty - self.y) * self.smooth;
        } else {
            self.x = tx;
            self.y = ty;
        }
    }

    /// Visible world rectangle `[left, right) × [top, bottom)` in whole pixels
    pub fn pixel_bounds(&self) -> (i64, i64, i64, i64) {
        let left = self.x.floor() as i64;
        let top = self.y.floor() as i64;
        let right = (self.x + self.viewport_width as f64).floor() as i64;
        let bottom = (self.y + self.viewport_height as f64).floor() as i64;
        (left, top, right, bottom)
    }

    /// Convert screen coordinates to world coordinates
    pub fn screen_to_world(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (screen_x + self.x, screen_y + self.y)
    }

    /// Integer screen position of a world point
    pub fn world_to_screen(&self, world_x: f64, world_y: f64) -> (i64, i64) {
        ((world_x - self.x) as i64, (world_y - self.y) as i64)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.0, 0.0, 800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_accessors() {
        let camera = Camera::new(12.9, -3.7, 320, 240);
        assert_eq!(camera.xi(), 12);
        assert_eq!(camera.yi(), -3);
        assert_eq!(camera.pixel_bounds(), (12, -4, 332, 236));
    }

    #[test]
    fn test_follow_snaps_without_smoothing() {
        let mut camera = Camera::new(0.0, 0.0, 200, 100);
        camera.follow(500.0, 300.0);
        assert_eq!(camera.position(), (400.0, 250.0));
    }

    #[test]
    fn test_follow_lerps_with_smoothing() {
        let mut camera = Camera::new(0.0, 0.0, 200, 100).with_smoothing(0.5);
        camera.follow(300.0, 50.0);
        assert_eq!(camera.position(), (100.0, 0.0));
        camera.follow(300.0, 50.0);
        assert_eq!(camera.position(), (150.0, 0.0));
    }

    #[test]
    fn test_screen_world_round_trip() {
        let mut camera = Camera::new(10.0, 20.0, 100, 100);
        camera.pan(5.0, -5.0);
        assert_eq!(camera.screen_to_world(1.0, 2.0), (16.0, 17.0));
        assert_eq!(camera.world_to_screen(16.0, 17.0), (1, 2));
    }
}
