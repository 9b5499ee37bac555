#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{ZOOM_MAX, ZOOM_MIN};

/// A point in device, screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate this point clockwise by `degrees` around `center`.
    #[must_use]
    pub fn rotate_about(self, center: Point, degrees: f64) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point {
            x: center.x + dx * cos - dy * sin,
            y: center.y + dx * sin + dy * cos,
        }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Camera state for pan/zoom over the whiteboard.
///
/// `pan_x` / `pan_y` are in CSS pixels; they are persisted as the document's
/// `canvasPosition`. `zoom` is a scale factor (1.0 = no zoom) persisted as
/// `zoomLevel`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a screen-space point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.pan_x) / self.zoom,
            y: (screen.y - self.pan_y) / self.zoom,
        }
    }

    /// Convert a world-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: world.x * self.zoom + self.pan_x,
            y: world.y * self.zoom + self.pan_y,
        }
    }

    /// Convert a device-pixel point (backing store) to world coordinates.
    #[must_use]
    pub fn device_to_world(&self, device: Point, dpr: f64) -> Point {
        let dpr = if dpr > 0.0 { dpr } else { 1.0 };
        self.screen_to_world(Point::new(device.x / dpr, device.y / dpr))
    }

    /// Convert a screen-space distance (pixels) to world-space distance.
    #[must_use]
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Pan position as a point, the shape it takes on the wire.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.pan_x, self.pan_y)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Multiply zoom by `factor`, keeping the world point under `anchor`
    /// (screen space) fixed. Zoom is clamped to `[ZOOM_MIN, ZOOM_MAX]`.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let world = self.screen_to_world(anchor);
        self.zoom = (self.zoom * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        self.pan_x = anchor.x - world.x * self.zoom;
        self.pan_y = anchor.y - world.y * self.zoom;
    }

    /// Restore a camera from persisted `canvasPosition` / `zoomLevel`.
    #[must_use]
    pub fn from_persisted(position: Point, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom.clamp(ZOOM_MIN, ZOOM_MAX) } else { 1.0 };
        Self { pan_x: position.x, pan_y: position.y, zoom }
    }
}
