#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

/// A point in canvas, viewport or image space.
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

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

/// Viewport pan/zoom state.
///
/// `offset_x` / `offset_y` are in CSS pixels of the canvas.
/// `zoom` is a scale factor (1.0 = no zoom), kept within the configured bounds
/// by every mutating method that takes limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { offset_x: 0.0, offset_y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    /// Convert a canvas-space point (CSS pixels) to viewport space.
    #[must_use]
    pub fn canvas_to_viewport(&self, canvas: Point) -> Point {
        Point {
            x: (canvas.x - self.offset_x) / self.zoom,
            y: (canvas.y - self.offset_y) / self.zoom,
        }
    }

    /// Convert a viewport-space point to canvas space (CSS pixels).
    #[must_use]
    pub fn viewport_to_canvas(&self, real: Point) -> Point {
        Point {
            x: real.x * self.zoom + self.offset_x,
            y: real.y * self.zoom + self.offset_y,
        }
    }

    /// Convert a canvas-space distance to a viewport-space distance.
    #[must_use]
    pub fn canvas_dist_to_viewport(&self, canvas_dist: f64) -> f64 {
        canvas_dist / self.zoom
    }

    /// Set the zoom to `new_zoom` (clamped) while keeping the content under
    /// `anchor` (canvas space) at the same canvas position.
    pub fn zoom_about(&mut self, anchor: Point, new_zoom: f64, min_zoom: f64, max_zoom: f64) {
        let clamped = new_zoom.clamp(min_zoom, max_zoom);
        let change = clamped / self.zoom;
        self.offset_x = anchor.x - (anchor.x - self.offset_x) * change;
        self.offset_y = anchor.y - (anchor.y - self.offset_y) * change;
        self.zoom = clamped;
    }

    /// Multiply the zoom by `factor` about `anchor`.
    pub fn zoom_by(&mut self, anchor: Point, factor: f64, min_zoom: f64, max_zoom: f64) {
        self.zoom_about(anchor, self.zoom * factor, min_zoom, max_zoom);
    }

    /// Translate by a raw canvas-space delta (1:1, not scaled by zoom).
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Return to `{0, 0, 1}`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Zoom as a whole-number percentage, for zoom controls.
    #[must_use]
    pub fn zoom_percent(&self) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        let pct = (self.zoom * 100.0).round() as i64;
        pct
    }
}

/// Where the fitted base image sits in viewport space for the current frame.
///
/// Recomputed on every render pass; hit-testing needs it to invert pointer
/// coordinates into image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// Left edge of the fitted image in viewport space.
    pub image_x: f64,
    /// Top edge of the fitted image in viewport space.
    pub image_y: f64,
    /// Uniform fit scale from image pixels to viewport units.
    pub scale: f64,
    /// Native width of the base bitmap.
    pub image_width: f64,
    /// Native height of the base bitmap.
    pub image_height: f64,
}

impl ImagePlacement {
    /// Fit an `image_w` × `image_h` bitmap inside `fit_ratio` of a
    /// `canvas_w` × `canvas_h` canvas, centred.
    #[must_use]
    pub fn fit(image_w: f64, image_h: f64, canvas_w: f64, canvas_h: f64, fit_ratio: f64) -> Self {
        let scale = if image_w > 0.0 && image_h > 0.0 {
            ((canvas_w * fit_ratio) / image_w).min((canvas_h * fit_ratio) / image_h)
        } else {
            1.0
        };
        let center = Point::new(canvas_w * 0.5, canvas_h * 0.5);
        Self {
            image_x: center.x - image_w * scale * 0.5,
            image_y: center.y - image_h * scale * 0.5,
            scale,
            image_width: image_w,
            image_height: image_h,
        }
    }

    /// Centre of the fitted image in viewport space.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            self.image_x + self.image_width * self.scale * 0.5,
            self.image_y + self.image_height * self.scale * 0.5,
        )
    }

    /// Convert a viewport-space point to image pixels.
    #[must_use]
    pub fn viewport_to_image(&self, real: Point) -> Point {
        Point {
            x: (real.x - self.image_x) / self.scale,
            y: (real.y - self.image_y) / self.scale,
        }
    }

    /// Convert image pixels to viewport space.
    #[must_use]
    pub fn image_to_viewport(&self, img: Point) -> Point {
        Point {
            x: self.image_x + img.x * self.scale,
            y: self.image_y + img.y * self.scale,
        }
    }

    /// Full inversion: canvas pixels → viewport → image pixels.
    #[must_use]
    pub fn canvas_to_image(&self, viewport: &Viewport, canvas: Point) -> Point {
        self.viewport_to_image(viewport.canvas_to_viewport(canvas))
    }

    /// Full projection: image pixels → viewport → canvas pixels.
    #[must_use]
    pub fn image_to_canvas(&self, viewport: &Viewport, img: Point) -> Point {
        viewport.viewport_to_canvas(self.image_to_viewport(img))
    }
}
