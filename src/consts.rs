//! Shared numeric constants for the drawing canvas crate.
//!
//! Values here are the defaults behind [`crate::config::EngineConfig`]; the
//! engine reads thresholds through the config so hosts can tune them.

// ── Viewport ────────────────────────────────────────────────────

/// Smallest allowed viewport zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Largest allowed viewport zoom factor.
pub const MAX_ZOOM: f64 = 10.0;

/// Zoom multiplier for one wheel notch towards the user (scroll up).
pub const WHEEL_ZOOM_IN: f64 = 1.1;

/// Zoom multiplier for one wheel notch away from the user (scroll down).
pub const WHEEL_ZOOM_OUT: f64 = 0.9;

/// Multiplier applied by the zoom-in button; zoom-out divides by it.
pub const BUTTON_ZOOM_STEP: f64 = 1.2;

/// Fraction of the canvas the fitted base image may occupy on each axis.
pub const FIT_RATIO: f64 = 0.8;

// ── Gestures ────────────────────────────────────────────────────

/// Movement in canvas pixels beyond which a touch stops being a tap.
pub const TAP_SLOP_PX: f64 = 8.0;

/// Longest touch, in milliseconds, still treated as a tap.
pub const TAP_MAX_MS: f64 = 300.0;

/// Shapes smaller than this on both axes (image pixels) are discarded on release.
pub const MIN_SHAPE_SIZE: f64 = 5.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Distance from an arrow shaft, in image pixels, that still counts as a hit.
pub const ARROW_HIT_TOLERANCE: f64 = 10.0;

/// Padding around measured text used when hit-testing text annotations.
pub const TEXT_HIT_PADDING: f64 = 4.0;

/// Hotspot polygons need at least this many vertices to be drawn or tested.
pub const MIN_POLYGON_VERTICES: usize = 3;

// ── Layers ──────────────────────────────────────────────────────

/// Opacity (percent) given to a layer when it is first toggled on.
pub const DEFAULT_LAYER_OPACITY: f64 = 70.0;

/// Gap between a selected layer's image bounds and its dashed outline.
pub const LAYER_OUTLINE_PADDING: f64 = 4.0;

// ── Rendering ───────────────────────────────────────────────────

/// Arrowhead half-angle in radians (30°).
pub const ARROW_HEAD_ANGLE: f64 = std::f64::consts::PI / 6.0;

/// Arrowhead segment length per unit of line width.
pub const ARROW_HEAD_PER_WIDTH: f64 = 4.0;

/// Shortest arrowhead segment, in viewport units.
pub const ARROW_HEAD_MIN: f64 = 10.0;

/// Global alpha used for in-progress shape previews.
pub const PREVIEW_ALPHA: f64 = 0.6;

/// Horizontal padding inside a hotspot label background.
pub const HOTSPOT_LABEL_PADDING: f64 = 6.0;

/// Height of a hotspot label background.
pub const HOTSPOT_LABEL_HEIGHT: f64 = 20.0;

/// Corner radius of a hotspot label background.
pub const HOTSPOT_LABEL_RADIUS: f64 = 4.0;

/// Padding around text annotations' background rectangle.
pub const TEXT_BACKGROUND_PADDING: f64 = 4.0;

// ── Assets ──────────────────────────────────────────────────────

/// Prefix the browser image source puts in front of every logical image path.
pub const IMAGE_BASE_PATH: &str = "/data/drawings/";

/// Id of the site-map drawing whose children are shown as hotspots.
pub const SITE_MAP_ID: &str = "00";
