//! Runtime-tunable engine thresholds.
//!
//! Every field defaults to the matching constant in [`crate::consts`], so a
//! host can pass a partial JSON object and override only what it needs.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::consts;
use crate::error::ConfigError;

/// Engine configuration supplied by the host at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Smallest allowed zoom factor.
    pub min_zoom: f64,
    /// Largest allowed zoom factor.
    pub max_zoom: f64,
    /// Zoom multiplier for a wheel step with negative `deltaY`.
    pub wheel_zoom_in: f64,
    /// Zoom multiplier for a wheel step with positive `deltaY`.
    pub wheel_zoom_out: f64,
    /// Zoom-in button multiplier (zoom-out divides by it).
    pub button_zoom_step: f64,
    /// Fraction of the canvas the fitted base image may occupy.
    pub fit_ratio: f64,
    /// Touch movement (canvas pixels) that turns a tap into a drag.
    pub tap_slop_px: f64,
    /// Longest touch duration (ms) still dispatched as a tap.
    pub tap_max_ms: f64,
    /// Minimum shape extent (image pixels) on at least one axis.
    pub min_shape_size: f64,
    /// Arrow hit tolerance (image pixels).
    pub arrow_hit_tolerance: f64,
    /// Text annotation hit padding (image pixels).
    pub text_hit_padding: f64,
    /// Opacity (percent) for newly created layers.
    pub default_layer_opacity: f64,
    /// Prefix prepended to logical image paths.
    pub image_base_path: String,
    /// Id of the site-map drawing.
    pub site_map_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: consts::MIN_ZOOM,
            max_zoom: consts::MAX_ZOOM,
            wheel_zoom_in: consts::WHEEL_ZOOM_IN,
            wheel_zoom_out: consts::WHEEL_ZOOM_OUT,
            button_zoom_step: consts::BUTTON_ZOOM_STEP,
            fit_ratio: consts::FIT_RATIO,
            tap_slop_px: consts::TAP_SLOP_PX,
            tap_max_ms: consts::TAP_MAX_MS,
            min_shape_size: consts::MIN_SHAPE_SIZE,
            arrow_hit_tolerance: consts::ARROW_HIT_TOLERANCE,
            text_hit_padding: consts::TEXT_HIT_PADDING,
            default_layer_opacity: consts::DEFAULT_LAYER_OPACITY,
            image_base_path: consts::IMAGE_BASE_PATH.to_owned(),
            site_map_id: consts::SITE_MAP_ID.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config object and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed JSON and
    /// [`ConfigError::Invalid`] when the values are inconsistent.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_zoom.is_nan() || self.min_zoom <= 0.0 {
            return Err(ConfigError::Invalid(format!("minZoom must be positive, got {}", self.min_zoom)));
        }
        if self.max_zoom.is_nan() || self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "minZoom {} exceeds maxZoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        for (name, value) in [
            ("wheelZoomIn", self.wheel_zoom_in),
            ("wheelZoomOut", self.wheel_zoom_out),
            ("buttonZoomStep", self.button_zoom_step),
            ("fitRatio", self.fit_ratio),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !(0.0..=100.0).contains(&self.default_layer_opacity) {
            return Err(ConfigError::Invalid(format!(
                "defaultLayerOpacity must be within 0..=100, got {}",
                self.default_layer_opacity
            )));
        }
        Ok(())
    }
}
