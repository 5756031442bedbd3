//! Error types shared across the engine.
//!
//! None of these escape a render pass: asset and surface failures are logged
//! and the pass continues with the next draw.

/// A bitmap could not be fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load image {path}: {reason}")]
pub struct ImageLoadError {
    /// Logical path that was requested.
    pub path: String,
    /// Human-readable cause reported by the image source.
    pub reason: String,
}

/// Error returned by [`crate::annotation::AnnotationStore::import_json`].
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The payload is not a JSON array of annotations.
    #[error("malformed annotation import: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error returned by [`crate::config::EngineConfig::from_json`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The payload is not a JSON object of config fields.
    #[error("malformed engine config: {0}")]
    Json(#[from] serde_json::Error),
    /// The fields parsed but describe an unusable configuration.
    #[error("invalid engine config: {0}")]
    Invalid(String),
}

/// A drawing-surface call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The backing canvas rejected a call (e.g. invalid context state).
    #[error("canvas call failed: {0}")]
    Canvas(String),
}
