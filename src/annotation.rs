//! Markup records and the session annotation store.
//!
//! Annotations are anchored to one exact `(drawing, discipline, revision)`
//! context and stored in image-pixel space, so they stay put across pan, zoom
//! and canvas resizes. Arrow and shape geometry is stored relative to the
//! press point: `x`/`y` is where the drag started and the payload carries the
//! delta to the release point.
//!
//! The wire shape matches the host's JSON export format:
//!
//! ```json
//! { "id": "…", "type": "arrow", "drawingId": "01", "discipline": "Arch",
//!   "revision": "A1", "x": 10, "y": 20,
//!   "data": { "endX": 40, "endY": -5, "color": "#ef4444", "lineWidth": 3 },
//!   "createdAt": 1700000000000, "updatedAt": 1700000000000 }
//! ```

#[cfg(test)]
#[path = "annotation_test.rs"]
mod annotation_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::Point;
use crate::error::ImportError;

/// Unique identifier for an annotation.
///
/// New annotations get a UUID v4; imported ids are kept verbatim.
pub type AnnotationId = String;

/// Payload of a text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    pub text: String,
    /// Font size in viewport units.
    pub font_size: f64,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Payload of an arrow annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowData {
    /// Head position relative to the tail (image pixels).
    pub end_x: f64,
    pub end_y: f64,
    pub color: String,
    pub line_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload of a rectangle or circle annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeData {
    /// Signed extent from the press point (image pixels); negative when the
    /// drag went up or left.
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub line_width: f64,
    #[serde(default)]
    pub fill: bool,
}

/// Kind-specific payload, tagged by the record's `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum AnnotationData {
    Text(TextData),
    Arrow(ArrowData),
    Rectangle(ShapeData),
    /// Ellipse inscribed in the `width × height` box.
    Circle(ShapeData),
}

impl AnnotationData {
    #[must_use]
    pub fn kind(&self) -> AnnotationTool {
        match self {
            Self::Text(_) => AnnotationTool::Text,
            Self::Arrow(_) => AnnotationTool::Arrow,
            Self::Rectangle(_) => AnnotationTool::Rectangle,
            Self::Circle(_) => AnnotationTool::Circle,
        }
    }
}

/// A committed markup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub drawing_id: String,
    pub discipline: Option<String>,
    pub revision: Option<String>,
    /// Anchor in image pixels.
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub data: AnnotationData,
    /// Milliseconds since the Unix epoch.
    pub created_at: f64,
    pub updated_at: f64,
}

impl Annotation {
    #[must_use]
    pub fn anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Whether this annotation belongs to `ctx` (exact match on all three parts).
    #[must_use]
    pub fn belongs_to(&self, ctx: &ViewContext) -> bool {
        self.drawing_id == ctx.drawing_id && self.discipline == ctx.discipline && self.revision == ctx.revision
    }
}

/// The `(drawing, discipline, revision)` triple annotations are filed under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewContext {
    pub drawing_id: String,
    pub discipline: Option<String>,
    pub revision: Option<String>,
}

// =============================================================
// Tools and settings
// =============================================================

/// Markup tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationTool {
    /// Click to place text through a host prompt.
    Text,
    /// Drag from tail to head.
    Arrow,
    /// Drag a corner-to-corner box.
    Rectangle,
    /// Drag the bounding box of an ellipse.
    Circle,
}

impl AnnotationTool {
    /// Whether this tool is driven by press-move-release.
    #[must_use]
    pub fn is_drag(self) -> bool {
        !matches!(self, Self::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSettings {
    pub font_size: f64,
    pub color: String,
    pub background_color: Option<String>,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self { font_size: 16.0, color: "#ef4444".to_owned(), background_color: Some("#ffffff".to_owned()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowSettings {
    pub color: String,
    pub line_width: f64,
}

impl Default for ArrowSettings {
    fn default() -> Self {
        Self { color: "#ef4444".to_owned(), line_width: 3.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeSettings {
    pub color: String,
    pub line_width: f64,
    pub fill: bool,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self { color: "#ef4444".to_owned(), line_width: 3.0, fill: false }
    }
}

/// Partial update of [`TextSettings`]; `None` fields are left unchanged.
///
/// `background_color: Some(None)` removes the background.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextSettingsPatch {
    pub font_size: Option<f64>,
    pub color: Option<String>,
    #[allow(clippy::option_option)]
    pub background_color: Option<Option<String>>,
}

/// Partial update of [`ArrowSettings`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArrowSettingsPatch {
    pub color: Option<String>,
    pub line_width: Option<f64>,
}

/// Partial update of [`ShapeSettings`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShapeSettingsPatch {
    pub color: Option<String>,
    pub line_width: Option<f64>,
    pub fill: Option<bool>,
}

/// Per-tool settings applied to new annotations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSettings {
    pub text: TextSettings,
    pub arrow: ArrowSettings,
    pub shape: ShapeSettings,
}

impl ToolSettings {
    pub fn update_text(&mut self, patch: TextSettingsPatch) {
        if let Some(v) = patch.font_size {
            self.text.font_size = v;
        }
        if let Some(v) = patch.color {
            self.text.color = v;
        }
        if let Some(v) = patch.background_color {
            self.text.background_color = v;
        }
    }

    pub fn update_arrow(&mut self, patch: ArrowSettingsPatch) {
        if let Some(v) = patch.color {
            self.arrow.color = v;
        }
        if let Some(v) = patch.line_width {
            self.arrow.line_width = v;
        }
    }

    pub fn update_shape(&mut self, patch: ShapeSettingsPatch) {
        if let Some(v) = patch.color {
            self.shape.color = v;
        }
        if let Some(v) = patch.line_width {
            self.shape.line_width = v;
        }
        if let Some(v) = patch.fill {
            self.shape.fill = v;
        }
    }

    /// Payload for a text annotation using the current text settings.
    #[must_use]
    pub fn text_data(&self, text: String) -> AnnotationData {
        AnnotationData::Text(TextData {
            text,
            font_size: self.text.font_size,
            color: self.text.color.clone(),
            background_color: self.text.background_color.clone(),
        })
    }

    /// Payload for a finished drag from `start` to `end` (image pixels).
    ///
    /// Returns `None` for the text tool, and for drags shorter than
    /// `min_size` on both axes.
    #[must_use]
    pub fn drag_data(&self, tool: AnnotationTool, start: Point, end: Point, min_size: f64) -> Option<AnnotationData> {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if dx.abs() < min_size && dy.abs() < min_size {
            return None;
        }
        let shape = || ShapeData {
            width: dx,
            height: dy,
            color: self.shape.color.clone(),
            line_width: self.shape.line_width,
            fill: self.shape.fill,
        };
        match tool {
            AnnotationTool::Text => None,
            AnnotationTool::Arrow => Some(AnnotationData::Arrow(ArrowData {
                end_x: dx,
                end_y: dy,
                color: self.arrow.color.clone(),
                line_width: self.arrow.line_width,
                text: None,
            })),
            AnnotationTool::Rectangle => Some(AnnotationData::Rectangle(shape())),
            AnnotationTool::Circle => Some(AnnotationData::Circle(shape())),
        }
    }
}

// =============================================================
// Annotation mode
// =============================================================

/// Annotation-mode UI state owned by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationMode {
    /// Whether pointer input is routed to markup rather than navigation.
    pub enabled: bool,
    /// Active tool; `None` in annotation mode means click-to-delete.
    pub tool: Option<AnnotationTool>,
    /// Image-space point waiting for the host's text prompt.
    pub pending_text: Option<Point>,
    /// Annotation waiting for the host's delete confirmation.
    pub pending_delete: Option<AnnotationId>,
    pub settings: ToolSettings,
}

impl AnnotationMode {
    /// Enter or leave annotation mode. Leaving clears the tool and any
    /// pending prompt.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.tool = None;
            self.pending_text = None;
            self.pending_delete = None;
        }
    }

    /// Pick `tool`, entering annotation mode. Picking the active tool again
    /// deselects it.
    pub fn select_tool(&mut self, tool: Option<AnnotationTool>) {
        self.tool = if tool.is_some() && self.tool == tool { None } else { tool };
        if self.tool.is_some() {
            self.enabled = true;
        }
    }

    /// Active drag tool, if annotation mode routes pointer drags to markup.
    #[must_use]
    pub fn drag_tool(&self) -> Option<AnnotationTool> {
        self.tool.filter(|t| self.enabled && t.is_drag())
    }

    #[must_use]
    pub fn text_tool_active(&self) -> bool {
        self.enabled && self.tool == Some(AnnotationTool::Text)
    }

    /// Annotation mode with no tool: clicks pick annotations for deletion.
    #[must_use]
    pub fn delete_picking(&self) -> bool {
        self.enabled && self.tool.is_none()
    }
}

// =============================================================
// Store
// =============================================================

/// All annotations of the session, in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a new annotation under `ctx` and return a copy of it.
    pub fn add(&mut self, ctx: &ViewContext, anchor: Point, data: AnnotationData, now_ms: f64) -> Annotation {
        let annotation = Annotation {
            id: Uuid::new_v4().to_string(),
            drawing_id: ctx.drawing_id.clone(),
            discipline: ctx.discipline.clone(),
            revision: ctx.revision.clone(),
            x: anchor.x,
            y: anchor.y,
            data,
            created_at: now_ms,
            updated_at: now_ms,
        };
        log::debug!("annotation {} committed ({:?})", annotation.id, annotation.data.kind());
        self.annotations.push(annotation.clone());
        annotation
    }

    /// Replace an annotation's payload and bump `updatedAt`.
    pub fn update(&mut self, id: &str, data: AnnotationData, now_ms: f64) -> bool {
        let Some(annotation) = self.annotations.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        annotation.data = data;
        annotation.updated_at = now_ms;
        true
    }

    /// Remove one annotation. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.id != id);
        let removed = self.annotations.len() != before;
        if removed {
            log::debug!("annotation {id} deleted");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Annotations filed under exactly `ctx`, in stored order.
    pub fn for_context<'a>(&'a self, ctx: &'a ViewContext) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations.iter().filter(move |a| a.belongs_to(ctx))
    }

    /// Stored order; reversible so hit-testing can walk topmost first.
    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.annotations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Serialize every annotation as a pretty-printed JSON array.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; plain records never produce one.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.annotations)
    }

    /// Replace the whole list with a JSON array of annotations.
    ///
    /// On malformed input the error is logged and the current list is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Json`] when `json` is not an array of annotations.
    pub fn import_json(&mut self, json: &str) -> Result<usize, ImportError> {
        match serde_json::from_str::<Vec<Annotation>>(json) {
            Ok(list) => {
                self.annotations = list;
                Ok(self.annotations.len())
            }
            Err(e) => {
                log::warn!("annotation import rejected: {e}");
                Err(ImportError::Json(e))
            }
        }
    }
}
