use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::annotation::{
    Annotation, AnnotationData, AnnotationId, AnnotationMode, AnnotationStore, AnnotationTool, ArrowSettingsPatch,
    ShapeSettingsPatch, TextSettingsPatch, ViewContext,
};
use crate::camera::{ImagePlacement, Point, Viewport};
use crate::config::EngineConfig;
use crate::error::{ImportError, RenderError};
use crate::hit::{self, AnnotationHitOptions, ApproxMeasure, MeasureText};
use crate::image_cache::{HtmlImageSource, ImageCache};
use crate::input::{Button, InputState, Modifiers, TouchPoint, TouchTracker, WheelDelta, pinch_geometry};
use crate::layers::LayerStack;
use crate::metadata::{Discipline, ImageTransform, Metadata};
use crate::nav::Navigation;
use crate::render::{self, FramePlan, HotspotShape, LayerDraw, PassOutcome, PreviewShape, RenderGate};
use crate::transform::{PlacementKey, TransformResolver};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Action {
    SetCursor(String),
    RenderNeeded,
    /// A hotspot (or the host) switched the current drawing.
    DrawingSelected(String),
    /// The text tool was used at this image-space point; open the prompt.
    TextInputRequested(Point),
    /// A delete pick hit this annotation; ask the user to confirm.
    ConfirmDeleteRequested(AnnotationId),
    AnnotationCreated(Annotation),
    AnnotationUpdated(Annotation),
    AnnotationDeleted(AnnotationId),
    AnnotationsCleared,
    ViewportChanged(Viewport),
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore {
    pub config: EngineConfig,
    pub metadata: Option<Metadata>,
    pub nav: Navigation,
    pub transforms: TransformResolver,
    pub viewport: Viewport,
    pub layers: LayerStack,
    pub annotations: AnnotationStore,
    pub annotation_mode: AnnotationMode,
    pub input: InputState,
    /// Tap candidacy of the current single-finger touch.
    pub touch: Option<TouchTracker>,
    /// Base image placement of the last painted frame; `None` until a frame
    /// with a loaded base image has been painted.
    pub render_state: Option<ImagePlacement>,
    /// Drawing id of the hotspot under the pointer.
    pub hovered_hotspot: Option<String>,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
    pub gate: RenderGate,
    generation: u64,
    /// Set by a release that ended a drag; swallows the trailing click.
    suppress_click: bool,
    measure: Box<dyn MeasureText>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            metadata: None,
            nav: Navigation::new(),
            transforms: TransformResolver::new(),
            viewport: Viewport::default(),
            layers: LayerStack::new(),
            annotations: AnnotationStore::new(),
            annotation_mode: AnnotationMode::default(),
            input: InputState::default(),
            touch: None,
            render_state: None,
            hovered_hotspot: None,
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
            gate: RenderGate::new(),
            generation: 0,
            suppress_click: false,
            measure: Box::new(ApproxMeasure),
        }
    }

    /// Replace the text metrics used for text-annotation hit boxes.
    pub fn set_text_measure(&mut self, measure: Box<dyn MeasureText>) {
        self.measure = measure;
    }

    // --- Data inputs ---

    /// Install a project document and open the site map if it has one.
    pub fn load_metadata(&mut self, metadata: Metadata) -> Vec<Action> {
        self.transforms.clear_cache();
        self.nav = Navigation::new();
        self.render_state = None;
        let site_map = self.config.site_map_id.clone();
        let has_site_map = metadata.drawing(&site_map).is_some();
        self.metadata = Some(metadata);
        if has_site_map {
            return self.select_drawing(&site_map);
        }
        vec![Action::RenderNeeded]
    }

    /// Parse and install a project document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document does not parse; the current
    /// metadata is kept.
    pub fn load_metadata_json(&mut self, json: &str) -> Result<Vec<Action>, serde_json::Error> {
        let metadata = Metadata::from_json(json)?;
        Ok(self.load_metadata(metadata))
    }

    /// Update canvas dimensions (CSS pixels) and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        self.viewport_width = width_css;
        self.viewport_height = height_css;
        self.dpr = if dpr > 0.0 { dpr } else { 1.0 };
        vec![Action::RenderNeeded]
    }

    // --- Navigation ---

    /// Show drawing `id`: the viewport, layers and hover are reset, and the
    /// first discipline, region and revision beneath it are selected.
    pub fn select_drawing(&mut self, id: &str) -> Vec<Action> {
        let Some(metadata) = &self.metadata else {
            return Vec::new();
        };
        if !self.nav.select_drawing(metadata, id) {
            log::debug!("ignoring unknown drawing {id}");
            return Vec::new();
        }
        self.viewport.reset();
        self.layers.clear();
        self.hovered_hotspot = None;
        self.input = InputState::Idle;
        self.touch = None;
        self.annotation_mode.pending_text = None;
        self.annotation_mode.pending_delete = None;
        vec![
            Action::DrawingSelected(id.to_owned()),
            Action::ViewportChanged(self.viewport),
            Action::SetCursor(self.cursor().to_owned()),
            Action::RenderNeeded,
        ]
    }

    pub fn select_discipline(&mut self, name: &str) -> Vec<Action> {
        let changed = self.metadata.as_ref().is_some_and(|m| self.nav.select_discipline(m, name));
        render_if(changed)
    }

    pub fn select_region(&mut self, name: &str) -> Vec<Action> {
        let changed = self.metadata.as_ref().is_some_and(|m| self.nav.select_region(m, name));
        render_if(changed)
    }

    pub fn select_revision(&mut self, version: &str) -> Vec<Action> {
        let changed = self.metadata.as_ref().is_some_and(|m| self.nav.select_revision(m, version));
        render_if(changed)
    }

    #[must_use]
    pub fn is_site_map(&self) -> bool {
        self.nav.is_site_map(&self.config.site_map_id)
    }

    #[must_use]
    pub fn available_disciplines(&self) -> Vec<String> {
        self.metadata.as_ref().map(|m| self.nav.available_disciplines(m)).unwrap_or_default()
    }

    /// Versions selectable under the current discipline and region.
    #[must_use]
    pub fn available_revisions(&self) -> Vec<String> {
        self.metadata
            .as_ref()
            .map(|m| self.nav.available_revisions(m).iter().map(|r| r.version.clone()).collect())
            .unwrap_or_default()
    }

    /// The annotation context of the current selection.
    #[must_use]
    pub fn view_context(&self) -> Option<ViewContext> {
        Some(ViewContext {
            drawing_id: self.nav.drawing.clone()?,
            discipline: self.nav.discipline.clone(),
            revision: self.nav.revision.clone(),
        })
    }

    /// Absolute image transform of the current selection.
    pub fn current_transform(&mut self) -> Option<ImageTransform> {
        let metadata = self.metadata.as_ref()?;
        let key = PlacementKey {
            drawing: self.nav.drawing.as_deref()?,
            discipline: self.nav.discipline.as_deref(),
            revision: self.nav.revision.as_deref(),
            region: self.nav.region.as_deref(),
        };
        Some(self.transforms.absolute_transform(metadata, key))
    }

    // --- Viewport ---

    /// Zoom in one button step about the canvas centre.
    pub fn zoom_in(&mut self) -> Vec<Action> {
        let factor = self.config.button_zoom_step;
        self.zoom_about_center(factor)
    }

    /// Zoom out one button step about the canvas centre.
    pub fn zoom_out(&mut self) -> Vec<Action> {
        let factor = 1.0 / self.config.button_zoom_step;
        self.zoom_about_center(factor)
    }

    pub fn reset_viewport(&mut self) -> Vec<Action> {
        self.viewport.reset();
        self.viewport_changed()
    }

    #[must_use]
    pub fn zoom_percent(&self) -> i64 {
        self.viewport.zoom_percent()
    }

    fn zoom_about_center(&mut self, factor: f64) -> Vec<Action> {
        let center = Point::new(self.viewport_width / 2.0, self.viewport_height / 2.0);
        self.viewport.zoom_by(center, factor, self.config.min_zoom, self.config.max_zoom);
        self.viewport_changed()
    }

    fn viewport_changed(&self) -> Vec<Action> {
        vec![Action::ViewportChanged(self.viewport), Action::RenderNeeded]
    }

    // --- Layers ---

    /// Show or hide the overlay of `discipline` on the current drawing.
    pub fn toggle_layer(&mut self, discipline: &str) -> Vec<Action> {
        if !self.available_disciplines().iter().any(|d| d == discipline) {
            log::debug!("ignoring toggle of unknown discipline {discipline}");
            return Vec::new();
        }
        self.layers.toggle(discipline, self.config.default_layer_opacity);
        self.layers_changed()
    }

    pub fn set_layer_opacity(&mut self, discipline: &str, opacity: f64) -> Vec<Action> {
        self.layers.set_opacity(discipline, opacity);
        vec![Action::RenderNeeded]
    }

    pub fn set_layer_offset(&mut self, discipline: &str, offset_x: f64, offset_y: f64) -> Vec<Action> {
        render_if(self.layers.set_offset(discipline, offset_x, offset_y))
    }

    /// Reset one layer's offset, or every layer's when `discipline` is `None`.
    pub fn reset_layer_offset(&mut self, discipline: Option<&str>) -> Vec<Action> {
        match discipline {
            Some(d) => self.layers.reset_offset(d),
            None => self.layers.reset_all_offsets(),
        }
        vec![Action::RenderNeeded]
    }

    pub fn toggle_layer_lock(&mut self, discipline: &str) -> Vec<Action> {
        self.layers.toggle_lock(discipline);
        self.layers_changed()
    }

    pub fn bring_layer_to_front(&mut self, discipline: &str) -> Vec<Action> {
        self.layers.bring_to_front(discipline);
        vec![Action::RenderNeeded]
    }

    pub fn send_layer_to_back(&mut self, discipline: &str) -> Vec<Action> {
        self.layers.send_to_back(discipline);
        vec![Action::RenderNeeded]
    }

    /// Select the layer shift-drag moves; `None` clears the selection.
    pub fn select_layer(&mut self, discipline: Option<&str>) -> Vec<Action> {
        if !self.layers.select(discipline) {
            return Vec::new();
        }
        self.layers_changed()
    }

    fn layers_changed(&self) -> Vec<Action> {
        vec![Action::SetCursor(self.cursor().to_owned()), Action::RenderNeeded]
    }

    // --- Annotation mode ---

    pub fn set_annotation_mode(&mut self, enabled: bool) -> Vec<Action> {
        self.annotation_mode.set_enabled(enabled);
        self.abandon_shape();
        vec![Action::SetCursor(self.cursor().to_owned()), Action::RenderNeeded]
    }

    /// Pick a markup tool; picking the active tool again deselects it.
    pub fn select_annotation_tool(&mut self, tool: Option<AnnotationTool>) -> Vec<Action> {
        self.annotation_mode.select_tool(tool);
        self.abandon_shape();
        vec![Action::SetCursor(self.cursor().to_owned()), Action::RenderNeeded]
    }

    pub fn update_text_settings(&mut self, patch: TextSettingsPatch) {
        self.annotation_mode.settings.update_text(patch);
    }

    pub fn update_arrow_settings(&mut self, patch: ArrowSettingsPatch) {
        self.annotation_mode.settings.update_arrow(patch);
    }

    pub fn update_shape_settings(&mut self, patch: ShapeSettingsPatch) {
        self.annotation_mode.settings.update_shape(patch);
    }

    fn abandon_shape(&mut self) {
        if matches!(self.input, InputState::DrawingShape { .. }) {
            self.input = InputState::Idle;
        }
    }

    // --- Annotations ---

    /// Commit the text prompt at the buffered point. Blank text discards it.
    pub fn submit_text(&mut self, text: &str, now_ms: f64) -> Vec<Action> {
        let Some(anchor) = self.annotation_mode.pending_text.take() else {
            return Vec::new();
        };
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let Some(ctx) = self.view_context() else {
            return Vec::new();
        };
        let data = self.annotation_mode.settings.text_data(text.to_owned());
        let annotation = self.annotations.add(&ctx, anchor, data, now_ms);
        log::debug!("committed text annotation {}", annotation.id);
        vec![Action::AnnotationCreated(annotation), Action::RenderNeeded]
    }

    pub fn cancel_text(&mut self) {
        self.annotation_mode.pending_text = None;
    }

    /// Delete the annotation awaiting confirmation.
    pub fn confirm_delete(&mut self) -> Vec<Action> {
        match self.annotation_mode.pending_delete.take() {
            Some(id) => self.delete_annotation(&id),
            None => Vec::new(),
        }
    }

    pub fn cancel_delete(&mut self) {
        self.annotation_mode.pending_delete = None;
    }

    pub fn delete_annotation(&mut self, id: &str) -> Vec<Action> {
        if !self.annotations.delete(id) {
            return Vec::new();
        }
        log::debug!("deleted annotation {id}");
        vec![Action::AnnotationDeleted(id.to_owned()), Action::RenderNeeded]
    }

    pub fn clear_annotations(&mut self) -> Vec<Action> {
        self.annotations.clear();
        self.annotation_mode.pending_delete = None;
        vec![Action::AnnotationsCleared, Action::RenderNeeded]
    }

    /// Replace an annotation's payload, bumping its `updated_at`.
    pub fn update_annotation(&mut self, id: &str, data: AnnotationData, now_ms: f64) -> Vec<Action> {
        if !self.annotations.update(id, data, now_ms) {
            return Vec::new();
        }
        match self.annotations.get(id) {
            Some(a) => vec![Action::AnnotationUpdated(a.clone()), Action::RenderNeeded],
            None => vec![Action::RenderNeeded],
        }
    }

    /// Serialize every annotation of the session.
    ///
    /// # Errors
    ///
    /// Propagates the serializer error.
    pub fn export_annotations(&self) -> Result<String, serde_json::Error> {
        self.annotations.export_json()
    }

    /// Replace every annotation with the imported list.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] for malformed input; the store is unchanged.
    pub fn import_annotations(&mut self, json: &str) -> Result<Vec<Action>, ImportError> {
        let count = self.annotations.import_json(json)?;
        log::debug!("imported {count} annotations");
        Ok(vec![Action::RenderNeeded])
    }

    /// Annotations of the current drawing, discipline and revision.
    #[must_use]
    pub fn visible_annotations(&self) -> Vec<&Annotation> {
        match self.view_context() {
            Some(ctx) => self.annotations.iter().filter(|a| a.belongs_to(&ctx)).collect(),
            None => Vec::new(),
        }
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, canvas_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        self.suppress_click = false;

        if modifiers.shift {
            if let Some(layer) = self.layers.draggable_selected() {
                self.input = InputState::DraggingLayer { discipline: layer.discipline.clone(), last_canvas: canvas_pt };
                return vec![Action::SetCursor(self.cursor().to_owned())];
            }
        }

        if let Some(tool) = self.annotation_mode.drag_tool() {
            return self.begin_shape(tool, canvas_pt);
        }

        if self.annotation_mode.text_tool_active() {
            return Vec::new();
        }

        self.input = InputState::PanningCanvas { last_canvas: canvas_pt, origin: canvas_pt };
        vec![Action::SetCursor(self.cursor().to_owned())]
    }

    pub fn on_pointer_move(&mut self, canvas_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let img = self.canvas_to_image(canvas_pt);
        match &mut self.input {
            InputState::PanningCanvas { last_canvas, .. } => {
                let (dx, dy) = (canvas_pt.x - last_canvas.x, canvas_pt.y - last_canvas.y);
                *last_canvas = canvas_pt;
                self.viewport.pan_by(dx, dy);
                self.viewport_changed()
            }
            InputState::DraggingLayer { discipline, last_canvas } => {
                let dx = self.viewport.canvas_dist_to_viewport(canvas_pt.x - last_canvas.x);
                let dy = self.viewport.canvas_dist_to_viewport(canvas_pt.y - last_canvas.y);
                *last_canvas = canvas_pt;
                render_if(self.layers.translate(discipline, dx, dy))
            }
            InputState::DrawingShape { current_img, .. } => {
                if let Some(img) = img {
                    *current_img = img;
                }
                vec![Action::RenderNeeded]
            }
            InputState::Pinching { .. } => Vec::new(),
            InputState::Idle => self.update_hover(canvas_pt),
        }
    }

    pub fn on_pointer_up(&mut self, canvas_pt: Point, button: Button, _modifiers: Modifiers, time_ms: f64) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let mut actions = match std::mem::take(&mut self.input) {
            InputState::PanningCanvas { origin, .. } => {
                self.suppress_click = canvas_pt.distance(origin) > self.config.tap_slop_px;
                Vec::new()
            }
            InputState::DraggingLayer { .. } => {
                self.suppress_click = true;
                Vec::new()
            }
            InputState::DrawingShape { tool, start_img, current_img } => {
                self.suppress_click = true;
                let end = self.canvas_to_image(canvas_pt).unwrap_or(current_img);
                self.commit_shape(tool, start_img, end, time_ms)
            }
            InputState::Pinching { .. } | InputState::Idle => Vec::new(),
        };
        actions.push(Action::SetCursor(self.cursor().to_owned()));
        actions
    }

    /// A click that did not end a drag: hotspot selection, or a markup pick
    /// in annotation mode.
    pub fn on_click(&mut self, canvas_pt: Point) -> Vec<Action> {
        if std::mem::take(&mut self.suppress_click) {
            return Vec::new();
        }
        self.tap(canvas_pt)
    }

    pub fn on_wheel(&mut self, canvas_pt: Point, delta: WheelDelta, _modifiers: Modifiers) -> Vec<Action> {
        if delta.dy.abs() < f64::EPSILON {
            return Vec::new();
        }
        let factor = if delta.dy > 0.0 { self.config.wheel_zoom_out } else { self.config.wheel_zoom_in };
        self.viewport.zoom_by(canvas_pt, factor, self.config.min_zoom, self.config.max_zoom);
        self.viewport_changed()
    }

    /// `touches` holds every finger currently on the surface.
    pub fn on_touch_start(&mut self, touches: &[TouchPoint], time_ms: f64) -> Vec<Action> {
        match touches {
            [] => Vec::new(),
            [only] => {
                let pos = only.pos;
                self.touch = Some(TouchTracker::begin(pos, time_ms));
                if let Some(tool) = self.annotation_mode.drag_tool() {
                    if let Some(t) = &mut self.touch {
                        t.cancel();
                    }
                    return self.begin_shape(tool, pos);
                }
                if !self.annotation_mode.text_tool_active() {
                    self.input = InputState::PanningCanvas { last_canvas: pos, origin: pos };
                }
                Vec::new()
            }
            _ => {
                if let Some(t) = &mut self.touch {
                    t.cancel();
                }
                let was_drawing = matches!(self.input, InputState::DrawingShape { .. });
                if let Some((distance, _)) = pinch_geometry(touches) {
                    self.input = InputState::Pinching { last_distance: distance };
                }
                render_if(was_drawing)
            }
        }
    }

    pub fn on_touch_move(&mut self, touches: &[TouchPoint], _time_ms: f64) -> Vec<Action> {
        let first_img = touches.first().and_then(|t| self.canvas_to_image(t.pos));
        // Any single-finger travel counts against tap candidacy, whatever the gesture.
        let dragging = match (touches, self.touch.as_mut()) {
            ([only], Some(t)) => t.track(only.pos, self.config.tap_slop_px),
            _ => true,
        };
        match (&mut self.input, touches) {
            (InputState::Pinching { last_distance }, _) => {
                let Some((distance, mid)) = pinch_geometry(touches) else {
                    return Vec::new();
                };
                if *last_distance > 0.0 {
                    let ratio = distance / *last_distance;
                    self.viewport.zoom_by(mid, ratio, self.config.min_zoom, self.config.max_zoom);
                }
                *last_distance = distance;
                self.viewport_changed()
            }
            (InputState::PanningCanvas { last_canvas, .. }, [only]) => {
                if !dragging {
                    return Vec::new();
                }
                let (dx, dy) = (only.pos.x - last_canvas.x, only.pos.y - last_canvas.y);
                *last_canvas = only.pos;
                self.viewport.pan_by(dx, dy);
                self.viewport_changed()
            }
            (InputState::DrawingShape { current_img, .. }, [_]) => {
                if let Some(img) = first_img {
                    *current_img = img;
                }
                vec![Action::RenderNeeded]
            }
            _ => Vec::new(),
        }
    }

    /// `remaining` holds the fingers still down; `ended` the ones lifted.
    pub fn on_touch_end(&mut self, remaining: &[TouchPoint], ended: &[TouchPoint], time_ms: f64) -> Vec<Action> {
        let mut actions = match std::mem::take(&mut self.input) {
            InputState::DrawingShape { tool, start_img, current_img } => {
                let end = ended.first().and_then(|t| self.canvas_to_image(t.pos)).unwrap_or(current_img);
                self.commit_shape(tool, start_img, end, time_ms)
            }
            _ => Vec::new(),
        };

        if remaining.is_empty() {
            if let Some(t) = self.touch.take() {
                if t.is_tap(time_ms, self.config.tap_max_ms) {
                    actions.extend(self.tap(t.start));
                }
            }
        }
        actions.push(Action::SetCursor(self.cursor().to_owned()));
        actions
    }

    /// The browser took the touches away: drop the gesture without
    /// committing a shape or dispatching a tap.
    pub fn on_touch_cancel(&mut self) -> Vec<Action> {
        let was_drawing = matches!(self.input, InputState::DrawingShape { .. });
        self.input = InputState::Idle;
        self.touch = None;
        let mut actions = vec![Action::SetCursor(self.cursor().to_owned())];
        if was_drawing {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    fn begin_shape(&mut self, tool: AnnotationTool, canvas_pt: Point) -> Vec<Action> {
        let Some(img) = self.canvas_to_image(canvas_pt) else {
            return Vec::new();
        };
        self.input = InputState::DrawingShape { tool, start_img: img, current_img: img };
        vec![Action::RenderNeeded]
    }

    fn commit_shape(&mut self, tool: AnnotationTool, start: Point, end: Point, now_ms: f64) -> Vec<Action> {
        let Some(ctx) = self.view_context() else {
            return vec![Action::RenderNeeded];
        };
        let Some(data) = self.annotation_mode.settings.drag_data(tool, start, end, self.config.min_shape_size) else {
            log::debug!("discarding undersized {tool:?}");
            return vec![Action::RenderNeeded];
        };
        let annotation = self.annotations.add(&ctx, start, data, now_ms);
        log::debug!("committed {tool:?} annotation {}", annotation.id);
        vec![Action::AnnotationCreated(annotation), Action::RenderNeeded]
    }

    /// Route a click or tap.
    fn tap(&mut self, canvas_pt: Point) -> Vec<Action> {
        if self.annotation_mode.enabled {
            return self.annotation_tap(canvas_pt);
        }
        match self.hotspot_under(canvas_pt) {
            Some(id) => self.select_drawing(&id),
            None => Vec::new(),
        }
    }

    fn annotation_tap(&mut self, canvas_pt: Point) -> Vec<Action> {
        let Some(img) = self.canvas_to_image(canvas_pt) else {
            return Vec::new();
        };
        if self.annotation_mode.text_tool_active() {
            self.annotation_mode.pending_text = Some(img);
            return vec![Action::TextInputRequested(img)];
        }
        if !self.annotation_mode.delete_picking() {
            return Vec::new();
        }
        let Some(id) = self.annotation_under(img) else {
            return Vec::new();
        };
        self.annotation_mode.pending_delete = Some(id.clone());
        vec![Action::ConfirmDeleteRequested(id)]
    }

    fn annotation_under(&self, img: Point) -> Option<AnnotationId> {
        let ctx = self.view_context()?;
        let options = AnnotationHitOptions {
            image_scale: self.render_state.map_or(1.0, |p| p.scale),
            arrow_tolerance: self.config.arrow_hit_tolerance,
            text_padding: self.config.text_hit_padding,
        };
        let candidates: Vec<&Annotation> = self.annotations.for_context(&ctx).collect();
        hit::annotation_at(candidates.into_iter(), img, &options, self.measure.as_ref()).map(|a| a.id.clone())
    }

    fn hotspot_under(&self, canvas_pt: Point) -> Option<String> {
        if !self.is_site_map() {
            return None;
        }
        let metadata = self.metadata.as_ref()?;
        let placement = self.render_state.as_ref()?;
        hit::hotspot_at(metadata, &self.config.site_map_id, placement, &self.viewport, canvas_pt)
            .map(|h| h.drawing_id.to_owned())
    }

    fn update_hover(&mut self, canvas_pt: Point) -> Vec<Action> {
        let hovered = self.hotspot_under(canvas_pt);
        if hovered == self.hovered_hotspot {
            return Vec::new();
        }
        self.hovered_hotspot = hovered;
        vec![Action::SetCursor(self.cursor().to_owned()), Action::RenderNeeded]
    }

    fn canvas_to_image(&self, canvas_pt: Point) -> Option<Point> {
        self.render_state.map(|p| p.canvas_to_image(&self.viewport, canvas_pt))
    }

    // --- Queries ---

    /// CSS cursor for the current gesture, hover and selection.
    #[must_use]
    pub fn cursor(&self) -> &'static str {
        match self.input {
            InputState::DraggingLayer { .. } => return "move",
            InputState::PanningCanvas { .. } => return "grabbing",
            _ => {}
        }
        if self.hovered_hotspot.is_some() {
            "pointer"
        } else if self.layers.selected().is_some() || (self.annotation_mode.enabled && self.annotation_mode.tool.is_some()) {
            "crosshair"
        } else {
            "grab"
        }
    }

    /// The most recent render generation handed out by [`Self::plan_frame`].
    #[must_use]
    pub fn render_generation(&self) -> u64 {
        self.generation
    }

    // --- Render ---

    /// Snapshot the current state into the next frame to draw.
    ///
    /// Each call takes a fresh generation and marks it as the latest on
    /// [`Self::gate`], so passes planned earlier are discarded when they
    /// finish loading.
    pub fn plan_frame(&mut self) -> FramePlan {
        self.generation += 1;
        self.gate.request(self.generation);

        let mut plan = FramePlan {
            generation: self.generation,
            width: self.viewport_width,
            height: self.viewport_height,
            dpr: self.dpr,
            viewport: self.viewport,
            fit_ratio: self.config.fit_ratio,
            base_image: None,
            hotspots: Vec::new(),
            layers: Vec::new(),
            annotations: Vec::new(),
            preview: None,
        };
        let Some(metadata) = &self.metadata else {
            return plan;
        };
        let site_map = self.config.site_map_id.as_str();

        plan.base_image = self.nav.base_image(metadata, site_map).map(str::to_owned);

        if self.is_site_map() {
            plan.hotspots = metadata
                .hotspots(site_map)
                .map(|h| HotspotShape {
                    drawing_id: h.drawing_id.to_owned(),
                    label: h.name.to_owned(),
                    vertices: h.vertices.to_vec(),
                    hovered: self.hovered_hotspot.as_deref() == Some(h.drawing_id),
                })
                .collect();
        }

        if let Some(drawing) = self.nav.current_drawing(metadata) {
            let selected = self.layers.selected().map(|l| l.discipline.as_str());
            plan.layers = self
                .layers
                .visible_sorted()
                .into_iter()
                .filter_map(|layer| {
                    let image = drawing.discipline(&layer.discipline).and_then(Discipline::layer_image)?;
                    Some(LayerDraw {
                        discipline: layer.discipline.clone(),
                        image: image.to_owned(),
                        offset: Point::new(layer.offset_x, layer.offset_y),
                        alpha: layer.alpha(),
                        selected: selected == Some(layer.discipline.as_str()),
                    })
                })
                .collect();
        }

        plan.annotations = self.visible_annotations().into_iter().cloned().collect();

        if let InputState::DrawingShape { tool, start_img, current_img } = &self.input {
            plan.preview = self
                .annotation_mode
                .settings
                .drag_data(*tool, *start_img, *current_img, 0.0)
                .map(|data| PreviewShape { anchor: *start_img, data });
        }
        plan
    }
}

fn render_if(changed: bool) -> Vec<Action> {
    if changed { vec![Action::RenderNeeded] } else { Vec::new() }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn device_pixels(css: f64, dpr: f64) -> u32 {
    (css * dpr).round().max(0.0) as u32
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    cache: Rc<ImageCache<HtmlImageSource>>,
    /// Placement reported by the latest painted pass.
    painted: Rc<Cell<Option<ImagePlacement>>>,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Canvas`] when the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement, config: EngineConfig) -> Result<Self, RenderError> {
        let ctx = canvas
            .get_context("2d")
            .map_err(|e| RenderError::Canvas(format!("{e:?}")))?
            .ok_or_else(|| RenderError::Canvas("2d context unavailable".to_owned()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|e| RenderError::Canvas(format!("{e:?}")))?;
        let cache = Rc::new(ImageCache::new(HtmlImageSource::new(config.image_base_path.clone())));
        let mut core = EngineCore::with_config(config);
        core.set_text_measure(Box::new(ctx.clone()));
        Ok(Self { canvas, ctx, cache, painted: Rc::new(Cell::new(None)), core })
    }

    #[must_use]
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Pick up the placement of the last painted frame before hit-testing.
    fn sync(&mut self) -> &mut EngineCore {
        self.core.render_state = self.painted.get();
        &mut self.core
    }

    // --- Delegated data inputs ---

    pub fn load_metadata(&mut self, metadata: Metadata) -> Vec<Action> {
        self.painted.set(None);
        self.core.load_metadata(metadata)
    }

    /// # Errors
    ///
    /// See [`EngineCore::load_metadata_json`].
    pub fn load_metadata_json(&mut self, json: &str) -> Result<Vec<Action>, serde_json::Error> {
        let metadata = Metadata::from_json(json)?;
        Ok(self.load_metadata(metadata))
    }

    /// Resize the canvas backing store and record the CSS size.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        let actions = self.core.set_viewport(width_css, height_css, dpr);
        let dpr = self.core.dpr;
        self.canvas.set_width(device_pixels(width_css, dpr));
        self.canvas.set_height(device_pixels(height_css, dpr));
        actions
    }

    pub fn set_cursor(&self, cursor: &str) {
        if let Err(e) = self.canvas.style().set_property("cursor", cursor) {
            log::warn!("failed to set cursor: {e:?}");
        }
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, canvas_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.sync().on_pointer_down(canvas_pt, button, modifiers)
    }

    pub fn on_pointer_move(&mut self, canvas_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        self.sync().on_pointer_move(canvas_pt, modifiers)
    }

    pub fn on_pointer_up(&mut self, canvas_pt: Point, button: Button, modifiers: Modifiers, time_ms: f64) -> Vec<Action> {
        self.sync().on_pointer_up(canvas_pt, button, modifiers, time_ms)
    }

    pub fn on_click(&mut self, canvas_pt: Point) -> Vec<Action> {
        self.sync().on_click(canvas_pt)
    }

    pub fn on_wheel(&mut self, canvas_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        self.sync().on_wheel(canvas_pt, delta, modifiers)
    }

    pub fn on_touch_start(&mut self, touches: &[TouchPoint], time_ms: f64) -> Vec<Action> {
        self.sync().on_touch_start(touches, time_ms)
    }

    pub fn on_touch_move(&mut self, touches: &[TouchPoint], time_ms: f64) -> Vec<Action> {
        self.sync().on_touch_move(touches, time_ms)
    }

    pub fn on_touch_end(&mut self, remaining: &[TouchPoint], ended: &[TouchPoint], time_ms: f64) -> Vec<Action> {
        self.sync().on_touch_end(remaining, ended, time_ms)
    }

    pub fn on_touch_cancel(&mut self) -> Vec<Action> {
        self.core.on_touch_cancel()
    }

    // --- Render ---

    /// Start an asynchronous render pass of the current state.
    ///
    /// The pass paints once its bitmaps are loaded, unless another render
    /// was requested in the meantime.
    pub fn render(&mut self) {
        let plan = self.core.plan_frame();
        let cache = Rc::clone(&self.cache);
        let ctx = self.ctx.clone();
        let gate = self.core.gate.clone();
        let painted = Rc::clone(&self.painted);
        wasm_bindgen_futures::spawn_local(async move {
            if let PassOutcome::Painted(placement) = render::render_pass(plan, cache.as_ref(), &ctx, &gate).await {
                painted.set(placement);
            }
        });
    }
}
