//! Rendering: composites the drawing, hotspots, layers and markup onto a 2D surface.
//!
//! A frame is produced in two phases. [`FramePlan`] is a synchronous snapshot
//! of everything the frame needs, taken from engine state and tagged with a
//! render generation. [`FramePlan::load`] awaits the bitmaps through the
//! [`ImageCache`] and yields a [`LoadedFrame`], which [`paint`] draws without
//! touching engine state. The caller discards a loaded frame whose generation
//! is no longer the latest.
//!
//! Drawing goes through the [`Surface`] trait so the pass can be recorded and
//! asserted natively; [`CanvasRenderingContext2d`] is the browser backend.
//! A failing sub-draw is logged and skipped; [`paint`] never fails.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::annotation::{Annotation, AnnotationData, ArrowData, ShapeData, TextData};
use crate::camera::{ImagePlacement, Point, Viewport};
use crate::consts::{
    ARROW_HEAD_ANGLE, ARROW_HEAD_MIN, ARROW_HEAD_PER_WIDTH, HOTSPOT_LABEL_HEIGHT, HOTSPOT_LABEL_PADDING,
    HOTSPOT_LABEL_RADIUS, LAYER_OUTLINE_PADDING, MIN_POLYGON_VERTICES, PREVIEW_ALPHA, TEXT_BACKGROUND_PADDING,
};
use crate::error::RenderError;
use crate::hit::MeasureText;
use crate::image_cache::{Bitmap, ImageCache, ImageSource};

const HOTSPOT_FILL: &str = "rgba(59, 130, 246, 0.2)";
const HOTSPOT_FILL_HOVER: &str = "rgba(255, 193, 7, 0.35)";
const HOTSPOT_STROKE: &str = "rgba(59, 130, 246, 0.7)";
const HOTSPOT_STROKE_HOVER: &str = "rgba(255, 193, 7, 1)";
const HOTSPOT_LABEL_BG: &str = "rgba(59, 130, 246, 0.85)";
const HOTSPOT_LABEL_BG_HOVER: &str = "rgba(255, 193, 7, 0.9)";
const HOTSPOT_LABEL_FONT: &str = "bold 12px sans-serif";

const LAYER_OUTLINE_COLOR: &str = "#3b82f6";
const LAYER_OUTLINE_WIDTH: f64 = 3.0;
const LAYER_OUTLINE_DASH: [f64; 2] = [8.0, 4.0];

/// Dash pattern of in-progress shape previews, in viewport units.
const PREVIEW_DASH: [f64; 2] = [6.0, 4.0];

/// Shape fill alpha relative to the stroke.
const SHAPE_FILL_ALPHA: f64 = 0.2;

const ARROW_LABEL_FONT_SIZE: f64 = 14.0;

/// CSS font shorthand for annotation text of `size` viewport units.
#[must_use]
pub fn font_css(size: f64) -> String {
    format!("{size}px sans-serif")
}

// =============================================================
// Surface
// =============================================================

/// The 2D drawing backend. Mirrors the subset of `CanvasRenderingContext2D`
/// the renderer uses; fallible calls return [`RenderError`].
pub trait Surface: MeasureText {
    type Image: Bitmap;

    fn save(&self);
    fn restore(&self);
    fn set_transform(&self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), RenderError>;
    fn clear_rect(&self, x: f64, y: f64, w: f64, h: f64);
    fn set_global_alpha(&self, alpha: f64);
    fn draw_image(&self, image: &Self::Image, x: f64, y: f64, w: f64, h: f64) -> Result<(), RenderError>;
    fn set_fill_style(&self, style: &str);
    fn set_stroke_style(&self, style: &str);
    fn set_line_width(&self, width: f64);
    fn set_line_dash(&self, segments: &[f64]) -> Result<(), RenderError>;
    fn set_font(&self, font: &str);
    fn set_text_align(&self, align: &str);
    fn set_text_baseline(&self, baseline: &str);
    fn begin_path(&self);
    fn move_to(&self, x: f64, y: f64);
    fn line_to(&self, x: f64, y: f64);
    fn arc_to(&self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> Result<(), RenderError>;
    fn ellipse(&self, cx: f64, cy: f64, rx: f64, ry: f64) -> Result<(), RenderError>;
    fn close_path(&self);
    fn fill(&self);
    fn stroke(&self);
    fn fill_rect(&self, x: f64, y: f64, w: f64, h: f64);
    fn stroke_rect(&self, x: f64, y: f64, w: f64, h: f64);
    fn fill_text(&self, text: &str, x: f64, y: f64) -> Result<(), RenderError>;
    /// Width of `text` in the current font.
    fn measure_text(&self, text: &str) -> f64;
}

fn canvas_err(e: JsValue) -> RenderError {
    RenderError::Canvas(format!("{e:?}"))
}

impl MeasureText for CanvasRenderingContext2d {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        self.save();
        self.set_font(&font_css(font_size));
        let width = Surface::measure_text(self, text);
        self.restore();
        width
    }
}

impl Surface for CanvasRenderingContext2d {
    type Image = web_sys::HtmlImageElement;

    fn save(&self) {
        CanvasRenderingContext2d::save(self);
    }

    fn restore(&self) {
        CanvasRenderingContext2d::restore(self);
    }

    fn set_transform(&self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), RenderError> {
        CanvasRenderingContext2d::set_transform(self, a, b, c, d, e, f).map_err(canvas_err)
    }

    fn clear_rect(&self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::clear_rect(self, x, y, w, h);
    }

    fn set_global_alpha(&self, alpha: f64) {
        CanvasRenderingContext2d::set_global_alpha(self, alpha);
    }

    fn draw_image(&self, image: &Self::Image, x: f64, y: f64, w: f64, h: f64) -> Result<(), RenderError> {
        self.draw_image_with_html_image_element_and_dw_and_dh(image, x, y, w, h)
            .map_err(canvas_err)
    }

    fn set_fill_style(&self, style: &str) {
        self.set_fill_style_str(style);
    }

    fn set_stroke_style(&self, style: &str) {
        self.set_stroke_style_str(style);
    }

    fn set_line_width(&self, width: f64) {
        CanvasRenderingContext2d::set_line_width(self, width);
    }

    fn set_line_dash(&self, segments: &[f64]) -> Result<(), RenderError> {
        let dash_array = js_sys::Array::new();
        for segment in segments {
            dash_array.push(&(*segment).into());
        }
        CanvasRenderingContext2d::set_line_dash(self, &dash_array).map_err(canvas_err)
    }

    fn set_font(&self, font: &str) {
        CanvasRenderingContext2d::set_font(self, font);
    }

    fn set_text_align(&self, align: &str) {
        CanvasRenderingContext2d::set_text_align(self, align);
    }

    fn set_text_baseline(&self, baseline: &str) {
        CanvasRenderingContext2d::set_text_baseline(self, baseline);
    }

    fn begin_path(&self) {
        CanvasRenderingContext2d::begin_path(self);
    }

    fn move_to(&self, x: f64, y: f64) {
        CanvasRenderingContext2d::move_to(self, x, y);
    }

    fn line_to(&self, x: f64, y: f64) {
        CanvasRenderingContext2d::line_to(self, x, y);
    }

    fn arc_to(&self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> Result<(), RenderError> {
        CanvasRenderingContext2d::arc_to(self, x1, y1, x2, y2, radius).map_err(canvas_err)
    }

    fn ellipse(&self, cx: f64, cy: f64, rx: f64, ry: f64) -> Result<(), RenderError> {
        CanvasRenderingContext2d::ellipse(self, cx, cy, rx, ry, 0.0, 0.0, std::f64::consts::TAU).map_err(canvas_err)
    }

    fn close_path(&self) {
        CanvasRenderingContext2d::close_path(self);
    }

    fn fill(&self) {
        CanvasRenderingContext2d::fill(self);
    }

    fn stroke(&self) {
        CanvasRenderingContext2d::stroke(self);
    }

    fn fill_rect(&self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::fill_rect(self, x, y, w, h);
    }

    fn stroke_rect(&self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::stroke_rect(self, x, y, w, h);
    }

    fn fill_text(&self, text: &str, x: f64, y: f64) -> Result<(), RenderError> {
        CanvasRenderingContext2d::fill_text(self, text, x, y).map_err(canvas_err)
    }

    fn measure_text(&self, text: &str) -> f64 {
        match CanvasRenderingContext2d::measure_text(self, text) {
            Ok(metrics) => metrics.width(),
            Err(e) => {
                log::warn!("measureText failed: {e:?}");
                0.0
            }
        }
    }
}

/// Run `draw` between `save` and `restore`, restoring even when it fails.
fn scoped<S: Surface>(surface: &S, draw: impl FnOnce(&S) -> Result<(), RenderError>) -> Result<(), RenderError> {
    surface.save();
    let result = draw(surface);
    surface.restore();
    result
}

/// Axis-aligned rectangle in whatever space the caller draws in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

// =============================================================
// Images
// =============================================================

/// Where an image of `image_w` × `image_h` lands when its centre is placed at
/// `center + offset` and scaled uniformly.
#[must_use]
pub fn centered_bounds(image_w: f64, image_h: f64, center: Point, scale: f64, offset_x: f64, offset_y: f64) -> Rect {
    let width = image_w * scale;
    let height = image_h * scale;
    Rect {
        x: center.x + offset_x - width * 0.5,
        y: center.y + offset_y - height * 0.5,
        width,
        height,
    }
}

/// Draw `image` centred at `center + offset`, scaled uniformly, at `alpha`.
///
/// # Errors
///
/// Returns `Err` if the surface rejects the draw.
pub fn draw_image_centered<S: Surface>(
    surface: &S,
    image: &S::Image,
    center: Point,
    scale: f64,
    offset: Point,
    alpha: f64,
) -> Result<(), RenderError> {
    let bounds = centered_bounds(image.width(), image.height(), center, scale, offset.x, offset.y);
    scoped(surface, |s| {
        s.set_global_alpha(alpha);
        s.draw_image(image, bounds.x, bounds.y, bounds.width, bounds.height)
    })
}

/// Dashed outline around a selected layer's drawn bounds.
///
/// # Errors
///
/// Returns `Err` if the surface rejects the dash pattern.
pub fn draw_layer_outline<S: Surface>(surface: &S, bounds: Rect) -> Result<(), RenderError> {
    scoped(surface, |s| {
        s.set_stroke_style(LAYER_OUTLINE_COLOR);
        s.set_line_width(LAYER_OUTLINE_WIDTH);
        s.set_line_dash(&LAYER_OUTLINE_DASH)?;
        s.stroke_rect(
            bounds.x - LAYER_OUTLINE_PADDING,
            bounds.y - LAYER_OUTLINE_PADDING,
            bounds.width + LAYER_OUTLINE_PADDING * 2.0,
            bounds.height + LAYER_OUTLINE_PADDING * 2.0,
        );
        Ok(())
    })
}

// =============================================================
// Hotspots
// =============================================================

/// Draw a hotspot polygon (image-space vertices) in canvas space.
///
/// The pan/zoom transform is replaced by the device-pixel transform and the
/// viewport is applied to each vertex by hand, so outline widths and the
/// label stay the same size at every zoom. Polygons with fewer than three
/// vertices are skipped.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn draw_hotspot_polygon<S: Surface>(
    surface: &S,
    vertices: &[[f64; 2]],
    placement: &ImagePlacement,
    viewport: &Viewport,
    dpr: f64,
    hovered: bool,
    label: Option<&str>,
) -> Result<(), RenderError> {
    if vertices.len() < MIN_POLYGON_VERTICES {
        return Ok(());
    }
    let points: Vec<Point> = vertices
        .iter()
        .map(|&[x, y]| placement.image_to_canvas(viewport, Point::new(x, y)))
        .collect();

    scoped(surface, |s| {
        s.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;

        s.begin_path();
        for (i, p) in points.iter().enumerate() {
            if i == 0 {
                s.move_to(p.x, p.y);
            } else {
                s.line_to(p.x, p.y);
            }
        }
        s.close_path();
        s.set_fill_style(if hovered { HOTSPOT_FILL_HOVER } else { HOTSPOT_FILL });
        s.fill();
        s.set_stroke_style(if hovered { HOTSPOT_STROKE_HOVER } else { HOTSPOT_STROKE });
        s.set_line_width(if hovered { 3.0 } else { 2.0 });
        s.stroke();

        match label {
            Some(text) if !text.is_empty() => draw_hotspot_label(s, text, centroid(&points), hovered),
            _ => Ok(()),
        }
    })
}

#[allow(clippy::cast_precision_loss)]
fn centroid(points: &[Point]) -> Point {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

fn draw_hotspot_label<S: Surface>(s: &S, text: &str, center: Point, hovered: bool) -> Result<(), RenderError> {
    s.set_font(HOTSPOT_LABEL_FONT);
    let width = s.measure_text(text) + HOTSPOT_LABEL_PADDING * 2.0;
    let bg = Rect {
        x: center.x - width * 0.5,
        y: center.y - HOTSPOT_LABEL_HEIGHT * 0.5,
        width,
        height: HOTSPOT_LABEL_HEIGHT,
    };
    s.set_fill_style(if hovered { HOTSPOT_LABEL_BG_HOVER } else { HOTSPOT_LABEL_BG });
    rounded_rect_path(s, bg, HOTSPOT_LABEL_RADIUS)?;
    s.fill();

    s.set_fill_style("white");
    s.set_text_align("center");
    s.set_text_baseline("middle");
    s.fill_text(text, center.x, center.y)
}

fn rounded_rect_path<S: Surface>(s: &S, r: Rect, radius: f64) -> Result<(), RenderError> {
    let radius = radius.min(r.width * 0.5).min(r.height * 0.5).max(0.0);
    let (x0, y0, x1, y1) = (r.x, r.y, r.x + r.width, r.y + r.height);
    s.begin_path();
    s.move_to(x0 + radius, y0);
    s.arc_to(x1, y0, x1, y1, radius)?;
    s.arc_to(x1, y1, x0, y1, radius)?;
    s.arc_to(x0, y1, x0, y0, radius)?;
    s.arc_to(x0, y0, x1, y0, radius)?;
    s.close_path();
    Ok(())
}

// =============================================================
// Annotations
// =============================================================

/// Stroke styling for committed markup versus a drag preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkupStyle {
    pub alpha: f64,
    pub dashed: bool,
}

impl MarkupStyle {
    pub const COMMITTED: Self = Self { alpha: 1.0, dashed: false };
    pub const PREVIEW: Self = Self { alpha: PREVIEW_ALPHA, dashed: true };
}

/// Draw one annotation inside the viewport transform.
///
/// Geometry is stored in image pixels and mapped through `placement`; line
/// widths and font sizes are viewport units and are not scaled.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn draw_annotation<S: Surface>(
    surface: &S,
    anchor: Point,
    data: &AnnotationData,
    placement: &ImagePlacement,
    style: MarkupStyle,
) -> Result<(), RenderError> {
    let at = placement.image_to_viewport(anchor);
    let scale = placement.scale;
    scoped(surface, |s| {
        s.set_global_alpha(style.alpha);
        if style.dashed {
            s.set_line_dash(&PREVIEW_DASH)?;
        }
        match data {
            AnnotationData::Text(d) => draw_text_box(s, at, d),
            AnnotationData::Arrow(d) => draw_arrow(s, at, Point::new(at.x + d.end_x * scale, at.y + d.end_y * scale), d),
            AnnotationData::Rectangle(d) => draw_shape(s, at, d, scale, style, false),
            AnnotationData::Circle(d) => draw_shape(s, at, d, scale, style, true),
        }
    })
}

/// Text with an optional background box; the anchor is the text's top-left.
fn draw_text_box<S: Surface>(s: &S, at: Point, d: &TextData) -> Result<(), RenderError> {
    s.set_font(&font_css(d.font_size));
    if let Some(bg) = &d.background_color {
        let width = s.measure_text(&d.text);
        s.set_fill_style(bg);
        s.fill_rect(
            at.x - TEXT_BACKGROUND_PADDING,
            at.y - TEXT_BACKGROUND_PADDING,
            width + TEXT_BACKGROUND_PADDING * 2.0,
            d.font_size + TEXT_BACKGROUND_PADDING * 2.0,
        );
    }
    s.set_fill_style(&d.color);
    s.set_text_align("left");
    s.set_text_baseline("top");
    s.fill_text(&d.text, at.x, at.y)
}

/// The two arrowhead barb endpoints for a shaft ending at `head`.
#[must_use]
pub fn arrowhead(tail: Point, head: Point, line_width: f64) -> (Point, Point) {
    let angle = (head.y - tail.y).atan2(head.x - tail.x);
    let len = (line_width * ARROW_HEAD_PER_WIDTH).max(ARROW_HEAD_MIN);
    let barb = |a: f64| Point::new(head.x - len * a.cos(), head.y - len * a.sin());
    (barb(angle - ARROW_HEAD_ANGLE), barb(angle + ARROW_HEAD_ANGLE))
}

fn draw_arrow<S: Surface>(s: &S, tail: Point, head: Point, d: &ArrowData) -> Result<(), RenderError> {
    let (left, right) = arrowhead(tail, head, d.line_width);
    s.set_stroke_style(&d.color);
    s.set_line_width(d.line_width);
    s.begin_path();
    s.move_to(tail.x, tail.y);
    s.line_to(head.x, head.y);
    s.move_to(left.x, left.y);
    s.line_to(head.x, head.y);
    s.line_to(right.x, right.y);
    s.stroke();

    match d.text.as_deref() {
        Some(text) if !text.is_empty() => {
            let mid = tail.midpoint(head);
            s.set_font(&font_css(ARROW_LABEL_FONT_SIZE));
            s.set_fill_style(&d.color);
            s.set_text_align("center");
            s.set_text_baseline("bottom");
            s.fill_text(text, mid.x, mid.y - d.line_width)
        }
        _ => Ok(()),
    }
}

fn draw_shape<S: Surface>(
    s: &S,
    at: Point,
    d: &ShapeData,
    scale: f64,
    style: MarkupStyle,
    ellipse: bool,
) -> Result<(), RenderError> {
    let (w, h) = (d.width * scale, d.height * scale);
    s.set_stroke_style(&d.color);
    s.set_fill_style(&d.color);
    s.set_line_width(d.line_width);
    s.begin_path();
    if ellipse {
        s.ellipse(at.x + w * 0.5, at.y + h * 0.5, (w * 0.5).abs(), (h * 0.5).abs())?;
    } else {
        s.move_to(at.x, at.y);
        s.line_to(at.x + w, at.y);
        s.line_to(at.x + w, at.y + h);
        s.line_to(at.x, at.y + h);
        s.close_path();
    }
    if d.fill {
        s.set_global_alpha(style.alpha * SHAPE_FILL_ALPHA);
        s.fill();
        s.set_global_alpha(style.alpha);
    }
    s.stroke();
    Ok(())
}

// =============================================================
// Frame pipeline
// =============================================================

/// A site-map hotspot as it should be drawn this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotShape {
    pub drawing_id: String,
    pub label: String,
    pub vertices: Vec<[f64; 2]>,
    pub hovered: bool,
}

/// A visible overlay layer as it should be drawn this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDraw {
    pub discipline: String,
    /// Logical path of the layer's image.
    pub image: String,
    /// Viewport-unit offset from the base placement.
    pub offset: Point,
    pub alpha: f64,
    pub selected: bool,
}

/// The shape being dragged out, drawn over the committed markup.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewShape {
    /// Image-space press point.
    pub anchor: Point,
    pub data: AnnotationData,
}

/// Synchronous snapshot of everything one render pass draws.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    /// Monotonically increasing per render request.
    pub generation: u64,
    /// Canvas size in CSS pixels.
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
    pub viewport: Viewport,
    pub fit_ratio: f64,
    /// Logical path of the base image; `None` draws an empty frame.
    pub base_image: Option<String>,
    /// Site-map hotspots; empty on every other drawing.
    pub hotspots: Vec<HotspotShape>,
    /// Visible layers in ascending z-order.
    pub layers: Vec<LayerDraw>,
    /// Annotations of the current context, in stored order.
    pub annotations: Vec<Annotation>,
    pub preview: Option<PreviewShape>,
}

/// A [`FramePlan`] with its bitmaps resolved.
pub struct LoadedFrame<I> {
    pub plan: FramePlan,
    pub base: Option<Rc<I>>,
    /// Fitted placement of the base image; `None` when it failed to load.
    pub placement: Option<ImagePlacement>,
    /// One entry per `plan.layers`; `None` where the load failed.
    pub layers: Vec<Option<Rc<I>>>,
}

impl FramePlan {
    /// Resolve every bitmap the plan needs, base image first, then layers in
    /// draw order.
    ///
    /// Failed loads are logged and left empty. Without a base image there is
    /// no placement, so layer loads are skipped as well.
    pub async fn load<S: ImageSource>(self, cache: &ImageCache<S>) -> LoadedFrame<S::Image> {
        let base = match &self.base_image {
            Some(path) => fetch(cache, path).await,
            None => None,
        };
        let placement = base
            .as_ref()
            .map(|image| ImagePlacement::fit(image.width(), image.height(), self.width, self.height, self.fit_ratio));

        let mut layers = Vec::with_capacity(self.layers.len());
        if placement.is_some() {
            for layer in &self.layers {
                layers.push(fetch(cache, &layer.image).await);
            }
        }
        LoadedFrame { plan: self, base, placement, layers }
    }
}

async fn fetch<S: ImageSource>(cache: &ImageCache<S>, path: &str) -> Option<Rc<S::Image>> {
    match cache.get(path).await {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("skipping image: {e}");
            None
        }
    }
}

fn report(what: &str, result: Result<(), RenderError>) {
    if let Err(e) = result {
        log::warn!("failed to draw {what}: {e}");
    }
}

/// Paint a loaded frame.
///
/// Order: clear, base image, hotspots, layers by ascending z, the selected
/// layer's outline, annotations in stored order, then the preview shape.
pub fn paint<S: Surface>(surface: &S, frame: &LoadedFrame<S::Image>) {
    let plan = &frame.plan;
    let dpr = plan.dpr;

    report(
        "clear",
        scoped(surface, |s| {
            s.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
            s.clear_rect(0.0, 0.0, plan.width * dpr, plan.height * dpr);
            Ok(())
        }),
    );

    let (Some(base), Some(placement)) = (&frame.base, frame.placement) else {
        return;
    };

    let vp = plan.viewport;
    report(
        "viewport",
        surface.set_transform(dpr * vp.zoom, 0.0, 0.0, dpr * vp.zoom, dpr * vp.offset_x, dpr * vp.offset_y),
    );

    let center = placement.center();
    report(
        "base image",
        draw_image_centered(surface, base, center, placement.scale, Point::default(), 1.0),
    );

    for hotspot in &plan.hotspots {
        report(
            "hotspot",
            draw_hotspot_polygon(
                surface,
                &hotspot.vertices,
                &placement,
                &vp,
                dpr,
                hotspot.hovered,
                Some(&hotspot.label),
            ),
        );
    }

    let mut outline = None;
    for (layer, image) in plan.layers.iter().zip(&frame.layers) {
        let Some(image) = image else {
            continue;
        };
        report(
            "layer",
            draw_image_centered(surface, image, center, placement.scale, layer.offset, layer.alpha),
        );
        if layer.selected {
            outline = Some(centered_bounds(
                image.width(),
                image.height(),
                center,
                placement.scale,
                layer.offset.x,
                layer.offset.y,
            ));
        }
    }
    if let Some(bounds) = outline {
        report("layer outline", draw_layer_outline(surface, bounds));
    }

    for annotation in &plan.annotations {
        report(
            "annotation",
            draw_annotation(surface, annotation.anchor(), &annotation.data, &placement, MarkupStyle::COMMITTED),
        );
    }

    if let Some(preview) = &plan.preview {
        report(
            "preview",
            draw_annotation(surface, preview.anchor, &preview.data, &placement, MarkupStyle::PREVIEW),
        );
    }

    report("reset", surface.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0));
}

// =============================================================
// Render generations
// =============================================================

/// The newest requested render generation, shared with in-flight passes.
#[derive(Debug, Clone, Default)]
pub struct RenderGate {
    latest: Rc<Cell<u64>>,
}

impl RenderGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `generation` as the newest request.
    pub fn request(&self, generation: u64) {
        self.latest.set(generation);
    }

    #[must_use]
    pub fn latest(&self) -> u64 {
        self.latest.get()
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.get() == generation
    }
}

/// How a [`render_pass`] ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassOutcome {
    /// The frame reached the surface with this base placement.
    Painted(Option<ImagePlacement>),
    /// A newer render was requested while the bitmaps loaded.
    Stale,
}

/// Load `plan` and paint it, unless the gate has moved past its generation
/// by the time the bitmaps are ready.
pub async fn render_pass<S, T>(plan: FramePlan, cache: &ImageCache<S>, surface: &T, gate: &RenderGate) -> PassOutcome
where
    S: ImageSource,
    T: Surface<Image = S::Image>,
{
    let generation = plan.generation;
    let frame = plan.load(cache).await;
    if !gate.is_current(generation) {
        log::debug!("discarding stale render pass {generation} (latest {})", gate.latest());
        return PassOutcome::Stale;
    }
    paint(surface, &frame);
    PassOutcome::Painted(frame.placement)
}
