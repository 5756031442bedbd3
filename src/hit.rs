#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::annotation::{Annotation, AnnotationData};
use crate::camera::{ImagePlacement, Point, Viewport};
use crate::consts::MIN_POLYGON_VERTICES;
use crate::metadata::{Hotspot, Metadata};

/// Text width measurement used to size text annotation hit boxes.
///
/// `font_size` and the returned width are in viewport units.
pub trait MeasureText {
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

/// Fixed-advance approximation for when no drawing surface is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMeasure;

/// Average glyph advance of a sans-serif face, as a fraction of the font size.
const APPROX_ADVANCE: f64 = 0.6;

impl MeasureText for ApproxMeasure {
    #[allow(clippy::cast_precision_loss)]
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * font_size * APPROX_ADVANCE
    }
}

/// Ray-casting point-in-polygon test; `p` and `vertices` share one space.
///
/// Half-open boundary rule: an edge counts as crossed when it straddles the
/// horizontal through `p` (`(yi > py) != (yj > py)`) and `p` lies strictly to
/// the left of the crossing. For an axis-aligned box this puts the left and
/// top edges inside and the right and bottom edges outside.
///
/// Polygons with fewer than three vertices contain nothing.
#[must_use]
pub fn point_in_polygon(p: Point, vertices: &[[f64; 2]]) -> bool {
    if vertices.len() < MIN_POLYGON_VERTICES {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for (i, &[xi, yi]) in vertices.iter().enumerate() {
        let [xj, yj] = vertices[j];
        if (yi > p.y) != (yj > p.y) && p.x < (xj - xi) * (p.y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Shortest distance from `p` to the segment `a`–`b`.
#[must_use]
pub fn point_to_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

/// First site-map hotspot (document order) under the canvas point.
///
/// The pointer is unprojected canvas → viewport → image before testing.
#[must_use]
pub fn hotspot_at<'m>(
    metadata: &'m Metadata,
    site_map_id: &'m str,
    placement: &ImagePlacement,
    viewport: &Viewport,
    canvas_pt: Point,
) -> Option<Hotspot<'m>> {
    let img = placement.canvas_to_image(viewport, canvas_pt);
    metadata.hotspots(site_map_id).find(|h| point_in_polygon(img, h.vertices))
}

/// Tolerances for [`annotation_at`], all in image pixels.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationHitOptions {
    /// Image-to-viewport scale of the fitted base image; converts the
    /// viewport-unit text metrics into image pixels.
    pub image_scale: f64,
    pub arrow_tolerance: f64,
    pub text_padding: f64,
}

/// Topmost annotation (last drawn first) under the image-space point.
///
/// - text: padded box from the anchor, sized by the measured text width and
///   the font size;
/// - arrow: within the tolerance of the shaft;
/// - rectangle and circle: inside the (normalised) bounding box.
pub fn annotation_at<'a, I>(
    annotations: I,
    img: Point,
    options: &AnnotationHitOptions,
    measure: &dyn MeasureText,
) -> Option<&'a Annotation>
where
    I: DoubleEndedIterator<Item = &'a Annotation>,
{
    annotations.rev().find(|a| annotation_contains(a, img, options, measure))
}

fn annotation_contains(a: &Annotation, img: Point, options: &AnnotationHitOptions, measure: &dyn MeasureText) -> bool {
    match &a.data {
        AnnotationData::Text(d) => {
            let scale = if options.image_scale > 0.0 { options.image_scale } else { 1.0 };
            let width = measure.text_width(&d.text, d.font_size) / scale;
            let height = d.font_size / scale;
            let pad = options.text_padding;
            img.x >= a.x - pad && img.x <= a.x + width + pad && img.y >= a.y - pad && img.y <= a.y + height + pad
        }
        AnnotationData::Arrow(d) => {
            let tail = a.anchor();
            let head = Point::new(a.x + d.end_x, a.y + d.end_y);
            point_to_segment_distance(img, tail, head) < options.arrow_tolerance
        }
        AnnotationData::Rectangle(d) | AnnotationData::Circle(d) => {
            let (x0, x1) = ordered(a.x, a.x + d.width);
            let (y0, y1) = ordered(a.y, a.y + d.height);
            img.x >= x0 && img.x <= x1 && img.y >= y0 && img.y <= y1
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}
