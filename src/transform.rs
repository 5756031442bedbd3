//! Affine placement math and `relativeTo` chain resolution.
//!
//! Every sub-image and hotspot in the drawing tree is placed by an
//! [`ImageTransform`] in some parent's pixel space. A transform that names a
//! `relativeTo` image is composed onto that image's own absolute placement, so
//! the resolver walks the chain and multiplies matrices until it reaches an
//! absolute transform.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use std::collections::HashMap;

use crate::camera::Point;
use crate::metadata::{ImageTransform, Metadata};

/// A 2×3 affine matrix in canvas order:
///
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    #[must_use]
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    /// Matrix for a uniform scale, then rotation, then translation.
    #[must_use]
    pub fn from_transform(t: &ImageTransform) -> Self {
        let (sin, cos) = t.rotation.sin_cos();
        let s = t.scale;
        Self { a: s * cos, b: s * sin, c: -s * sin, d: s * cos, e: t.x, f: t.y }
    }

    /// `self * other`: apply `other` first, then `self`.
    #[must_use]
    pub fn multiply(&self, other: &Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Decompose back into an absolute (non-relative) transform.
    ///
    /// Exact for matrices built from uniform scale and rotation.
    #[must_use]
    pub fn to_transform(&self) -> ImageTransform {
        ImageTransform {
            relative_to: None,
            x: self.e,
            y: self.f,
            scale: self.a.hypot(self.b),
            rotation: self.b.atan2(self.a),
        }
    }

    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point { x: self.a * p.x + self.c * p.y + self.e, y: self.b * p.x + self.d * p.y + self.f }
    }
}

/// Which placement to resolve within a drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlacementKey<'a> {
    pub drawing: &'a str,
    pub discipline: Option<&'a str>,
    pub revision: Option<&'a str>,
    pub region: Option<&'a str>,
}

impl PlacementKey<'_> {
    fn cache_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.drawing,
            self.discipline.unwrap_or_default(),
            self.revision.unwrap_or_default(),
            self.region.unwrap_or_default()
        )
    }
}

/// Memoizing resolver of absolute placements.
///
/// The cache is keyed by [`PlacementKey`] and must be cleared when the
/// metadata it was filled from changes.
#[derive(Debug, Default)]
pub struct TransformResolver {
    cache: HashMap<String, ImageTransform>,
}

impl TransformResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute placement of the image selected by `key`.
    ///
    /// Layering, later steps override earlier ones:
    /// 1. the drawing's site-map position,
    /// 2. the discipline's image transform,
    /// 3. the selected revision's image transform (region revisions when a
    ///    region is given).
    ///
    /// Unknown drawings resolve to the identity. A `relativeTo` that names an
    /// unknown image is treated as absolute.
    pub fn absolute_transform(&mut self, metadata: &Metadata, key: PlacementKey<'_>) -> ImageTransform {
        let mut visiting = Vec::new();
        self.resolve(metadata, key, &mut visiting)
    }

    /// Number of memoized placements.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn resolve(&mut self, metadata: &Metadata, key: PlacementKey<'_>, visiting: &mut Vec<String>) -> ImageTransform {
        let cache_key = key.cache_key();
        if let Some(hit) = self.cache.get(&cache_key) {
            return hit.clone();
        }
        if visiting.contains(&cache_key) {
            log::warn!("relativeTo cycle through drawing {}; using identity", key.drawing);
            return ImageTransform::default();
        }
        let Some(drawing) = metadata.drawing(key.drawing) else {
            return ImageTransform::default();
        };
        visiting.push(cache_key.clone());

        let mut result = drawing
            .position
            .as_ref()
            .map(|p| p.image_transform.clone())
            .unwrap_or_default();

        let discipline = key.discipline.and_then(|name| drawing.discipline(name));
        if let Some(t) = discipline.and_then(|d| d.image_transform.as_ref()) {
            result = self.place(metadata, t, visiting);
        }

        if let (Some(disc), Some(version)) = (discipline, key.revision) {
            let revision = disc.revision(key.region, version);
            if let Some(t) = revision.and_then(|r| r.image_transform.as_ref()) {
                result = self.place(metadata, t, visiting);
            }
        }

        visiting.pop();
        self.cache.insert(cache_key, result.clone());
        result
    }

    /// Compose `t` onto the absolute placement of the image it is relative to.
    fn place(&mut self, metadata: &Metadata, t: &ImageTransform, visiting: &mut Vec<String>) -> ImageTransform {
        let Some(image) = t.relative_to.as_deref() else {
            return t.clone();
        };
        let Some(owner) = metadata.find_drawing_by_image(image) else {
            return ImageTransform { relative_to: None, ..t.clone() };
        };
        // The anchor is either the drawing's own image or one of its
        // discipline images.
        let discipline = if owner.image == image {
            None
        } else {
            owner
                .disciplines
                .as_ref()
                .and_then(|d| d.iter().find(|(_, disc)| disc.image.as_deref() == Some(image)))
                .map(|(name, _)| name)
        };
        let anchor_key = PlacementKey { drawing: &owner.id, discipline, revision: None, region: None };
        let anchor = self.resolve(metadata, anchor_key, visiting);
        Affine::from_transform(&anchor).multiply(&Affine::from_transform(t)).to_transform()
    }
}
