//! Drawing-tree metadata: the read-only project description the engine renders.
//!
//! The host loads a project JSON document and hands it to the engine. The
//! engine only reads it: which image to show for the current selection, which
//! disciplines can become overlay layers, and (on the site map) which child
//! drawings expose clickable hotspot polygons.
//!
//! JSON object key order is meaningful here. The first discipline is the one
//! auto-selected on navigation, and hotspots are picked first-match in
//! iteration order, so keyed collections deserialize into [`OrderedMap`]
//! rather than a hash map.

#[cfg(test)]
#[path = "metadata_test.rs"]
mod metadata_test;

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::consts::MIN_POLYGON_VERTICES;

/// A string-keyed map that keeps the insertion (JSON document) order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. A replaced entry keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// First entry in document order.
    #[must_use]
    pub fn first(&self) -> Option<(&str, &V)> {
        self.0.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = OrderedMap(Vec::with_capacity(access.size_hint().unwrap_or(0)));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

// =============================================================
// Placement records
// =============================================================

/// Where an image sits inside its parent's pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTransform {
    /// File name of the image this transform is expressed against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<String>,
    pub x: f64,
    pub y: f64,
    /// Uniform scale, 1.0 = 100%.
    pub scale: f64,
    /// Rotation in radians.
    pub rotation: f64,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self { relative_to: None, x: 0.0, y: 0.0, scale: 1.0, rotation: 0.0 }
    }
}

/// A region outline in its parent's pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub vertices: Vec<[f64; 2]>,
    #[serde(default)]
    pub polygon_transform: ImageTransform,
}

/// Where a child drawing sits on the site map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Hotspot outline in site-map image pixels.
    #[serde(default)]
    pub vertices: Vec<[f64; 2]>,
    #[serde(default)]
    pub image_transform: ImageTransform,
}

// =============================================================
// Drawing tree
// =============================================================

/// One dated version of a discipline's (or region's) drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub version: String,
    pub image: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_transform: Option<ImageTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
}

/// A sub-area of a discipline with its own revision history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

/// A work category's drawing set within one drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discipline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_transform: Option<ImageTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
    /// Present when the discipline is split into regions; revisions then
    /// live on each region instead of on the discipline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<OrderedMap<Region>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Vec<Revision>>,
}

impl Discipline {
    /// Image shown when this discipline is composited as an overlay layer:
    /// the first revision's image, else the discipline image.
    #[must_use]
    pub fn layer_image(&self) -> Option<&str> {
        self.revisions
            .as_deref()
            .and_then(<[Revision]>::first)
            .map(|r| r.image.as_str())
            .or(self.image.as_deref())
    }

    /// Revisions available under `region` (when the discipline has regions)
    /// or directly on the discipline.
    #[must_use]
    pub fn revisions_in(&self, region: Option<&str>) -> &[Revision] {
        if let (Some(name), Some(regions)) = (region, self.regions.as_ref()) {
            return regions.get(name).map(|r| r.revisions.as_slice()).unwrap_or_default();
        }
        self.revisions.as_deref().unwrap_or(&[])
    }

    /// Look up a revision by version label.
    #[must_use]
    pub fn revision(&self, region: Option<&str>, version: &str) -> Option<&Revision> {
        self.revisions_in(region).iter().find(|r| r.version == version)
    }

    /// The region and revision auto-selected when this discipline becomes
    /// current: first region's first revision, else first revision.
    #[must_use]
    pub fn default_selection(&self) -> (Option<&str>, Option<&str>) {
        if let Some(regions) = &self.regions {
            return match regions.first() {
                Some((name, region)) => (Some(name), region.revisions.first().map(|r| r.version.as_str())),
                None => (None, None),
            };
        }
        let revision = self.revisions.as_deref().and_then(<[Revision]>::first);
        (None, revision.map(|r| r.version.as_str()))
    }
}

/// A single drawing (site map, building plan, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawing {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disciplines: Option<OrderedMap<Discipline>>,
}

impl Drawing {
    #[must_use]
    pub fn discipline(&self, name: &str) -> Option<&Discipline> {
        self.disciplines.as_ref().and_then(|d| d.get(name))
    }

    /// Discipline names in document order.
    #[must_use]
    pub fn discipline_names(&self) -> Vec<String> {
        self.disciplines
            .as_ref()
            .map(|d| d.keys().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Every image this drawing references directly or through a discipline.
    fn uses_image(&self, image: &str) -> bool {
        self.image == image
            || self
                .disciplines
                .as_ref()
                .is_some_and(|d| d.values().any(|disc| disc.image.as_deref() == Some(image)))
    }
}

/// Project-level header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
}

/// One entry of the project's discipline catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisciplineInfo {
    pub name: String,
}

/// The whole project description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub project: Project,
    #[serde(default)]
    pub disciplines: Vec<DisciplineInfo>,
    #[serde(default)]
    pub drawings: OrderedMap<Drawing>,
}

/// A clickable site-map polygon that leads to a child drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hotspot<'a> {
    /// Id of the child drawing selected on click.
    pub drawing_id: &'a str,
    /// Label drawn at the polygon centroid.
    pub name: &'a str,
    /// Outline in site-map image pixels.
    pub vertices: &'a [[f64; 2]],
}

impl Metadata {
    /// Parse a project document.
    ///
    /// # Errors
    ///
    /// Returns the underlying JSON error when the document does not match the
    /// drawing-tree shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn drawing(&self, id: &str) -> Option<&Drawing> {
        self.drawings.get(id)
    }

    /// Hotspots of the children of `site_map_id`, in document order.
    ///
    /// Children without a position, or whose outline has fewer than three
    /// vertices, are skipped.
    pub fn hotspots<'a>(&'a self, site_map_id: &'a str) -> impl Iterator<Item = Hotspot<'a>> + 'a {
        self.drawings.values().filter_map(move |d| {
            if d.parent.as_deref() != Some(site_map_id) {
                return None;
            }
            let position = d.position.as_ref()?;
            if position.vertices.len() < MIN_POLYGON_VERTICES {
                return None;
            }
            Some(Hotspot { drawing_id: &d.id, name: &d.name, vertices: &position.vertices })
        })
    }

    /// First drawing whose own image, or one of whose discipline images, is `image`.
    #[must_use]
    pub fn find_drawing_by_image(&self, image: &str) -> Option<&Drawing> {
        self.drawings.values().find(|d| d.uses_image(image))
    }
}
