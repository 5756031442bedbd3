//! Which drawing, discipline, region and revision the viewer is showing.
//!
//! Selection is validated against the [`Metadata`] it is given: unknown ids
//! leave the current selection untouched. Changing drawing or discipline
//! auto-selects the first region and revision beneath it in document order.

#[cfg(test)]
#[path = "nav_test.rs"]
mod nav_test;

use crate::metadata::{Discipline, Drawing, Metadata, Revision};

/// The current position in the drawing tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    pub drawing: Option<String>,
    pub discipline: Option<String>,
    pub region: Option<String>,
    pub revision: Option<String>,
}

impl Navigation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to drawing `id` and auto-select beneath it.
    ///
    /// Returns `false` (and changes nothing) when the drawing is unknown.
    pub fn select_drawing(&mut self, metadata: &Metadata, id: &str) -> bool {
        let Some(drawing) = metadata.drawing(id) else {
            return false;
        };
        self.drawing = Some(drawing.id.clone());
        self.discipline = None;
        self.region = None;
        self.revision = None;
        if let Some((name, discipline)) = drawing.disciplines.as_ref().and_then(|d| d.first()) {
            self.discipline = Some(name.to_owned());
            self.apply_default_selection(discipline);
        }
        log::info!("selected drawing {id}");
        true
    }

    /// Switch discipline within the current drawing.
    pub fn select_discipline(&mut self, metadata: &Metadata, name: &str) -> bool {
        let Some(discipline) = self.current_drawing(metadata).and_then(|d| d.discipline(name)) else {
            return false;
        };
        self.discipline = Some(name.to_owned());
        self.apply_default_selection(discipline);
        true
    }

    /// Switch region within the current discipline and select its first revision.
    pub fn select_region(&mut self, metadata: &Metadata, name: &str) -> bool {
        let region = self
            .current_discipline(metadata)
            .and_then(|d| d.regions.as_ref())
            .and_then(|r| r.get(name));
        let Some(region) = region else {
            return false;
        };
        self.region = Some(name.to_owned());
        self.revision = region.revisions.first().map(|r| r.version.clone());
        true
    }

    /// Select a revision available under the current discipline/region.
    pub fn select_revision(&mut self, metadata: &Metadata, version: &str) -> bool {
        if !self.available_revisions(metadata).iter().any(|r| r.version == version) {
            return false;
        }
        self.revision = Some(version.to_owned());
        true
    }

    fn apply_default_selection(&mut self, discipline: &Discipline) {
        let (region, revision) = discipline.default_selection();
        self.region = region.map(str::to_owned);
        self.revision = revision.map(str::to_owned);
    }

    // --- Queries ---

    #[must_use]
    pub fn current_drawing<'m>(&self, metadata: &'m Metadata) -> Option<&'m Drawing> {
        metadata.drawing(self.drawing.as_deref()?)
    }

    #[must_use]
    pub fn current_discipline<'m>(&self, metadata: &'m Metadata) -> Option<&'m Discipline> {
        self.current_drawing(metadata)?.discipline(self.discipline.as_deref()?)
    }

    #[must_use]
    pub fn current_revision<'m>(&self, metadata: &'m Metadata) -> Option<&'m Revision> {
        let version = self.revision.as_deref()?;
        self.current_discipline(metadata)?.revision(self.region.as_deref(), version)
    }

    /// Discipline names of the current drawing, in document order.
    #[must_use]
    pub fn available_disciplines(&self, metadata: &Metadata) -> Vec<String> {
        self.current_drawing(metadata).map(Drawing::discipline_names).unwrap_or_default()
    }

    /// Revisions under the current discipline (and region, if any).
    #[must_use]
    pub fn available_revisions<'m>(&self, metadata: &'m Metadata) -> &'m [Revision] {
        self.current_discipline(metadata)
            .map(|d| d.revisions_in(self.region.as_deref()))
            .unwrap_or_default()
    }

    /// Whether the current drawing is the site map.
    #[must_use]
    pub fn is_site_map(&self, site_map_id: &str) -> bool {
        self.drawing.as_deref() == Some(site_map_id)
    }

    /// Logical path of the base image for the current selection.
    ///
    /// The site map always shows its own image. Other drawings prefer the
    /// current revision's image, then the discipline image, then their own.
    #[must_use]
    pub fn base_image<'m>(&self, metadata: &'m Metadata, site_map_id: &str) -> Option<&'m str> {
        let drawing = self.current_drawing(metadata)?;
        if drawing.id == site_map_id {
            return Some(drawing.image.as_str());
        }
        let from_revision = self.current_revision(metadata).map(|r| r.image.as_str());
        let from_discipline = self.current_discipline(metadata).and_then(|d| d.image.as_deref());
        Some(from_revision.or(from_discipline).unwrap_or(drawing.image.as_str()))
    }
}
