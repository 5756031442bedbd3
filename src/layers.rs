//! Discipline overlay layers composited over the base drawing.
//!
//! A layer is created the first time its discipline is toggled on and kept
//! (hidden) afterwards so its offset survives. Reordering only ever touches
//! the moved layer's `z_index`, so values can drift arbitrarily far from zero
//! over a long session; draw order only depends on their relative order.

#[cfg(test)]
#[path = "layers_test.rs"]
mod layers_test;

use serde::{Deserialize, Serialize};

/// One overlay layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    /// Discipline whose image this layer shows.
    pub discipline: String,
    pub visible: bool,
    /// Percent, `0..=100`.
    pub opacity: f64,
    /// Offset from the base image placement, in viewport units.
    pub offset_x: f64,
    pub offset_y: f64,
    /// Locked layers ignore every offset change.
    pub locked: bool,
    /// Draw order; higher draws later.
    pub z_index: i64,
}

impl Layer {
    /// Opacity as a `0.0..=1.0` alpha.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.opacity / 100.0
    }
}

/// The layer list plus the single layer selected for shift-drag editing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
    selected: Option<String>,
}

impl LayerStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every layer and the selection (drawing change).
    pub fn clear(&mut self) {
        self.layers.clear();
        self.selected = None;
    }

    /// Show a new layer on top of the others, or flip an existing layer's
    /// visibility. Hiding the selected layer clears the selection.
    pub fn toggle(&mut self, discipline: &str, default_opacity: f64) {
        if let Some(layer) = self.get_mut(discipline) {
            layer.visible = !layer.visible;
            let hidden = !layer.visible;
            if hidden && self.selected.as_deref() == Some(discipline) {
                self.selected = None;
            }
            return;
        }
        let z_index = self.max_z().max(0) + 1;
        self.layers.push(Layer {
            discipline: discipline.to_owned(),
            visible: true,
            opacity: default_opacity,
            offset_x: 0.0,
            offset_y: 0.0,
            locked: false,
            z_index,
        });
    }

    /// Set opacity (clamped to `0..=100`).
    pub fn set_opacity(&mut self, discipline: &str, opacity: f64) {
        if let Some(layer) = self.get_mut(discipline) {
            layer.opacity = opacity.clamp(0.0, 100.0);
        }
    }

    /// Move a layer to an absolute offset. Returns `false` when the layer is
    /// missing or locked.
    pub fn set_offset(&mut self, discipline: &str, offset_x: f64, offset_y: f64) -> bool {
        match self.get_mut(discipline) {
            Some(layer) if !layer.locked => {
                layer.offset_x = offset_x;
                layer.offset_y = offset_y;
                true
            }
            _ => false,
        }
    }

    /// Shift a layer's offset by a viewport-unit delta, unless locked.
    pub fn translate(&mut self, discipline: &str, dx: f64, dy: f64) -> bool {
        match self.get(discipline) {
            Some(layer) => {
                let (x, y) = (layer.offset_x + dx, layer.offset_y + dy);
                self.set_offset(discipline, x, y)
            }
            None => false,
        }
    }

    /// Return one layer to the base placement.
    pub fn reset_offset(&mut self, discipline: &str) {
        if let Some(layer) = self.get_mut(discipline) {
            layer.offset_x = 0.0;
            layer.offset_y = 0.0;
        }
    }

    pub fn reset_all_offsets(&mut self) {
        for layer in &mut self.layers {
            layer.offset_x = 0.0;
            layer.offset_y = 0.0;
        }
    }

    pub fn toggle_lock(&mut self, discipline: &str) {
        if let Some(layer) = self.get_mut(discipline) {
            layer.locked = !layer.locked;
        }
    }

    /// Put a layer above every other layer.
    pub fn bring_to_front(&mut self, discipline: &str) {
        let z = self.max_z() + 1;
        if let Some(layer) = self.get_mut(discipline) {
            layer.z_index = z;
        }
    }

    /// Put a layer below every other layer.
    pub fn send_to_back(&mut self, discipline: &str) {
        let z = self.min_z() - 1;
        if let Some(layer) = self.get_mut(discipline) {
            layer.z_index = z;
        }
    }

    // --- Selection ---

    /// Select a visible layer for editing, or clear with `None`. Returns
    /// `false` when the discipline has no visible layer.
    pub fn select(&mut self, discipline: Option<&str>) -> bool {
        match discipline {
            None => {
                self.selected = None;
                true
            }
            Some(name) if self.get(name).is_some_and(|l| l.visible) => {
                self.selected = Some(name.to_owned());
                true
            }
            Some(_) => false,
        }
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Layer> {
        self.get(self.selected.as_deref()?)
    }

    /// The selected layer if it may be dragged right now.
    #[must_use]
    pub fn draggable_selected(&self) -> Option<&Layer> {
        self.selected().filter(|l| l.visible && !l.locked)
    }

    // --- Queries ---

    #[must_use]
    pub fn get(&self, discipline: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.discipline == discipline)
    }

    fn get_mut(&mut self, discipline: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.discipline == discipline)
    }

    /// Layers in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Visible layers in draw order (ascending `z_index`).
    #[must_use]
    pub fn visible_sorted(&self) -> Vec<&Layer> {
        let mut out: Vec<&Layer> = self.layers.iter().filter(|l| l.visible).collect();
        out.sort_by_key(|l| l.z_index);
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn max_z(&self) -> i64 {
        self.layers.iter().map(|l| l.z_index).max().unwrap_or(0)
    }

    fn min_z(&self) -> i64 {
        self.layers.iter().map(|l| l.z_index).min().unwrap_or(0)
    }
}
