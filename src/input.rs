//! Input model: modifier keys, mouse buttons, touches, and the gesture state machine.
//!
//! `Modifiers` and `Button` capture the user's intent at the time of a pointer
//! event. `InputState` is the active gesture tracked between pointer-down and
//! pointer-up; it carries the context needed to turn each move into an
//! incremental viewport, layer or preview update. `TouchTracker` decides
//! whether a single-finger touch ends as a tap or a pan.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::annotation::AnnotationTool;
use crate::camera::Point;

/// Keyboard modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held; with a selected layer this drags the layer.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button.
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button.
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` code.
    #[must_use]
    pub fn from_dom(code: i16) -> Self {
        match code {
            1 => Self::Middle,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// One active touch, already converted to canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Browser touch identifier.
    pub id: i32,
    pub pos: Point,
}

impl TouchPoint {
    #[must_use]
    pub fn new(id: i32, x: f64, y: f64) -> Self {
        Self { id, pos: Point::new(x, y) }
    }
}

/// Distance and midpoint of the first two touches, if there are two.
#[must_use]
pub fn pinch_geometry(touches: &[TouchPoint]) -> Option<(f64, Point)> {
    match touches {
        [a, b, ..] => Some((a.pos.distance(b.pos), a.pos.midpoint(b.pos))),
        _ => None,
    }
}

/// Internal state for the gesture state machine.
///
/// The states are mutually exclusive: a pointer stream is in exactly one of
/// them between press and release.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next press.
    #[default]
    Idle,
    /// The user is panning the viewport.
    PanningCanvas {
        /// Canvas position the next delta is measured from.
        last_canvas: Point,
        /// Canvas position of the press, used to tell a click from a drag.
        origin: Point,
    },
    /// The user is shift-dragging the selected layer.
    DraggingLayer {
        /// Discipline of the layer being moved.
        discipline: String,
        /// Canvas position of the previous event.
        last_canvas: Point,
    },
    /// The user is dragging out an arrow, rectangle or circle.
    DrawingShape {
        tool: AnnotationTool,
        /// Image-space press point; the committed annotation's anchor.
        start_img: Point,
        /// Image-space position of the latest move, drawn as the preview.
        current_img: Point,
    },
    /// Two fingers are on the surface.
    Pinching {
        /// Finger distance at the previous event, in canvas pixels.
        last_distance: f64,
    },
}

/// Tap candidacy for a single-finger touch.
///
/// A touch stays a tap candidate until it travels more than the slop from its
/// start, or a second finger lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchTracker {
    pub start: Point,
    pub start_ms: f64,
    /// Set once the touch has left the slop radius; never cleared.
    pub moved: bool,
}

impl TouchTracker {
    #[must_use]
    pub fn begin(start: Point, start_ms: f64) -> Self {
        Self { start, start_ms, moved: false }
    }

    /// Record a move to `pos`. Returns `true` once the touch counts as a drag.
    pub fn track(&mut self, pos: Point, slop: f64) -> bool {
        if !self.moved && pos.distance(self.start) > slop {
            self.moved = true;
        }
        self.moved
    }

    /// Drop tap candidacy (second finger, shape drawing).
    pub fn cancel(&mut self) {
        self.moved = true;
    }

    /// Whether a release at `end_ms` should be dispatched as a tap.
    #[must_use]
    pub fn is_tap(&self, end_ms: f64, max_ms: f64) -> bool {
        !self.moved && end_ms - self.start_ms < max_ms
    }
}
