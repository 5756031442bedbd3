//! Viewport, rendering and interaction engine for construction drawing sets.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns the
//! interactive core of the drawing viewer: translating raw DOM pointer and touch
//! events into viewport, layer and annotation mutations, keeping the three
//! coordinate spaces (canvas, viewport, image) consistent, hit-testing site-map
//! hotspots and annotations, and compositing the base drawing, discipline
//! overlays and markup onto a 2D canvas. The host page is responsible for
//! loading project metadata, the navigation panels, and the text-entry and
//! delete-confirmation modals the engine asks for through [`engine::Action`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`camera`] | Viewport pan/zoom and canvas/viewport/image conversions |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`hit`] | Hotspot and annotation hit-testing |
//! | [`layers`] | Discipline overlay layers and their z-order |
//! | [`annotation`] | Markup records, tool settings and the annotation store |
//! | [`metadata`] | Drawing tree consumed from the project metadata |
//! | [`nav`] | Current drawing / discipline / region / revision selection |
//! | [`transform`] | Affine transforms and `relativeTo` resolution |
//! | [`render`] | Frame planning and drawing against a [`render::Surface`] |
//! | [`image_cache`] | Memoizing bitmap loader |
//! | [`dom`] | Browser event listener wiring |
//! | [`config`] | Runtime-tunable thresholds |
//! | [`consts`] | Shared numeric constants (zoom limits, thresholds, layout) |
//! | [`error`] | Error types |

pub mod annotation;
pub mod camera;
pub mod config;
pub mod consts;
pub mod dom;
pub mod engine;
pub mod error;
pub mod hit;
pub mod image_cache;
pub mod input;
pub mod layers;
pub mod metadata;
pub mod nav;
pub mod render;
pub mod transform;

/// Route `log` records to the browser console.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logging(level: log::Level) {
    if let Err(e) = console_log::init_with_level(level) {
        log::debug!("console logger already installed: {e}");
    }
}
