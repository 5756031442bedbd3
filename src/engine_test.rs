#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::annotation::ShapeData;

// =============================================================
// Helpers
// =============================================================

const PROJECT: &str = r#"{
    "project": { "name": "Tower" },
    "drawings": {
        "00": { "id": "00", "name": "Site", "image": "site.png" },
        "01": {
            "id": "01", "name": "Main", "image": "main.png", "parent": "00",
            "position": { "vertices": [[0, 0], [100, 0], [100, 50], [0, 50]] },
            "disciplines": {
                "A": {
                    "image": "a.png",
                    "revisions": [
                        { "version": "A1", "image": "a1.png" },
                        { "version": "A2", "image": "a2.png" }
                    ]
                },
                "B": {
                    "image": "b.png",
                    "revisions": [{ "version": "B1", "image": "b1.png" }]
                }
            }
        }
    }
}"#;

fn project() -> Metadata {
    match Metadata::from_json(PROJECT) {
        Ok(m) => m,
        Err(e) => panic!("fixture should parse: {e}"),
    }
}

/// 500×250 canvas with a 200×100 base image: fit scale 2, image at (50, 25).
fn placement() -> ImagePlacement {
    ImagePlacement::fit(200.0, 100.0, 500.0, 250.0, 0.8)
}

/// Engine on the site map with a painted frame.
fn site_core() -> EngineCore {
    let mut core = EngineCore::new();
    core.set_viewport(500.0, 250.0, 1.0);
    core.load_metadata(project());
    core.render_state = Some(placement());
    core
}

/// Engine on drawing "01" with a painted frame.
fn drawing_core() -> EngineCore {
    let mut core = site_core();
    core.select_drawing("01");
    core
}

/// Canvas point over image pixel `(x, y)` at zoom 1, no pan.
fn canvas_of(x: f64, y: f64) -> Point {
    placement().image_to_canvas(&Viewport::default(), Point::new(x, y))
}

fn shift() -> Modifiers {
    Modifiers { shift: true, ..Modifiers::default() }
}

fn touch(x: f64, y: f64) -> TouchPoint {
    TouchPoint::new(0, x, y)
}

fn click(core: &mut EngineCore, p: Point) -> Vec<Action> {
    core.on_pointer_down(p, Button::Primary, Modifiers::default());
    core.on_pointer_up(p, Button::Primary, Modifiers::default(), 0.0);
    core.on_click(p)
}

fn drag(core: &mut EngineCore, from: Point, to: Point, modifiers: Modifiers) -> Vec<Action> {
    core.on_pointer_down(from, Button::Primary, modifiers);
    core.on_pointer_move(to, modifiers);
    core.on_pointer_up(to, Button::Primary, modifiers, 1_000.0)
}

fn selections(actions: &[Action]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::DrawingSelected(id) => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

fn created(actions: &[Action]) -> Option<&Annotation> {
    actions.iter().find_map(|a| match a {
        Action::AnnotationCreated(annotation) => Some(annotation),
        _ => None,
    })
}

fn offset(core: &EngineCore) -> (f64, f64) {
    (core.viewport.offset_x, core.viewport.offset_y)
}

// =============================================================
// Navigation
// =============================================================

#[test]
fn load_metadata_opens_site_map() {
    let mut core = EngineCore::new();
    let actions = core.load_metadata(project());
    assert!(core.is_site_map());
    assert_eq!(selections(&actions), ["00"]);
}

#[test]
fn load_metadata_json_rejects_garbage() {
    let mut core = EngineCore::new();
    assert!(core.load_metadata_json("not json").is_err());
    assert!(core.metadata.is_none());
}

#[test]
fn select_drawing_auto_selects_and_resets() {
    let mut core = site_core();
    core.viewport.zoom = 3.0;
    let actions = core.select_drawing("01");
    assert_eq!(selections(&actions), ["01"]);
    assert_eq!(core.nav.discipline.as_deref(), Some("A"));
    assert_eq!(core.nav.revision.as_deref(), Some("A1"));
    assert_eq!(core.viewport, Viewport::default());
    assert_eq!(core.available_disciplines(), ["A", "B"]);
    assert_eq!(core.available_revisions(), ["A1", "A2"]);
}

#[test]
fn select_drawing_clears_layers() {
    let mut core = drawing_core();
    core.toggle_layer("B");
    core.select_drawing("00");
    assert!(core.layers.is_empty());
}

#[test]
fn unknown_drawing_is_ignored() {
    let mut core = site_core();
    assert!(core.select_drawing("99").is_empty());
    assert!(core.is_site_map());
}

#[test]
fn unknown_revision_is_ignored() {
    let mut core = drawing_core();
    assert!(core.select_revision("Z9").is_empty());
    assert_eq!(core.select_revision("A2"), [Action::RenderNeeded]);
    assert_eq!(core.nav.revision.as_deref(), Some("A2"));
}

#[test]
fn current_transform_resolves_selection() {
    let mut core = drawing_core();
    assert!(core.current_transform().is_some());
    assert_eq!(EngineCore::new().current_transform(), None);
}

// =============================================================
// Viewport
// =============================================================

#[test]
fn zoom_buttons_step_about_center() {
    let mut core = site_core();
    core.zoom_in();
    assert_eq!(core.zoom_percent(), 120);
    // Centre (250, 125) stays put: offset = c - c * 1.2.
    assert!((core.viewport.offset_x - (250.0 - 300.0)).abs() < 1e-9);
    core.zoom_out();
    assert!((core.viewport.zoom - 1.0).abs() < 1e-9);
    core.reset_viewport();
    assert_eq!(core.viewport, Viewport::default());
}

#[test]
fn wheel_zoom_stays_in_bounds() {
    let mut core = site_core();
    let anchor = Point::new(100.0, 100.0);
    for _ in 0..100 {
        core.on_wheel(anchor, WheelDelta { dx: 0.0, dy: -1.0 }, Modifiers::default());
        assert!(core.viewport.zoom <= 10.0);
    }
    assert_eq!(core.viewport.zoom, 10.0);
    for _ in 0..200 {
        core.on_wheel(anchor, WheelDelta { dx: 0.0, dy: 1.0 }, Modifiers::default());
        assert!(core.viewport.zoom >= 0.1);
    }
    assert_eq!(core.viewport.zoom, 0.1);
}

#[test]
fn wheel_zoom_keeps_point_under_cursor() {
    let mut core = site_core();
    core.viewport.pan_by(13.0, -7.0);
    let anchor = Point::new(321.0, 87.0);
    let before = core.viewport.canvas_to_viewport(anchor);
    core.on_wheel(anchor, WheelDelta { dx: 0.0, dy: -3.0 }, Modifiers::default());
    let after = core.viewport.viewport_to_canvas(before);
    assert!(after.distance(anchor) < 1e-9);
}

#[test]
fn horizontal_wheel_does_not_zoom() {
    let mut core = site_core();
    assert!(core.on_wheel(Point::default(), WheelDelta { dx: 5.0, dy: 0.0 }, Modifiers::default()).is_empty());
    assert_eq!(core.viewport.zoom, 1.0);
}

// =============================================================
// Mouse gestures
// =============================================================

#[test]
fn mouse_drag_pans_one_to_one() {
    let mut core = site_core();
    core.viewport.zoom = 2.0;
    drag(&mut core, Point::new(10.0, 10.0), Point::new(40.0, 30.0), Modifiers::default());
    assert_eq!(offset(&core), (30.0, 20.0));
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn click_after_pan_is_swallowed() {
    let mut core = site_core();
    drag(&mut core, canvas_of(10.0, 10.0), Point::new(200.0, 200.0), Modifiers::default());
    assert!(core.on_click(canvas_of(10.0, 10.0)).is_empty());
    assert!(core.is_site_map());
}

#[test]
fn secondary_button_is_ignored() {
    let mut core = site_core();
    assert!(core.on_pointer_down(Point::default(), Button::Secondary, Modifiers::default()).is_empty());
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn click_on_hotspot_selects_child_drawing() {
    let mut core = site_core();
    let actions = click(&mut core, canvas_of(10.0, 10.0));
    assert_eq!(selections(&actions), ["01"]);
    assert_eq!(core.nav.drawing.as_deref(), Some("01"));
}

#[test]
fn click_outside_hotspots_does_nothing() {
    let mut core = site_core();
    assert!(click(&mut core, canvas_of(150.0, 80.0)).is_empty());
    assert!(core.is_site_map());
}

#[test]
fn click_before_first_paint_does_nothing() {
    let mut core = site_core();
    core.render_state = None;
    assert!(click(&mut core, canvas_of(10.0, 10.0)).is_empty());
}

#[test]
fn hover_over_hotspot_sets_pointer_cursor() {
    let mut core = site_core();
    let actions = core.on_pointer_move(canvas_of(10.0, 10.0), Modifiers::default());
    assert_eq!(core.hovered_hotspot.as_deref(), Some("01"));
    assert!(actions.contains(&Action::SetCursor("pointer".to_owned())));
    assert!(core.on_pointer_move(canvas_of(11.0, 10.0), Modifiers::default()).is_empty());
    let actions = core.on_pointer_move(canvas_of(150.0, 80.0), Modifiers::default());
    assert!(core.hovered_hotspot.is_none());
    assert!(actions.contains(&Action::SetCursor("grab".to_owned())));
}

// =============================================================
// Layers
// =============================================================

#[test]
fn shift_drag_moves_selected_layer_by_canvas_delta_over_zoom() {
    let mut core = drawing_core();
    core.viewport.zoom = 2.0;
    core.toggle_layer("B");
    assert_eq!(core.layers.get("B").map(|l| l.opacity), Some(70.0));
    core.select_layer(Some("B"));

    let down = core.on_pointer_down(Point::new(100.0, 100.0), Button::Primary, shift());
    assert_eq!(down, [Action::SetCursor("move".to_owned())]);
    core.on_pointer_move(Point::new(120.0, 90.0), shift());
    core.on_pointer_up(Point::new(120.0, 90.0), Button::Primary, shift(), 0.0);

    let layer = core.layers.get("B").map(|l| (l.offset_x, l.offset_y));
    assert_eq!(layer, Some((10.0, -5.0)));
    assert_eq!(offset(&core), (0.0, 0.0));
    assert!(core.on_click(Point::new(120.0, 90.0)).is_empty());
}

#[test]
fn shift_drag_without_selection_pans() {
    let mut core = drawing_core();
    core.toggle_layer("B");
    drag(&mut core, Point::new(0.0, 0.0), Point::new(20.0, -10.0), shift());
    assert_eq!(offset(&core), (20.0, -10.0));
    assert_eq!(core.layers.get("B").map(|l| l.offset_x), Some(0.0));
}

#[test]
fn shift_drag_on_locked_layer_pans() {
    let mut core = drawing_core();
    core.toggle_layer("B");
    core.select_layer(Some("B"));
    core.toggle_layer_lock("B");
    drag(&mut core, Point::new(0.0, 0.0), Point::new(20.0, -10.0), shift());
    assert_eq!(offset(&core), (20.0, -10.0));
    assert_eq!(core.layers.get("B").map(|l| l.offset_x), Some(0.0));
}

#[test]
fn toggle_unknown_discipline_is_ignored() {
    let mut core = drawing_core();
    assert!(core.toggle_layer("Z").is_empty());
    assert!(core.layers.is_empty());
}

#[test]
fn reset_layer_offset_single_and_all() {
    let mut core = drawing_core();
    core.toggle_layer("A");
    core.toggle_layer("B");
    core.set_layer_offset("A", 5.0, 5.0);
    core.set_layer_offset("B", 7.0, 7.0);
    core.reset_layer_offset(Some("A"));
    assert_eq!(core.layers.get("A").map(|l| l.offset_x), Some(0.0));
    assert_eq!(core.layers.get("B").map(|l| l.offset_x), Some(7.0));
    core.reset_layer_offset(None);
    assert_eq!(core.layers.get("B").map(|l| l.offset_x), Some(0.0));
}

// =============================================================
// Touch gestures
// =============================================================

#[test]
fn short_still_touch_is_one_tap_and_no_pan() {
    let mut core = site_core();
    let start = canvas_of(10.0, 10.0);
    let nudged = Point::new(start.x + 4.0, start.y + 3.0);

    assert!(core.on_touch_start(&[touch(start.x, start.y)], 0.0).is_empty());
    assert!(core.on_touch_move(&[touch(nudged.x, nudged.y)], 50.0).is_empty());
    let actions = core.on_touch_end(&[], &[touch(nudged.x, nudged.y)], 120.0);

    assert_eq!(selections(&actions), ["01"]);
    assert_eq!(offset(&core), (0.0, 0.0));
}

#[test]
fn touch_beyond_slop_pans_and_never_taps() {
    let mut core = site_core();
    let start = canvas_of(10.0, 10.0);

    core.on_touch_start(&[touch(start.x, start.y)], 0.0);
    assert!(core.on_touch_move(&[touch(start.x + 5.0, start.y)], 20.0).is_empty());
    let actions = core.on_touch_move(&[touch(start.x + 20.0, start.y)], 40.0);
    assert!(actions.contains(&Action::RenderNeeded));
    // The movement held back inside the slop is applied once it is exceeded.
    assert_eq!(offset(&core), (20.0, 0.0));

    let actions = core.on_touch_end(&[], &[touch(start.x + 20.0, start.y)], 100.0);
    assert!(selections(&actions).is_empty());
    assert!(core.is_site_map());
}

#[test]
fn slow_touch_is_not_a_tap() {
    let mut core = site_core();
    let start = canvas_of(10.0, 10.0);
    core.on_touch_start(&[touch(start.x, start.y)], 0.0);
    let actions = core.on_touch_end(&[], &[touch(start.x, start.y)], 300.0);
    assert!(selections(&actions).is_empty());
}

#[test]
fn pinch_zooms_about_midpoint() {
    let mut core = site_core();
    core.on_touch_start(&[TouchPoint::new(0, 100.0, 100.0), TouchPoint::new(1, 200.0, 100.0)], 0.0);
    assert_eq!(core.input, InputState::Pinching { last_distance: 100.0 });
    core.on_touch_move(&[TouchPoint::new(0, 50.0, 100.0), TouchPoint::new(1, 250.0, 100.0)], 16.0);
    assert!((core.viewport.zoom - 2.0).abs() < 1e-9);
    assert!((core.viewport.offset_x + 150.0).abs() < 1e-9);
    assert!((core.viewport.offset_y + 100.0).abs() < 1e-9);
}

#[test]
fn pinch_is_clamped() {
    let mut core = site_core();
    core.on_touch_start(&[TouchPoint::new(0, 0.0, 0.0), TouchPoint::new(1, 1.0, 0.0)], 0.0);
    core.on_touch_move(&[TouchPoint::new(0, 0.0, 0.0), TouchPoint::new(1, 1_000.0, 0.0)], 16.0);
    assert_eq!(core.viewport.zoom, 10.0);
}

#[test]
fn second_finger_cancels_tap() {
    let mut core = site_core();
    let start = canvas_of(10.0, 10.0);
    core.on_touch_start(&[touch(start.x, start.y)], 0.0);
    core.on_touch_start(&[touch(start.x, start.y), TouchPoint::new(1, start.x + 50.0, start.y)], 10.0);
    core.on_touch_end(&[touch(start.x, start.y)], &[TouchPoint::new(1, start.x + 50.0, start.y)], 40.0);
    let actions = core.on_touch_end(&[], &[touch(start.x, start.y)], 60.0);
    assert!(selections(&actions).is_empty());
    assert_eq!(core.input, InputState::Idle);
}

// =============================================================
// Annotations
// =============================================================

#[test]
fn undersized_shape_is_discarded() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Rectangle));
    // Canvas deltas are halved into image pixels at fit scale 2.
    let actions = drag(&mut core, Point::new(100.0, 100.0), Point::new(106.0, 106.0), Modifiers::default());
    assert!(created(&actions).is_none());
    assert!(core.annotations.is_empty());
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn shape_long_on_one_axis_is_committed_relative_to_press() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Rectangle));
    let actions = drag(&mut core, Point::new(100.0, 100.0), Point::new(106.0, 112.0), Modifiers::default());
    let Some(annotation) = created(&actions) else {
        panic!("drag should commit a rectangle");
    };
    assert_eq!(annotation.anchor(), Point::new(25.0, 37.5));
    assert_eq!(annotation.drawing_id, "01");
    assert_eq!(annotation.discipline.as_deref(), Some("A"));
    assert_eq!(annotation.revision.as_deref(), Some("A1"));
    match &annotation.data {
        AnnotationData::Rectangle(ShapeData { width, height, .. }) => assert_eq!((*width, *height), (3.0, 6.0)),
        other => panic!("expected rectangle, got {other:?}"),
    }
    assert_eq!(offset(&core), (0.0, 0.0));
}

#[test]
fn drawing_shape_plans_a_preview() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Arrow));
    core.on_pointer_down(Point::new(100.0, 100.0), Button::Primary, Modifiers::default());
    core.on_pointer_move(Point::new(140.0, 100.0), Modifiers::default());
    let Some(preview) = core.plan_frame().preview else {
        panic!("a shape in progress should be previewed");
    };
    assert_eq!(preview.anchor, Point::new(25.0, 37.5));
    assert!(matches!(preview.data, AnnotationData::Arrow(ref a) if a.end_x == 20.0));
}

#[test]
fn touch_draws_shapes_too() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Circle));
    core.on_touch_start(&[touch(100.0, 100.0)], 0.0);
    core.on_touch_move(&[touch(130.0, 120.0)], 50.0);
    let actions = core.on_touch_end(&[], &[touch(130.0, 120.0)], 100.0);
    assert!(matches!(created(&actions).map(|a| &a.data), Some(AnnotationData::Circle(_))));
    assert_eq!(offset(&core), (0.0, 0.0));
}

#[test]
fn touch_cancel_drops_the_shape_in_progress() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Circle));
    core.on_touch_start(&[touch(100.0, 100.0)], 0.0);
    core.on_touch_move(&[touch(130.0, 120.0)], 50.0);

    let actions = core.on_touch_cancel();
    assert!(actions.contains(&Action::RenderNeeded));
    assert!(created(&actions).is_none());
    assert!(core.annotations.is_empty());
    assert_eq!(core.input, InputState::Idle);
    assert!(core.plan_frame().preview.is_none());
}

#[test]
fn text_tool_still_touch_prompts() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Text));
    core.on_touch_start(&[touch(90.0, 45.0)], 0.0);
    let actions = core.on_touch_end(&[], &[touch(90.0, 45.0)], 100.0);
    assert!(actions.contains(&Action::TextInputRequested(Point::new(20.0, 10.0))));
}

#[test]
fn text_tool_touch_drag_is_not_a_tap() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Text));
    core.on_touch_start(&[touch(10.0, 10.0)], 0.0);
    assert!(core.on_touch_move(&[touch(70.0, 10.0)], 50.0).is_empty());

    let actions = core.on_touch_end(&[], &[touch(70.0, 10.0)], 100.0);
    assert!(!actions.iter().any(|a| matches!(a, Action::TextInputRequested(_))));
    assert!(core.annotation_mode.pending_text.is_none());
    assert_eq!(offset(&core), (0.0, 0.0));
}

#[test]
fn text_tool_click_prompts_then_commits() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Text));

    let actions = click(&mut core, Point::new(90.0, 45.0));
    assert_eq!(actions, [Action::TextInputRequested(Point::new(20.0, 10.0))]);
    assert_eq!(core.input, InputState::Idle);

    let actions = core.submit_text("  Check beam  ", 42.0);
    let Some(annotation) = created(&actions) else {
        panic!("submit should commit");
    };
    assert_eq!(annotation.anchor(), Point::new(20.0, 10.0));
    assert_eq!(annotation.created_at, 42.0);
    assert!(matches!(&annotation.data, AnnotationData::Text(t) if t.text == "Check beam" && t.font_size == 16.0));
    assert!(core.annotation_mode.pending_text.is_none());
}

#[test]
fn blank_or_cancelled_text_commits_nothing() {
    let mut core = drawing_core();
    core.select_annotation_tool(Some(AnnotationTool::Text));
    click(&mut core, Point::new(90.0, 45.0));
    assert!(core.submit_text("   ", 0.0).is_empty());

    click(&mut core, Point::new(90.0, 45.0));
    core.cancel_text();
    assert!(core.submit_text("late", 0.0).is_empty());
    assert!(core.annotations.is_empty());
}

#[test]
fn text_settings_apply_to_new_text() {
    let mut core = drawing_core();
    core.update_text_settings(TextSettingsPatch { font_size: Some(24.0), ..TextSettingsPatch::default() });
    core.select_annotation_tool(Some(AnnotationTool::Text));
    click(&mut core, Point::new(90.0, 45.0));
    let actions = core.submit_text("big", 0.0);
    assert!(matches!(created(&actions).map(|a| &a.data), Some(AnnotationData::Text(t)) if t.font_size == 24.0));
}

#[test]
fn annotations_follow_discipline_and_revision() {
    let mut core = drawing_core();
    let Some(ctx) = core.view_context() else {
        panic!("drawing selected");
    };
    core.annotations.add(&ctx, Point::new(1.0, 1.0), core.annotation_mode.settings.text_data("x".to_owned()), 0.0);
    assert_eq!(core.visible_annotations().len(), 1);

    core.select_discipline("B");
    assert!(core.visible_annotations().is_empty());
    assert!(core.plan_frame().annotations.is_empty());

    core.select_discipline("A");
    assert_eq!(core.nav.revision.as_deref(), Some("A1"));
    assert_eq!(core.visible_annotations().len(), 1);

    core.select_revision("A2");
    assert!(core.visible_annotations().is_empty());
}

fn with_rectangle(core: &mut EngineCore) -> AnnotationId {
    let Some(ctx) = core.view_context() else {
        panic!("drawing selected");
    };
    let data = AnnotationData::Rectangle(ShapeData {
        width: 20.0,
        height: 20.0,
        color: "#ef4444".to_owned(),
        line_width: 3.0,
        fill: false,
    });
    core.annotations.add(&ctx, Point::new(10.0, 10.0), data, 0.0).id
}

#[test]
fn delete_pick_asks_for_confirmation() {
    let mut core = drawing_core();
    let id = with_rectangle(&mut core);
    core.set_annotation_mode(true);

    let actions = click(&mut core, canvas_of(12.0, 12.0));
    assert_eq!(actions, [Action::ConfirmDeleteRequested(id.clone())]);
    assert_eq!(core.annotations.len(), 1);

    let actions = core.confirm_delete();
    assert_eq!(actions, [Action::AnnotationDeleted(id), Action::RenderNeeded]);
    assert!(core.annotations.is_empty());
}

#[test]
fn cancelled_delete_keeps_annotation() {
    let mut core = drawing_core();
    with_rectangle(&mut core);
    core.set_annotation_mode(true);
    click(&mut core, canvas_of(12.0, 12.0));
    core.cancel_delete();
    assert!(core.confirm_delete().is_empty());
    assert_eq!(core.annotations.len(), 1);
}

#[test]
fn delete_pick_miss_does_nothing() {
    let mut core = drawing_core();
    with_rectangle(&mut core);
    core.set_annotation_mode(true);
    assert!(click(&mut core, canvas_of(90.0, 90.0)).is_empty());
    assert!(core.annotation_mode.pending_delete.is_none());
}

#[test]
fn annotation_mode_suppresses_hotspot_clicks() {
    let mut core = site_core();
    core.set_annotation_mode(true);
    assert!(selections(&click(&mut core, canvas_of(10.0, 10.0))).is_empty());
}

#[test]
fn update_and_clear_annotations() {
    let mut core = drawing_core();
    let id = with_rectangle(&mut core);
    let data = core.annotation_mode.settings.text_data("now text".to_owned());
    let actions = core.update_annotation(&id, data, 99.0);
    assert!(matches!(actions.first(), Some(Action::AnnotationUpdated(a)) if a.updated_at == 99.0));
    let data = core.annotation_mode.settings.text_data("gone".to_owned());
    assert!(core.update_annotation("missing", data, 1.0).is_empty());

    assert_eq!(core.clear_annotations(), [Action::AnnotationsCleared, Action::RenderNeeded]);
    assert!(core.annotations.is_empty());
}

#[test]
fn export_then_import_restores_annotations() {
    let mut core = drawing_core();
    with_rectangle(&mut core);
    let json = match core.export_annotations() {
        Ok(json) => json,
        Err(e) => panic!("export failed: {e}"),
    };

    let mut other = drawing_core();
    assert!(other.import_annotations(&json).is_ok());
    assert_eq!(other.annotations, core.annotations);
    assert!(other.import_annotations("{").is_err());
    assert_eq!(other.annotations.len(), 1);
}

// =============================================================
// Cursor
// =============================================================

#[test]
fn cursor_follows_gesture_and_selection() {
    let mut core = drawing_core();
    assert_eq!(core.cursor(), "grab");

    core.on_pointer_down(Point::default(), Button::Primary, Modifiers::default());
    assert_eq!(core.cursor(), "grabbing");
    core.on_pointer_up(Point::default(), Button::Primary, Modifiers::default(), 0.0);

    core.toggle_layer("B");
    core.select_layer(Some("B"));
    assert_eq!(core.cursor(), "crosshair");

    core.select_layer(None);
    core.select_annotation_tool(Some(AnnotationTool::Arrow));
    assert_eq!(core.cursor(), "crosshair");
    core.set_annotation_mode(false);
    assert_eq!(core.cursor(), "grab");
}

// =============================================================
// Frame planning
// =============================================================

#[test]
fn site_map_plan_has_hotspots() {
    let mut core = site_core();
    core.on_pointer_move(canvas_of(10.0, 10.0), Modifiers::default());
    let plan = core.plan_frame();
    assert_eq!(plan.base_image.as_deref(), Some("site.png"));
    assert_eq!(plan.hotspots.len(), 1);
    assert_eq!(plan.hotspots[0].label, "Main");
    assert!(plan.hotspots[0].hovered);
    assert_eq!((plan.width, plan.height, plan.dpr), (500.0, 250.0, 1.0));
}

#[test]
fn drawing_plan_has_layers_in_z_order() {
    let mut core = drawing_core();
    core.toggle_layer("B");
    core.toggle_layer("A");
    core.select_layer(Some("B"));
    core.send_layer_to_back("A");

    let plan = core.plan_frame();
    assert_eq!(plan.base_image.as_deref(), Some("a1.png"));
    assert!(plan.hotspots.is_empty());
    let layers: Vec<(&str, &str, bool)> =
        plan.layers.iter().map(|l| (l.discipline.as_str(), l.image.as_str(), l.selected)).collect();
    assert_eq!(layers, [("A", "a1.png", false), ("B", "b1.png", true)]);
    assert!((plan.layers[1].alpha - 0.7).abs() < 1e-9);
}

#[test]
fn hidden_layers_are_not_planned() {
    let mut core = drawing_core();
    core.toggle_layer("B");
    core.toggle_layer("B");
    assert!(core.plan_frame().layers.is_empty());
}

#[test]
fn each_plan_supersedes_the_last() {
    let mut core = site_core();
    let first = core.plan_frame().generation;
    let second = core.plan_frame().generation;
    assert!(second > first);
    assert_eq!(core.render_generation(), second);
    assert!(!core.gate.is_current(first));
    assert!(core.gate.is_current(second));
}

#[test]
fn plan_without_metadata_is_empty() {
    let mut core = EngineCore::new();
    let plan = core.plan_frame();
    assert!(plan.base_image.is_none());
    assert!(plan.layers.is_empty());
}

// =============================================================
// Action
// =============================================================

#[test]
fn actions_serialize_tagged() {
    let value = serde_json::to_value(Action::SetCursor("grab".to_owned())).ok();
    assert_eq!(value, Some(json!({ "type": "setCursor", "payload": "grab" })));
    let value = serde_json::to_value(Action::RenderNeeded).ok();
    assert_eq!(value, Some(json!({ "type": "renderNeeded" })));
}
