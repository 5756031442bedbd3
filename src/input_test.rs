#![allow(clippy::float_cmp)]

use super::*;

// =============================================================
// Modifiers / Button
// =============================================================

#[test]
fn modifiers_default_all_false() {
    let m = Modifiers::default();
    assert!(!m.shift);
    assert!(!m.ctrl);
    assert!(!m.alt);
    assert!(!m.meta);
}

#[test]
fn button_from_dom_codes() {
    assert_eq!(Button::from_dom(0), Button::Primary);
    assert_eq!(Button::from_dom(1), Button::Middle);
    assert_eq!(Button::from_dom(2), Button::Secondary);
    assert_eq!(Button::from_dom(4), Button::Primary);
}

// =============================================================
// InputState
// =============================================================

#[test]
fn input_state_default_is_idle() {
    assert_eq!(InputState::default(), InputState::Idle);
}

// =============================================================
// pinch_geometry
// =============================================================

#[test]
fn pinch_geometry_needs_two_touches() {
    assert!(pinch_geometry(&[]).is_none());
    assert!(pinch_geometry(&[TouchPoint::new(0, 1.0, 1.0)]).is_none());
}

#[test]
fn pinch_geometry_distance_and_midpoint() {
    let touches = [TouchPoint::new(0, 0.0, 0.0), TouchPoint::new(1, 30.0, 40.0)];
    let Some((dist, mid)) = pinch_geometry(&touches) else {
        panic!("two touches should give a pinch");
    };
    assert_eq!(dist, 50.0);
    assert_eq!(mid, Point::new(15.0, 20.0));
}

#[test]
fn pinch_geometry_ignores_extra_touches() {
    let touches = [TouchPoint::new(0, 0.0, 0.0), TouchPoint::new(1, 10.0, 0.0), TouchPoint::new(2, 500.0, 500.0)];
    assert_eq!(pinch_geometry(&touches).map(|(d, _)| d), Some(10.0));
}

// =============================================================
// TouchTracker
// =============================================================

#[test]
fn tracker_small_quick_touch_is_tap() {
    let mut t = TouchTracker::begin(Point::new(100.0, 100.0), 1_000.0);
    assert!(!t.track(Point::new(104.0, 103.0), 8.0));
    assert!(t.is_tap(1_200.0, 300.0));
}

#[test]
fn tracker_exactly_at_slop_is_still_tap() {
    let mut t = TouchTracker::begin(Point::new(0.0, 0.0), 0.0);
    assert!(!t.track(Point::new(8.0, 0.0), 8.0));
    assert!(t.is_tap(10.0, 300.0));
}

#[test]
fn tracker_beyond_slop_is_drag_and_stays_drag() {
    let mut t = TouchTracker::begin(Point::new(0.0, 0.0), 0.0);
    assert!(t.track(Point::new(9.0, 0.0), 8.0));
    // Coming back inside the slop does not restore tap candidacy.
    assert!(t.track(Point::new(0.0, 0.0), 8.0));
    assert!(!t.is_tap(10.0, 300.0));
}

#[test]
fn tracker_slow_touch_is_not_tap() {
    let t = TouchTracker::begin(Point::new(0.0, 0.0), 0.0);
    assert!(!t.is_tap(300.0, 300.0));
    assert!(t.is_tap(299.0, 300.0));
}

#[test]
fn tracker_cancel_drops_tap() {
    let mut t = TouchTracker::begin(Point::new(0.0, 0.0), 0.0);
    t.cancel();
    assert!(!t.is_tap(1.0, 300.0));
}
