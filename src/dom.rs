//! Browser event wiring for an [`Engine`].
//!
//! [`attach`] registers the canvas listeners (press, click, wheel, touch) and
//! the window listeners (move, release, resize). Move and release live on the
//! window so a drag keeps tracking after the pointer leaves the canvas. Every
//! listener is owned by the returned [`ListenerGuard`] and removed when it is
//! dropped.
//!
//! Actions coming back from the engine are split three ways: cursor changes
//! go to the canvas style, render requests start one render pass, and the
//! rest is forwarded to the host callback as JSON.

#[cfg(test)]
#[path = "dom_test.rs"]
mod dom_test;

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Date, Function};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    AddEventListenerOptions, Event, EventTarget, HtmlCanvasElement, MouseEvent, TouchEvent, TouchList, WheelEvent,
};

use crate::camera::Point;
use crate::engine::{Action, Engine};
use crate::input::{Button, Modifiers, TouchPoint, WheelDelta};

/// Canvas-relative point for a viewport (client) position.
#[must_use]
pub fn relative_point(client_x: f64, client_y: f64, left: f64, top: f64) -> Point {
    Point::new(client_x - left, client_y - top)
}

#[must_use]
pub fn map_modifiers(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers { shift, ctrl, alt, meta }
}

/// Engine actions sorted by who handles them.
#[derive(Debug, Default, PartialEq)]
pub struct Routed {
    /// Last cursor requested, if any.
    pub cursor: Option<String>,
    pub render: bool,
    /// Everything the host page handles.
    pub host: Vec<Action>,
}

/// Sort `actions` into cursor, render and host work.
#[must_use]
pub fn route(actions: Vec<Action>) -> Routed {
    let mut routed = Routed::default();
    for action in actions {
        match action {
            Action::SetCursor(cursor) => routed.cursor = Some(cursor),
            Action::RenderNeeded => routed.render = true,
            other => routed.host.push(other),
        }
    }
    routed
}

fn canvas_point(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> Point {
    let rect = canvas.get_bounding_client_rect();
    relative_point(f64::from(client_x), f64::from(client_y), rect.left(), rect.top())
}

fn mouse_modifiers(ev: &MouseEvent) -> Modifiers {
    map_modifiers(ev.shift_key(), ev.ctrl_key(), ev.alt_key(), ev.meta_key())
}

fn touch_points(canvas: &HtmlCanvasElement, list: &TouchList) -> Vec<TouchPoint> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .map(|t| TouchPoint { id: t.identifier(), pos: canvas_point(canvas, t.client_x(), t.client_y()) })
        .collect()
}

// =============================================================
// Listener ownership
// =============================================================

struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

/// Owns registered listeners; dropping it unregisters all of them.
#[derive(Default)]
pub struct ListenerGuard {
    listeners: Vec<Listener>,
}

impl ListenerGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Register `handler` for `kind` on `target`.
    ///
    /// Non-passive listeners may call `prevent_default` (wheel and touch
    /// handlers stop the page from scrolling).
    ///
    /// # Errors
    ///
    /// Returns the DOM exception when the browser rejects the registration.
    pub fn listen<F>(&mut self, target: &EventTarget, kind: &'static str, passive: bool, handler: F) -> Result<(), JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        let options = AddEventListenerOptions::new();
        options.set_passive(passive);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            kind,
            callback.as_ref().unchecked_ref(),
            &options,
        )?;
        self.listeners.push(Listener { target: target.clone(), kind, callback });
        Ok(())
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for listener in self.listeners.drain(..) {
            if let Err(e) = listener
                .target
                .remove_event_listener_with_callback(listener.kind, listener.callback.as_ref().unchecked_ref())
            {
                log::warn!("failed to remove {} listener: {e:?}", listener.kind);
            }
        }
    }
}

// =============================================================
// Wiring
// =============================================================

/// Forwards engine actions to the canvas, the render loop and the host.
#[derive(Clone)]
struct Dispatcher {
    engine: Rc<RefCell<Engine>>,
    host: Option<Function>,
}

impl Dispatcher {
    fn dispatch(&self, actions: Vec<Action>) {
        let routed = route(actions);
        if let Some(cursor) = routed.cursor {
            self.engine.borrow().set_cursor(&cursor);
        }
        for action in &routed.host {
            self.notify(action);
        }
        if routed.render {
            self.engine.borrow_mut().render();
        }
    }

    fn notify(&self, action: &Action) {
        let Some(host) = &self.host else {
            return;
        };
        match serde_json::to_string(action) {
            Ok(json) => {
                if let Err(e) = host.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                    log::warn!("host action callback failed: {e:?}");
                }
            }
            Err(e) => log::warn!("failed to serialize action: {e}"),
        }
    }

    /// Run `f` against the engine, then dispatch what it returned.
    fn with_engine(&self, f: impl FnOnce(&mut Engine) -> Vec<Action>) {
        let actions = f(&mut self.engine.borrow_mut());
        self.dispatch(actions);
    }
}

/// Wire `engine` to its canvas and the window.
///
/// `host` receives every action the page must handle (drawing selection,
/// text prompts, delete confirmations, annotation changes, viewport updates)
/// as a JSON string. Keep the guard alive as long as the canvas is mounted.
///
/// # Errors
///
/// Fails when there is no window or a listener cannot be registered; the
/// listeners registered so far are removed again.
pub fn attach(engine: Rc<RefCell<Engine>>, host: Option<Function>) -> Result<ListenerGuard, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let canvas = engine.borrow().canvas().clone();
    let canvas_target: &EventTarget = canvas.as_ref();
    let window_target: &EventTarget = window.as_ref();
    let dispatcher = Dispatcher { engine, host };
    let mut guard = ListenerGuard::new();

    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(canvas_target, "mousedown", true, move |ev| {
            let Some(ev) = ev.dyn_ref::<MouseEvent>() else { return };
            let p = canvas_point(&canvas, ev.client_x(), ev.client_y());
            d.with_engine(|e| e.on_pointer_down(p, Button::from_dom(ev.button()), mouse_modifiers(ev)));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(window_target, "mousemove", true, move |ev| {
            let Some(ev) = ev.dyn_ref::<MouseEvent>() else { return };
            let p = canvas_point(&canvas, ev.client_x(), ev.client_y());
            d.with_engine(|e| e.on_pointer_move(p, mouse_modifiers(ev)));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(window_target, "mouseup", true, move |ev| {
            let Some(ev) = ev.dyn_ref::<MouseEvent>() else { return };
            let p = canvas_point(&canvas, ev.client_x(), ev.client_y());
            d.with_engine(|e| e.on_pointer_up(p, Button::from_dom(ev.button()), mouse_modifiers(ev), Date::now()));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(canvas_target, "click", true, move |ev| {
            let Some(ev) = ev.dyn_ref::<MouseEvent>() else { return };
            let p = canvas_point(&canvas, ev.client_x(), ev.client_y());
            d.with_engine(|e| e.on_click(p));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(canvas_target, "wheel", false, move |ev| {
            let Some(ev) = ev.dyn_ref::<WheelEvent>() else { return };
            ev.prevent_default();
            let p = canvas_point(&canvas, ev.client_x(), ev.client_y());
            let delta = WheelDelta { dx: ev.delta_x(), dy: ev.delta_y() };
            d.with_engine(|e| e.on_wheel(p, delta, mouse_modifiers(ev)));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(canvas_target, "touchstart", false, move |ev| {
            let Some(ev) = ev.dyn_ref::<TouchEvent>() else { return };
            ev.prevent_default();
            let touches = touch_points(&canvas, &ev.touches());
            d.with_engine(|e| e.on_touch_start(&touches, Date::now()));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(canvas_target, "touchmove", false, move |ev| {
            let Some(ev) = ev.dyn_ref::<TouchEvent>() else { return };
            ev.prevent_default();
            let touches = touch_points(&canvas, &ev.touches());
            d.with_engine(|e| e.on_touch_move(&touches, Date::now()));
        })?;
    }
    {
        let (d, canvas) = (dispatcher.clone(), canvas.clone());
        guard.listen(canvas_target, "touchend", false, move |ev| {
            let Some(ev) = ev.dyn_ref::<TouchEvent>() else { return };
            ev.prevent_default();
            let remaining = touch_points(&canvas, &ev.touches());
            let ended = touch_points(&canvas, &ev.changed_touches());
            d.with_engine(|e| e.on_touch_end(&remaining, &ended, Date::now()));
        })?;
    }
    {
        let d = dispatcher.clone();
        guard.listen(canvas_target, "touchcancel", false, move |ev| {
            ev.prevent_default();
            d.with_engine(Engine::on_touch_cancel);
        })?;
    }
    {
        let (d, canvas, win) = (dispatcher.clone(), canvas.clone(), window.clone());
        guard.listen(window_target, "resize", true, move |_| {
            let (w, h) = (f64::from(canvas.client_width()), f64::from(canvas.client_height()));
            let dpr = win.device_pixel_ratio();
            d.with_engine(|e| e.set_viewport(w, h, dpr));
        })?;
    }

    let (w, h) = (f64::from(canvas.client_width()), f64::from(canvas.client_height()));
    dispatcher.with_engine(|e| e.set_viewport(w, h, window.device_pixel_ratio()));
    Ok(guard)
}
