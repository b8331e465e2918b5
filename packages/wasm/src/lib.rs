//! # Canopy browser binding
//!
//! Attaches an [`Overlay`] to the live document: page input is captured on
//! `document`, host commands arrive as window `message` events and outbound
//! events go to `window.parent` through `postMessage`.
//!
//! ```js
//! import init, { attach } from "canopy-wasm";
//! await init();
//! const overlay = attach(JSON.stringify({ dragThreshold: 6 }));
//! // later
//! overlay.detach();
//! ```

mod web_dom;

use canopy_overlay::{Command, InputEvent, Mode, Overlay, OverlayConfig};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, EventTarget, KeyboardEvent, MessageEvent, MouseEvent};

pub use web_dom::WebDom;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // Route the engine's tracing events to the browser console
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::DEBUG)
            .build(),
    );
}

/// Document events captured (capture phase) while attached
const PAGE_EVENTS: [&str; 8] = [
    "mousedown",
    "mousemove",
    "mouseup",
    "mouseover",
    "mouseout",
    "click",
    "keydown",
    "blur",
];

struct Binding {
    overlay: RefCell<Overlay<WebDom>>,
    cue_timer: Cell<Option<i32>>,
}

type Shared = Rc<Binding>;

struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

/// Handle returned by [`attach`]; dropping it without `detach` leaves the
/// listeners installed for the life of the page.
#[wasm_bindgen]
pub struct OverlayHandle {
    binding: Shared,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl OverlayHandle {
    /// Current mode name
    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        self.binding.overlay.borrow().session().mode().to_string()
    }

    /// Run one host command given as a JSON string, bypassing the channel
    #[wasm_bindgen(js_name = sendCommand)]
    pub fn send_command(&self, command_json: &str) -> Result<bool, JsValue> {
        let mut message: Value = serde_json::from_str(command_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid command: {}", e)))?;
        let Some(fields) = message.as_object_mut() else {
            return Err(JsValue::from_str("Invalid command: expected an object"));
        };
        let handled = {
            let mut overlay = self.binding.overlay.borrow_mut();
            fields.insert(
                "source".to_string(),
                Value::String(overlay.config().channel.host_source.clone()),
            );
            overlay.handle_message(&message)
        };
        flush(&self.binding);
        Ok(handled)
    }

    /// Remove every listener and the overlay's marker state
    pub fn detach(self) {
        for listener in &self.listeners {
            let _ = listener.target.remove_event_listener_with_callback_and_bool(
                listener.kind,
                listener.closure.as_ref().unchecked_ref(),
                true,
            );
        }
        if let Ok(mut overlay) = self.binding.overlay.try_borrow_mut() {
            overlay.dispatch(Command::SetMode { mode: Mode::Select });
            overlay.dispatch(Command::ClearSelection);
            overlay.drain_events();
        }
        info!("Overlay detached");
    }
}

/// Attach the overlay to the current document. `config_json` may be empty
/// or any subset of the config fields.
#[wasm_bindgen]
pub fn attach(config_json: &str) -> Result<OverlayHandle, JsValue> {
    let config = if config_json.trim().is_empty() {
        OverlayConfig::default()
    } else {
        OverlayConfig::from_json(config_json).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
    };

    let dom = WebDom::from_window().ok_or_else(|| JsValue::from_str("No document to attach to"))?;
    let window = dom.window().clone();
    let document: EventTarget = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document to attach to"))?
        .into();

    let binding = Rc::new(Binding {
        overlay: RefCell::new(Overlay::new(dom, config)),
        cue_timer: Cell::new(None),
    });

    let mut listeners = Vec::with_capacity(PAGE_EVENTS.len() + 1);
    for kind in PAGE_EVENTS {
        let shared = Rc::clone(&binding);
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| on_page_event(&shared, &event));
        document.add_event_listener_with_callback_and_bool(kind, closure.as_ref().unchecked_ref(), true)?;
        listeners.push(Listener {
            target: document.clone(),
            kind,
            closure,
        });
    }

    let shared = Rc::clone(&binding);
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        if let Some(message) = event.dyn_ref::<MessageEvent>() {
            on_host_message(&shared, message);
        }
    });
    let window_target: EventTarget = window.into();
    window_target.add_event_listener_with_callback_and_bool("message", closure.as_ref().unchecked_ref(), false)?;
    listeners.push(Listener {
        target: window_target,
        kind: "message",
        closure,
    });

    info!(listeners = listeners.len(), "Overlay attached");
    // Announce readiness
    flush(&binding);
    Ok(OverlayHandle { binding, listeners })
}

fn to_input(event: &Event) -> Option<InputEvent<Element>> {
    let target = || event.target().and_then(|t| t.dyn_into::<Element>().ok());
    let pointer = || event.dyn_ref::<MouseEvent>().map(|e| (e.client_x() as f64, e.client_y() as f64));

    let input = match event.type_().as_str() {
        "mousedown" => {
            let (x, y) = pointer()?;
            InputEvent::PointerDown { target: target()?, x, y }
        }
        "mousemove" => {
            let (x, y) = pointer()?;
            InputEvent::PointerMove { x, y }
        }
        "mouseup" => {
            let (x, y) = pointer()?;
            InputEvent::PointerUp { x, y }
        }
        "mouseover" => {
            let (x, y) = pointer()?;
            InputEvent::PointerOver { target: target()?, x, y }
        }
        "mouseout" => InputEvent::PointerOut { target: target()? },
        "click" => InputEvent::Click { target: target()? },
        "keydown" => InputEvent::KeyDown {
            key: event.dyn_ref::<KeyboardEvent>()?.key(),
        },
        "blur" => InputEvent::Blur { target: target()? },
        _ => return None,
    };
    Some(input)
}

fn on_page_event(binding: &Shared, event: &Event) {
    let Some(input) = to_input(event) else {
        return;
    };
    // DOM writes made by the overlay can fire events synchronously (blur on
    // removal); those re-enter here while the overlay is borrowed.
    let Ok(mut overlay) = binding.overlay.try_borrow_mut() else {
        return;
    };
    let disposition = overlay.handle_input(input);
    drop(overlay);

    if disposition.prevents_default() {
        event.prevent_default();
        event.stop_immediate_propagation();
    }
    flush(binding);
}

fn on_host_message(binding: &Shared, message: &MessageEvent) {
    let data = message.data();
    let Some(json) = js_sys::JSON::stringify(&data).ok().and_then(|s| s.as_string()) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<Value>(&json) else {
        return;
    };
    let Ok(mut overlay) = binding.overlay.try_borrow_mut() else {
        return;
    };
    overlay.handle_message(&value);
    drop(overlay);
    flush(binding);
}

/// Post queued events to the host and schedule the rollback cue fade
fn flush(binding: &Shared) {
    let (messages, cue_pending, cue_ms, window) = {
        let Ok(mut overlay) = binding.overlay.try_borrow_mut() else {
            return;
        };
        (
            overlay.drain_messages(),
            overlay.rollback_cue_pending(),
            overlay.config().rollback_cue_ms,
            overlay.tree().window().clone(),
        )
    };

    if let Ok(Some(parent)) = window.parent() {
        for message in messages {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if let Ok(value) = js_sys::JSON::parse(&text) {
                let _ = parent.post_message(&value, "*");
            }
        }
    }

    if cue_pending && binding.cue_timer.get().is_none() {
        let shared = Rc::clone(binding);
        let fade = Closure::once_into_js(move || {
            shared.cue_timer.set(None);
            if let Ok(mut overlay) = shared.overlay.try_borrow_mut() {
                overlay.clear_rollback_cue();
            }
        });
        let timeout = i32::try_from(cue_ms).unwrap_or(i32::MAX);
        if let Ok(id) = window.set_timeout_with_callback_and_timeout_and_arguments_0(fade.unchecked_ref(), timeout) {
            binding.cue_timer.set(Some(id));
        }
    }
}
