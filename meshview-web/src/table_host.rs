/// Shadow-DOM host for [`ReactiveTable`](meshview_core::ReactiveTable)
use std::cell::Cell;
use std::rc::Rc;

use log::error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, ResizeObserver, ShadowRoot, ShadowRootInit, ShadowRootMode, Window};

use meshview_core::table::{TableHost, GRID_CONTAINER_CLASS};
use meshview_core::Subscription;

use crate::host::listen;

const STYLE: &str = "<style>\
:host { display: block; }\
.table-wrapper { width: 100%; overflow-x: auto; }\
.grid-container { width: 100%; }\
.subtitle { margin-top: 0.5rem; font-size: 0.875rem; opacity: 0.75; }\
</style>";

pub struct WebTableHost {
    window: Window,
    document: Document,
}

impl WebTableHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self { window, document })
    }

    fn shadow_root(&self, container_id: &str) -> Option<ShadowRoot> {
        let element = self.document.get_element_by_id(container_id)?;
        if let Some(root) = element.shadow_root() {
            return Some(root);
        }
        match element.attach_shadow(&ShadowRootInit::new(ShadowRootMode::Open)) {
            Ok(root) => Some(root),
            Err(err) => {
                error!("failed to attach shadow root to '{}': {:?}", container_id, err);
                None
            }
        }
    }

    fn grid_container(&self, container_id: &str) -> Option<Element> {
        let selector = format!(".{}", GRID_CONTAINER_CLASS);
        self.shadow_root(container_id)?
            .query_selector(&selector)
            .ok()
            .flatten()
    }
}

impl TableHost for WebTableHost {
    fn container_exists(&self, container_id: &str) -> bool {
        self.document.get_element_by_id(container_id).is_some()
    }

    fn mount_markup(&self, container_id: &str, markup: &str) {
        if let Some(root) = self.shadow_root(container_id) {
            root.set_inner_html(&format!("{}{}", STYLE, markup));
        }
    }

    fn observe_resize(&self, container_id: &str, callback: Box<dyn FnMut()>) -> Subscription {
        let Some(target) = self.grid_container(container_id) else {
            return Subscription::noop();
        };
        let mut callback = callback;
        let closure = Closure::<dyn FnMut(JsValue)>::new(move |_entries: JsValue| callback());
        let observer = match ResizeObserver::new(closure.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                error!("ResizeObserver unavailable: {:?}", err);
                return Subscription::noop();
            }
        };
        observer.observe(&target);
        Subscription::new(move || {
            observer.disconnect();
            drop(closure);
        })
    }

    fn on_window_resize(&self, callback: Box<dyn FnMut()>) -> Subscription {
        let mut callback = callback;
        let closure =
            Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| callback());
        listen(&self.window, "resize", closure)
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Subscription {
        let fired = Rc::new(Cell::new(false));
        let closure = {
            let fired = Rc::clone(&fired);
            Closure::once(move || {
                fired.set(true);
                callback();
            })
        };
        let handle = match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                delay_ms as i32,
            ) {
            Ok(handle) => handle,
            Err(err) => {
                error!("setTimeout failed: {:?}", err);
                return Subscription::noop();
            }
        };
        let window = self.window.clone();
        Subscription::new(move || {
            if !fired.get() {
                window.clear_timeout_with_handle(handle);
            }
            drop(closure);
        })
    }
}
