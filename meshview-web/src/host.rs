/// Browser page as a session host
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, PointerEvent, ResizeObserver, WheelEvent, Window};

use meshview_core::config::RendererSettings;
use meshview_core::session::{Host, PointerInput, ResizeEvent};
use meshview_core::{Renderer, SessionError, Subscription, SurfaceSize};

use crate::canvas::CanvasRenderer;

/// Keep `closure` registered for `event` on `target` until the subscription ends
pub(crate) fn listen(
    target: &web_sys::EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
) -> Subscription {
    if let Err(err) = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
        error!("failed to listen for {}: {:?}", event, err);
        return Subscription::noop();
    }
    let target = target.clone();
    Subscription::new(move || {
        target
            .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .ok();
    })
}

pub(crate) fn viewport_width(window: &Window) -> f64 {
    window
        .inner_width()
        .ok()
        .and_then(|width| width.as_f64())
        .unwrap_or(0.0)
}

pub struct WebHost {
    window: Window,
    document: Document,
}

impl WebHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self { window, document })
    }

    fn container(&self, container_id: &str) -> Option<Element> {
        self.document.get_element_by_id(container_id)
    }
}

impl Host for WebHost {
    fn container_width(&self, container_id: &str) -> Option<f64> {
        self.container(container_id)
            .map(|element| element.client_width() as f64)
    }

    fn viewport_width(&self) -> f64 {
        viewport_width(&self.window)
    }

    fn create_renderer(
        &self,
        container_id: &str,
        size: SurfaceSize,
        settings: &RendererSettings,
    ) -> Result<Box<dyn Renderer>, SessionError> {
        let container = self
            .container(container_id)
            .ok_or_else(|| SessionError::MissingContainer(container_id.to_string()))?;
        let renderer = CanvasRenderer::create(
            &self.document,
            &container,
            size,
            self.window.device_pixel_ratio(),
            settings,
        )
        .map_err(|err| SessionError::Surface(format!("{:?}", err)))?;
        Ok(Box::new(renderer))
    }

    fn add_caption(&self, container_id: &str, text: &str) -> Subscription {
        let Some(container) = self.container(container_id) else {
            return Subscription::noop();
        };
        match self.document.create_element("div") {
            Ok(caption) => {
                caption.set_class_name("subtitle");
                caption.set_text_content(Some(text));
                container.append_child(&caption).ok();
                Subscription::new(move || caption.remove())
            }
            Err(err) => {
                error!("failed to create caption: {:?}", err);
                Subscription::noop()
            }
        }
    }

    /// Window resizes and container resizes both report fresh measurements
    fn on_resize(&self, container_id: &str, callback: Box<dyn FnMut(ResizeEvent)>) -> Subscription {
        let Some(container) = self.container(container_id) else {
            return Subscription::noop();
        };
        let callback = Rc::new(RefCell::new(callback));
        let measure = {
            let window = self.window.clone();
            let container = container.clone();
            move || ResizeEvent {
                container_width: container.client_width() as f64,
                viewport_width: viewport_width(&window),
            }
        };

        let on_window = {
            let callback = Rc::clone(&callback);
            let measure = measure.clone();
            Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
                (*callback.borrow_mut())(measure())
            })
        };
        let window_subscription = listen(&self.window, "resize", on_window);

        let on_observe = {
            let callback = Rc::clone(&callback);
            Closure::<dyn FnMut(JsValue)>::new(move |_entries: JsValue| (*callback.borrow_mut())(measure()))
        };
        let observer = match ResizeObserver::new(on_observe.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                error!("ResizeObserver unavailable: {:?}", err);
                return window_subscription;
            }
        };
        observer.observe(&container);

        Subscription::new(move || {
            observer.disconnect();
            drop(on_observe);
            window_subscription.cancel();
        })
    }

    /// Pointer events cover mouse, pen and touch alike
    fn bind_pointer(&self, container_id: &str, callback: Box<dyn FnMut(PointerInput)>) -> Subscription {
        let Some(container) = self.container(container_id) else {
            return Subscription::noop();
        };
        // keep touch drags from scrolling the page
        if let Some(element) = container.dyn_ref::<HtmlElement>() {
            element.style().set_property("touch-action", "none").ok();
        }
        let callback = Rc::new(RefCell::new(callback));
        let active: Rc<Cell<Option<(i32, i32, i32)>>> = Rc::new(Cell::new(None));

        let on_down = {
            let active = Rc::clone(&active);
            let container = container.clone();
            Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
                    return;
                };
                if active.get().is_some() || !pointer.is_primary() {
                    return;
                }
                container.set_pointer_capture(pointer.pointer_id()).ok();
                active.set(Some((pointer.pointer_id(), pointer.client_x(), pointer.client_y())));
            })
        };
        let on_move = {
            let active = Rc::clone(&active);
            let callback = Rc::clone(&callback);
            Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
                    return;
                };
                let Some((id, x, y)) = active.get() else {
                    return;
                };
                if pointer.pointer_id() != id {
                    return;
                }
                let (nx, ny) = (pointer.client_x(), pointer.client_y());
                active.set(Some((id, nx, ny)));
                (*callback.borrow_mut())(PointerInput::Drag {
                    dx: (nx - x) as f32,
                    dy: (ny - y) as f32,
                });
            })
        };
        let on_up = {
            let active = Rc::clone(&active);
            Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                let (Some((id, _, _)), Some(pointer)) = (active.get(), event.dyn_ref::<PointerEvent>()) else {
                    return;
                };
                if pointer.pointer_id() == id {
                    active.set(None);
                }
            })
        };
        let on_cancel = {
            let active = Rc::clone(&active);
            Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| active.set(None))
        };
        let on_wheel = {
            let callback = Rc::clone(&callback);
            Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                if let Some(wheel) = event.dyn_ref::<WheelEvent>() {
                    event.prevent_default();
                    (*callback.borrow_mut())(PointerInput::Wheel {
                        delta: wheel.delta_y() as f32,
                    });
                }
            })
        };

        let subscriptions = vec![
            listen(&container, "pointerdown", on_down),
            listen(&container, "pointermove", on_move),
            listen(&container, "pointerup", on_up),
            listen(&container, "pointercancel", on_cancel),
            listen(&container, "wheel", on_wheel),
        ];
        Subscription::new(move || drop(subscriptions))
    }

    /// `requestAnimationFrame` loop that reschedules itself until cancelled
    fn animation_loop(&self, callback: Box<dyn FnMut(f64)>) -> Subscription {
        let window = self.window.clone();
        let handle = Rc::new(Cell::new(None::<i32>));
        let frame: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));

        let mut callback = callback;
        let closure = {
            let window = window.clone();
            let handle = Rc::clone(&handle);
            let frame = Rc::clone(&frame);
            Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
                callback(timestamp);
                if let Some(next) = frame.borrow().as_ref() {
                    match window.request_animation_frame(next.as_ref().unchecked_ref()) {
                        Ok(id) => handle.set(Some(id)),
                        Err(err) => error!("requestAnimationFrame failed: {:?}", err),
                    }
                }
            })
        };

        match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            Ok(id) => handle.set(Some(id)),
            Err(err) => {
                error!("requestAnimationFrame failed: {:?}", err);
                return Subscription::noop();
            }
        }
        *frame.borrow_mut() = Some(closure);

        Subscription::new(move || {
            if let Some(id) = handle.take() {
                window.cancel_animation_frame(id).ok();
            }
            // breaks the closure's reference to itself
            frame.borrow_mut().take();
        })
    }
}
