/// Grid.js bindings through `js_sys::Reflect`
use js_sys::{Array, Function, Reflect};
use log::{error, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Element;

use meshview_core::table::{GridConfig, GridFactory, GridRenderer, GRID_CONTAINER_CLASS};

fn method(target: &JsValue, name: &str) -> Result<Function, JsValue> {
    Reflect::get(target, &JsValue::from_str(name))?
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("'{}' is not a function", name)))
}

fn call0(target: &JsValue, name: &str) -> Result<JsValue, JsValue> {
    method(target, name)?.call0(target)
}

fn call1(target: &JsValue, name: &str, arg: &JsValue) -> Result<JsValue, JsValue> {
    method(target, name)?.call1(target, arg)
}

/// The element the grid mounts into: `.grid-container` inside the
/// container's shadow root, else the container itself
fn grid_container(container_id: &str) -> Option<Element> {
    let document = web_sys::window()?.document()?;
    let host = document.get_element_by_id(container_id)?;
    let selector = format!(".{}", GRID_CONTAINER_CLASS);
    host.shadow_root()
        .and_then(|root| root.query_selector(&selector).ok().flatten())
        .or(Some(host))
}

/// Builds grids from a namespace exposing a `Grid` constructor, usually
/// `window.gridjs`
pub struct GridJsFactory {
    namespace: JsValue,
}

impl GridJsFactory {
    pub fn new(namespace: JsValue) -> Self {
        Self { namespace }
    }

    /// `window.gridjs` when the page has loaded it
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let namespace = Reflect::get(&window, &JsValue::from_str("gridjs")).ok()?;
        if namespace.is_undefined() || namespace.is_null() {
            return None;
        }
        Some(Self::new(namespace))
    }

    fn construct(&self, config: &GridConfig) -> Result<JsValue, JsValue> {
        let json = serde_json::to_string(config)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let options = js_sys::JSON::parse(&json)?;
        let constructor: Function = Reflect::get(&self.namespace, &JsValue::from_str("Grid"))?
            .dyn_into()
            .map_err(|_| JsValue::from_str("Grid is not a constructor"))?;
        Reflect::construct(&constructor, &Array::of1(&options))
    }
}

impl GridFactory for GridJsFactory {
    fn create(&self, config: &GridConfig) -> Box<dyn GridRenderer> {
        match self.construct(config) {
            Ok(instance) => Box::new(GridJs { instance: Some(instance) }),
            Err(err) => {
                error!("failed to construct grid: {:?}", err);
                Box::new(GridJs { instance: None })
            }
        }
    }
}

/// One Grid.js instance. Construction failures leave an inert grid.
pub struct GridJs {
    instance: Option<JsValue>,
}

impl GridRenderer for GridJs {
    fn render(&mut self, container_id: &str) {
        let Some(instance) = &self.instance else {
            return;
        };
        let Some(target) = grid_container(container_id) else {
            warn!("grid target '{}' not found", container_id);
            return;
        };
        if let Err(err) = call1(instance, "render", &target) {
            error!("grid render failed: {:?}", err);
        }
    }

    fn force_render(&mut self) {
        let Some(instance) = &self.instance else {
            return;
        };
        let result = call1(instance, "updateConfig", &js_sys::Object::new())
            .and_then(|grid| call0(&grid, "forceRender"));
        if let Err(err) = result {
            error!("grid relayout failed: {:?}", err);
        }
    }

    fn destroy(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        if method(&instance, "destroy").is_ok() {
            call0(&instance, "destroy").ok();
        }
    }
}
