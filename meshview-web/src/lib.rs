/// meshview web - browser bindings for the preview session and the table
///
/// Rendering goes through the core software rasterizer onto a 2D canvas.
/// Assets are fetched over HTTP, and tables mount into the container's
/// shadow root with Grid.js supplied by the page.
use std::rc::Rc;

use log::{error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use meshview_core::{start, ReactiveTable, SceneConfig, SessionError, SessionHandle};

mod canvas;
mod fetch;
mod grid;
mod host;
mod table_host;

pub use canvas::CanvasRenderer;
pub use fetch::FetchLoader;
pub use grid::{GridJs, GridJsFactory};
pub use host::WebHost;
pub use table_host::WebTableHost;

#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    Ok(())
}

/// A running preview. Stopping it removes the canvas and its listeners.
#[wasm_bindgen]
pub struct PreviewSession {
    handle: SessionHandle,
}

#[wasm_bindgen]
impl PreviewSession {
    pub fn stop(&mut self) {
        self.handle.stop();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn frames(&self) -> f64 {
        self.handle.frames() as f64
    }

    pub fn fps(&self) -> f32 {
        self.handle.fps()
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> usize {
        self.handle.node_count()
    }
}

/// Start a preview from a JSON scene config.
///
/// Resolves to `undefined` when the container is not on the page.
#[wasm_bindgen(js_name = startPreview)]
pub fn start_preview(config_json: &str) -> Result<Option<PreviewSession>, JsValue> {
    let config = SceneConfig::from_json(config_json).map_err(|err| JsValue::from_str(&err.to_string()))?;
    let host = WebHost::new()?;
    match start(config, &host, &FetchLoader::new()) {
        Ok(handle) => {
            info!("preview started in '{}'", handle.container_id());
            Ok(Some(PreviewSession { handle }))
        }
        Err(SessionError::MissingContainer(_)) => Ok(None),
        Err(err) => Err(JsValue::from_str(&err.to_string())),
    }
}

/// Reactive table bound to one element. The page forwards lifecycle and
/// attribute callbacks from its custom element.
#[wasm_bindgen]
pub struct TableComponent {
    table: Rc<ReactiveTable>,
}

#[wasm_bindgen]
impl TableComponent {
    /// Uses `window.gridjs` immediately when the page already loaded it
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str) -> Result<TableComponent, JsValue> {
        let host = WebTableHost::new()?;
        let table = Rc::new(ReactiveTable::new(container_id, Rc::new(host)));
        if let Some(factory) = GridJsFactory::from_window() {
            table.grid_ready(Rc::new(factory));
        }
        Ok(TableComponent { table })
    }

    pub fn connect(&self) {
        self.table.connect();
    }

    pub fn disconnect(&self) {
        self.table.disconnect();
    }

    pub fn render(&self) {
        self.table.render();
    }

    #[wasm_bindgen(js_name = setVariant)]
    pub fn set_variant(&self, name: &str) {
        self.table.set_variant(name);
    }

    #[wasm_bindgen(js_name = setSubtitle)]
    pub fn set_subtitle(&self, subtitle: Option<String>) {
        self.table.set_subtitle(subtitle.as_deref());
    }

    #[wasm_bindgen(js_name = attributeChanged)]
    pub fn attribute_changed(&self, name: &str, value: Option<String>) {
        self.table.attribute_changed(name, value.as_deref());
    }

    /// Supply the Grid.js namespace directly
    #[wasm_bindgen(js_name = gridReady)]
    pub fn grid_ready(&self, namespace: JsValue) {
        self.table.grid_ready(Rc::new(GridJsFactory::new(namespace)));
    }

    /// Wait for a promise resolving to the Grid.js namespace
    #[wasm_bindgen(js_name = whenGridReady)]
    pub fn when_grid_ready(&self, promise: js_sys::Promise) {
        let table = Rc::clone(&self.table);
        spawn_local(async move {
            match JsFuture::from(promise).await {
                Ok(namespace) => table.grid_ready(Rc::new(GridJsFactory::new(namespace))),
                Err(err) => error!("grid library failed to load: {:?}", err),
            }
        });
    }
}
