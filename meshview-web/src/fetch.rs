/// `fetch`-backed asset loader
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{ReadableStream, ReadableStreamDefaultReader, Response};

use meshview_core::environment::EnvironmentMap;
use meshview_core::gltf_import::PendingGltf;
use meshview_core::loader::{
    decode_asset, resolve_relative, AssetCallback, AssetFormat, EnvironmentCallback, LoadProgress,
    MeshLoader, ProgressCallback,
};
use meshview_core::{Asset, LoadError};

fn fetch_error(path: &str, err: JsValue) -> LoadError {
    LoadError::Fetch {
        path: path.to_string(),
        reason: err.as_string().unwrap_or_else(|| format!("{:?}", err)),
    }
}

async fn read_stream(
    stream: ReadableStream,
    total: Option<u64>,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> Result<Vec<u8>, JsValue> {
    let reader: ReadableStreamDefaultReader = stream.get_reader().dyn_into()?;

    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    loop {
        let result = JsFuture::from(reader.read()).await?;
        let done = Reflect::get(&result, &JsValue::from_str("done"))?
            .as_bool()
            .unwrap_or(false);
        if done {
            break;
        }
        let value = Reflect::get(&result, &JsValue::from_str("value"))?;
        if value.is_undefined() || value.is_null() {
            continue;
        }
        let chunk = Uint8Array::new(&value);
        let start = bytes.len();
        bytes.resize(start + chunk.length() as usize, 0);
        chunk.copy_to(&mut bytes[start..]);
        on_progress(LoadProgress {
            loaded: bytes.len() as u64,
            total,
        });
    }
    Ok(bytes)
}

/// Fetch `url`, reporting progress per received chunk
async fn fetch_bytes(url: &str, on_progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>, LoadError> {
    let window = web_sys::window().ok_or_else(|| fetch_error(url, JsValue::from_str("no window")))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .and_then(|value| value.dyn_into())
        .map_err(|err| fetch_error(url, err))?;

    if !response.ok() {
        return Err(LoadError::Fetch {
            path: url.to_string(),
            reason: format!("status {}", response.status()),
        });
    }

    let total = response
        .headers()
        .get("content-length")
        .ok()
        .flatten()
        .and_then(|length| length.parse::<u64>().ok());

    if let Some(body) = response.body() {
        return read_stream(body, total, on_progress)
            .await
            .map_err(|err| fetch_error(url, err));
    }

    let buffer = response
        .array_buffer()
        .map_err(|err| fetch_error(url, err))?;
    let buffer = JsFuture::from(buffer)
        .await
        .map_err(|err| fetch_error(url, err))?;
    let bytes = Uint8Array::new(&buffer).to_vec();
    on_progress(LoadProgress {
        loaded: bytes.len() as u64,
        total: Some(bytes.len() as u64),
    });
    Ok(bytes)
}

async fn fetch_asset(path: String, mut on_progress: ProgressCallback) -> Result<Asset, LoadError> {
    let bytes = fetch_bytes(&path, &mut *on_progress).await?;
    if AssetFormat::from_path(&path) != Some(AssetFormat::Gltf) {
        return decode_asset(&path, &bytes);
    }

    let pending = PendingGltf::parse(&bytes)?;
    let mut buffers = Vec::new();
    for uri in pending.buffer_uris() {
        let url = resolve_relative(&path, &uri);
        buffers.push(fetch_bytes(&url, &mut |_| {}).await?);
    }
    pending.finish(buffers)
}

/// Loads over HTTP. Completion is always reported from a later task.
#[derive(Debug, Clone, Default)]
pub struct FetchLoader;

impl FetchLoader {
    pub fn new() -> Self {
        Self
    }
}

impl MeshLoader for FetchLoader {
    fn load(&self, path: &str, on_progress: ProgressCallback, on_done: AssetCallback) {
        let path = path.to_string();
        spawn_local(async move {
            on_done(fetch_asset(path, on_progress).await);
        });
    }

    fn load_environment(&self, url: &str, on_done: EnvironmentCallback) {
        let url = url.to_string();
        spawn_local(async move {
            let result = fetch_bytes(&url, &mut |_| {})
                .await
                .and_then(|bytes| EnvironmentMap::from_hdr_bytes(&bytes));
            on_done(result);
        });
    }
}
