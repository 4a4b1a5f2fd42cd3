/// Asset loading seam between a render session and the storage behind it
use std::fs;
use std::path::Path;

use crate::environment::EnvironmentMap;
use crate::error::LoadError;
use crate::gltf_import;
use crate::scene::{Asset, Material, Model};
use crate::stl;

/// Bytes received so far; `total` is unknown for chunked transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.loaded as f64 / total as f64),
            _ => None,
        }
    }
}

pub type ProgressCallback = Box<dyn FnMut(LoadProgress)>;
pub type AssetCallback = Box<dyn FnOnce(Result<Asset, LoadError>)>;
pub type EnvironmentCallback = Box<dyn FnOnce(Result<EnvironmentMap, LoadError>)>;

/// Fetches and decodes assets. Implementations may call back synchronously
/// from inside `load` or later from the host's event loop.
pub trait MeshLoader {
    fn load(&self, path: &str, on_progress: ProgressCallback, on_done: AssetCallback);

    fn load_environment(&self, url: &str, on_done: EnvironmentCallback) {
        on_done(Err(LoadError::UnsupportedFormat(url.to_string())));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    /// Geometry only
    Stl,
    /// JSON document, buffers embedded or alongside
    Gltf,
    /// Binary glTF container
    Glb,
}

impl AssetFormat {
    /// Format from the path's extension, ignoring any query or fragment
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, extension) = file.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "stl" => Some(AssetFormat::Stl),
            "gltf" => Some(AssetFormat::Gltf),
            "glb" => Some(AssetFormat::Glb),
            _ => None,
        }
    }
}

/// Decode a self-contained asset from memory
pub fn decode_asset(path: &str, bytes: &[u8]) -> Result<Asset, LoadError> {
    match AssetFormat::from_path(path) {
        Some(AssetFormat::Stl) => {
            let mesh = stl::parse_stl(bytes)?;
            if mesh.is_empty() {
                return Err(LoadError::Empty);
            }
            Ok(Asset::from_model(Model::from_mesh(mesh, Material::default())))
        }
        Some(AssetFormat::Gltf) | Some(AssetFormat::Glb) => gltf_import::import_slice(bytes),
        None => Err(LoadError::UnsupportedFormat(path.to_string())),
    }
}

/// Resolve `uri` against the directory of `base`. Absolute URLs, rooted
/// paths and data URIs are returned unchanged.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    if uri.contains("://") || uri.starts_with('/') || uri.starts_with("data:") {
        return uri.to_string();
    }
    let base = base.split(['?', '#']).next().unwrap_or(base);
    match base.rfind('/') {
        Some(slash) => format!("{}{}", &base[..=slash], uri),
        None => uri.to_string(),
    }
}

/// Loads from the local file system. Completion is reported before `load`
/// returns.
#[derive(Debug, Clone, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }

    fn read(path: &str) -> Result<Vec<u8>, LoadError> {
        fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn load_asset(path: &str, on_progress: &mut ProgressCallback) -> Result<Asset, LoadError> {
        match AssetFormat::from_path(path) {
            Some(AssetFormat::Gltf) => {
                let size = fs::metadata(path)
                    .map_err(|source| LoadError::Io {
                        path: path.to_string(),
                        source,
                    })?
                    .len();
                let asset = gltf_import::import_file(Path::new(path))?;
                on_progress(LoadProgress {
                    loaded: size,
                    total: Some(size),
                });
                Ok(asset)
            }
            Some(_) => {
                let bytes = Self::read(path)?;
                let size = bytes.len() as u64;
                on_progress(LoadProgress {
                    loaded: size,
                    total: Some(size),
                });
                decode_asset(path, &bytes)
            }
            None => Err(LoadError::UnsupportedFormat(path.to_string())),
        }
    }
}

impl MeshLoader for FileLoader {
    fn load(&self, path: &str, mut on_progress: ProgressCallback, on_done: AssetCallback) {
        on_done(Self::load_asset(path, &mut on_progress));
    }

    fn load_environment(&self, url: &str, on_done: EnvironmentCallback) {
        on_done(Self::read(url).and_then(|bytes| EnvironmentMap::from_hdr_bytes(&bytes)));
    }
}
