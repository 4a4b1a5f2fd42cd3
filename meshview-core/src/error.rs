/// Error types shared by the loaders, the render session and configuration
use thiserror::Error;

/// Failure while fetching or decoding an asset
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("unsupported asset format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid STL data: {0}")]
    Stl(String),

    #[error("invalid glTF data: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("glTF buffer {0} is missing")]
    MissingBuffer(usize),

    #[error("invalid environment image: {0}")]
    Image(#[from] image::ImageError),

    #[error("asset contains no renderable geometry")]
    Empty,
}

/// Failure while setting up a render session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("container '{0}' does not exist")]
    MissingContainer(String),

    #[error("failed to create output surface: {0}")]
    Surface(String),
}

/// Failure while reading a configuration document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
