/// meshview core library - host-independent preview and table logic
///
/// Provides mesh and scene decoding (STL, glTF, HDR environments), the
/// orbit camera, a software rasterizer, and the two page components built
/// on them: the render session and the reactive table. Hosts supply the
/// page environment through the [`session::Host`] and [`table::TableHost`]
/// traits.

pub mod animation;
pub mod config;
pub mod controls;
pub mod environment;
pub mod error;
pub mod geometry;
pub mod gltf_import;
pub mod layout;
pub mod loader;
pub mod projection;
pub mod raster;
pub mod render;
pub mod scene;
pub mod session;
pub mod stl;
pub mod subscription;
pub mod table;
pub mod transform;

// Re-export commonly used types
pub use config::{AxisLock, CameraPose, SceneConfig};
pub use controls::OrbitControls;
pub use error::{ConfigError, LoadError, SessionError};
pub use geometry::{BoundingBox, Mesh, Triangle, Vertex};
pub use layout::SurfaceSize;
pub use loader::{FileLoader, MeshLoader};
pub use projection::{Camera, ProjectionMode};
pub use render::{PixelEncoder, Renderer};
pub use scene::{Asset, Scene};
pub use session::{start, Host, PointerInput, ResizeEvent, SessionHandle};
pub use subscription::Subscription;
pub use table::{GridConfig, GridFactory, GridRenderer, ReactiveTable, TableHost, Variant};
pub use transform::{EulerAngles, Transform};
