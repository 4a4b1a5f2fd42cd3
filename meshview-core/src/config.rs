/// Call-site configuration for a preview session.
///
/// Everything here deserializes from JSON so that page scripts and the
/// terminal binary can hand the same document to [`crate::session::start`].
/// Omitted fields fall back to the stock preview preset: a 75 degree camera
/// at `(2, 2, 2)`, damped orbit controls and a white background.
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transform::{EulerAngles, Transform};

/// Restricts orbit input to one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisLock {
    /// Polar angle fixed at the horizon; only azimuth changes
    Horizontal,
    /// Azimuth fixed at zero; only elevation changes
    Vertical,
}

/// Explicit camera placement. Unset fields keep the camera defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    pub position: Option<[f32; 3]>,
    pub target: Option<[f32; 3]>,
    /// Vertical field of view in degrees
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDefaults {
    pub position: [f32; 3],
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            position: [2.0, 2.0, 2.0],
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    /// Full orbit takes `30 / speed` seconds
    pub auto_rotate_speed: f32,
    pub axis_lock: Option<AxisLock>,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping: true,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            axis_lock: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapping {
    None,
    Linear,
    AcesFilmic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Linear,
    Srgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub antialias: bool,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub color_space: ColorSpace,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            antialias: false,
            tone_mapping: ToneMapping::None,
            exposure: 1.0,
            color_space: ColorSpace::Srgb,
        }
    }
}

/// Equirectangular HDR image used as background and ambient light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSource {
    /// Directory prefix, joined with `file`
    pub path: String,
    pub file: String,
}

impl EnvironmentSource {
    pub fn url(&self) -> String {
        if self.path.is_empty() || self.path.ends_with('/') {
            format!("{}{}", self.path, self.file)
        } else {
            format!("{}/{}", self.path, self.file)
        }
    }
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Immutable input of one preview session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub container_id: String,
    /// Requested surface height in CSS pixels
    pub height: f32,
    pub asset_path: String,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    /// Radians, applied in X, Y, Z order
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default)]
    pub show_axes: bool,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub camera: Option<CameraPose>,
    #[serde(default)]
    pub use_embedded_camera: bool,
    #[serde(default)]
    pub camera_defaults: CameraDefaults,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub renderer: RendererSettings,
    #[serde(default)]
    pub environment: Option<EnvironmentSource>,
}

impl SceneConfig {
    pub fn new(container_id: impl Into<String>, height: f32, asset_path: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            height,
            asset_path: asset_path.into(),
            position: [0.0; 3],
            scale: default_scale(),
            rotation: [0.0; 3],
            show_axes: false,
            subtitle: None,
            camera: None,
            use_embedded_camera: false,
            camera_defaults: CameraDefaults::default(),
            controls: ControlsConfig::default(),
            renderer: RendererSettings::default(),
            environment: None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_id.is_empty() {
            return Err(ConfigError::Invalid("container_id is empty".to_string()));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "height must be positive, got {}",
                self.height
            )));
        }
        if self.asset_path.is_empty() {
            return Err(ConfigError::Invalid("asset_path is empty".to_string()));
        }
        let defaults = &self.camera_defaults;
        if !(defaults.near > 0.0 && defaults.far > defaults.near) {
            return Err(ConfigError::Invalid(format!(
                "camera range {}..{} is empty",
                defaults.near, defaults.far
            )));
        }
        Ok(())
    }

    /// Transform applied to the loaded model's root
    pub fn model_transform(&self) -> Transform {
        Transform::from_parts(self.position, self.scale, EulerAngles::from(self.rotation))
    }
}
