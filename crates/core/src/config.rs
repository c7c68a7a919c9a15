//! Application configuration loaded from TOML.
//!
//! Every field has a default, so an empty or partial file is valid:
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//!
//! [render]
//! vsync = false
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{Error, Result};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "MESHVIEW_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "meshview.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub skybox: SkyboxConfig,
    pub assets: AssetConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "meshview".to_string(),
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Present synchronized to vertical blank.
    pub vsync: bool,
    /// Enable `VK_LAYER_KHRONOS_validation` and the debug messenger.
    pub validation: bool,
    /// Render target clear colour (RGBA).
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.3, 0.4, 1.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub start_position: [f32; 3],
    /// Distance moved along the view direction per frame while a move key is held.
    pub forward_step: f32,
    /// Distance moved sideways per frame while a strafe key is held.
    pub strafe_step: f32,
    /// Radians per pixel-second of cursor offset from the window centre.
    pub mouse_sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y: 1.57,
            near: 0.1,
            far: 100.0,
            start_position: [0.0, 0.0, -1.0],
            forward_step: 0.05,
            strafe_step: 0.1,
            mouse_sensitivity: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LightConfig {
    /// Radians per second around the Y axis.
    pub rotation_speed: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 0.707,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SkyboxConfig {
    pub scale: f32,
}

impl Default for SkyboxConfig {
    fn default() -> Self {
        Self { scale: 100.0 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AssetConfig {
    pub model_texture: PathBuf,
    pub sky_texture: PathBuf,
    pub model_mesh: PathBuf,
    /// Draw the built-in cube instead of `model_mesh`.
    pub use_builtin_cube: bool,
    pub sky_mesh: PathBuf,
    /// Directory holding the compiled `.spv` shaders.
    pub shader_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_texture: PathBuf::from("assets/textures/brick.png"),
            sky_texture: PathBuf::from("assets/textures/sky.jpg"),
            model_mesh: PathBuf::from("assets/meshes/suzanne.obj"),
            use_builtin_cube: false,
            sky_mesh: PathBuf::from("assets/meshes/sphere.obj"),
            shader_dir: PathBuf::from("shaders/spirv"),
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Config path from [`CONFIG_ENV_VAR`], else [`DEFAULT_CONFIG_FILE`].
    pub fn config_path() -> PathBuf {
        config_path_from(std::env::var_os(CONFIG_ENV_VAR))
    }

    fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config("window size must be non-zero".to_string()));
        }
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(Error::Config(format!(
                "invalid clip planes: near {} far {}",
                camera.near, camera.far
            )));
        }
        if !(camera.fov_y > 0.0 && camera.fov_y < std::f32::consts::PI) {
            return Err(Error::Config(format!("invalid fov_y {}", camera.fov_y)));
        }
        Ok(())
    }
}

/// An empty override counts as unset.
fn config_path_from(env_value: Option<OsString>) -> PathBuf {
    env_value
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}
