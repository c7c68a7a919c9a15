//! Pieces every meshview crate leans on: the window-level [`Error`], tracing
//! setup, the [`FrameTimer`] and the TOML [`AppConfig`].

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    AppConfig, AssetConfig, CameraConfig, LightConfig, RenderConfig, SkyboxConfig, WindowConfig,
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
