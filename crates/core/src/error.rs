//! Errors raised outside the GPU layer: windowing, surfaces and configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("window system: {0}")]
    Window(String),

    /// The window could not be turned into a Vulkan surface.
    #[error("surface creation: {0}")]
    Surface(String),

    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    ConfigSyntax(#[from] toml::de::Error),

    /// The config parsed but holds values the viewer cannot run with.
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
