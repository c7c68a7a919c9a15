//! Error type for the rendering layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("GPU error: {0}")]
    Rhi(#[from] meshview_rhi::RhiError),

    #[error("Resource error: {0}")]
    Resource(#[from] meshview_resources::ResourceError),

    #[error("Platform error: {0}")]
    Platform(#[from] meshview_core::Error),

    /// More resource bindings were requested than the descriptor pool holds.
    #[error("Resource binding limit of {0} reached")]
    BindingLimit(u32),
}

pub type RenderResult<T> = Result<T, RenderError>;
