//! Errors from reading meshes and images off disk.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("{} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot parse OBJ {}: {source}", path.display())]
    ObjLoad {
        path: PathBuf,
        source: tobj::LoadError,
    },

    /// The OBJ parsed but held no faces.
    #[error("{} has no geometry", .0.display())]
    NoMeshes(PathBuf),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
