//! Mesh cache keyed by file path, plus the built-in cube.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use meshview_resources::{MeshData, ResourceManager};
use meshview_rhi::device::Device;

use crate::error::{RenderError, RenderResult};
use crate::mesh::Mesh;

pub struct MeshManager {
    cache: ResourceManager<Mesh>,
    cube: Option<Arc<Mesh>>,
    device: Arc<Device>,
}

impl MeshManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            cache: ResourceManager::new(),
            cube: None,
            device,
        }
    }

    /// Loads the OBJ file at `path` into device buffers, or returns the mesh
    /// already loaded from that file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable or holds no
    /// triangles, or if the upload fails.
    pub fn create_mesh_from_file(&mut self, path: &Path) -> RenderResult<Arc<Mesh>> {
        let device = &self.device;
        self.cache
            .create_resource_from_file(path, |full_path| -> Result<Mesh, RenderError> {
                let data = MeshData::load_obj(full_path)?;
                let mesh = Mesh::upload(device.clone(), &data)?;
                info!(
                    "Mesh uploaded: {:?} ({} vertices, {} triangles)",
                    full_path,
                    data.vertex_count(),
                    data.triangle_count()
                );
                Ok(mesh)
            })
    }

    /// The unit cube, uploaded on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub fn create_cube(&mut self) -> RenderResult<Arc<Mesh>> {
        if let Some(cube) = &self.cube {
            return Ok(Arc::clone(cube));
        }
        let cube = Arc::new(Mesh::upload(self.device.clone(), &MeshData::cube())?);
        self.cube = Some(Arc::clone(&cube));
        Ok(cube)
    }

    /// Number of file-backed meshes currently cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
