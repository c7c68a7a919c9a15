//! Graphics context passed to the application.
//!
//! There is no global instance: the application owns one [`GraphicsEngine`]
//! and lends it out where rendering or asset loading is needed.

use tracing::info;

use meshview_core::RenderConfig;
use meshview_platform::Window;

use crate::error::RenderResult;
use crate::mesh_manager::MeshManager;
use crate::render_system::RenderSystem;
use crate::texture_manager::TextureManager;

pub struct GraphicsEngine {
    // Cached assets go before the render system that owns the device
    texture_manager: TextureManager,
    mesh_manager: MeshManager,
    render_system: RenderSystem,
}

impl GraphicsEngine {
    /// # Errors
    ///
    /// Returns an error if the render system cannot be initialized.
    pub fn new(window: &Window, config: &RenderConfig) -> RenderResult<Self> {
        let render_system = RenderSystem::new(window, config)?;
        let device = render_system.device().clone();
        info!("Graphics engine initialized");
        Ok(Self {
            texture_manager: TextureManager::new(device.clone()),
            mesh_manager: MeshManager::new(device),
            render_system,
        })
    }

    pub fn render_system(&self) -> &RenderSystem {
        &self.render_system
    }

    pub fn render_system_mut(&mut self) -> &mut RenderSystem {
        &mut self.render_system
    }

    pub fn texture_manager(&mut self) -> &mut TextureManager {
        &mut self.texture_manager
    }

    pub fn mesh_manager(&mut self) -> &mut MeshManager {
        &mut self.mesh_manager
    }
}
