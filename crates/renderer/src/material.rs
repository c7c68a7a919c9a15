//! Pipelines as drawable materials.

use ash::vk;

use meshview_rhi::pipeline::Pipeline;

/// Which faces the rasterizer discards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterizerState {
    /// Cull back faces; closed meshes seen from outside.
    CullBack,
    /// Cull front faces; geometry seen from inside, such as the skybox.
    CullFront,
}

impl RasterizerState {
    pub fn cull_mode(self) -> vk::CullModeFlags {
        match self {
            RasterizerState::CullBack => vk::CullModeFlags::BACK,
            RasterizerState::CullFront => vk::CullModeFlags::FRONT,
        }
    }

    /// Inside-out geometry passes the depth test on equality so a skybox
    /// pushed to the far plane still draws.
    pub fn depth_compare_op(self) -> vk::CompareOp {
        match self {
            RasterizerState::CullBack => vk::CompareOp::LESS,
            RasterizerState::CullFront => vk::CompareOp::LESS_OR_EQUAL,
        }
    }
}

/// A graphics pipeline built from a vertex and pixel shader pair.
pub struct Material {
    pipeline: Pipeline,
    rasterizer_state: RasterizerState,
}

impl Material {
    pub(crate) fn new(pipeline: Pipeline, rasterizer_state: RasterizerState) -> Self {
        Self {
            pipeline,
            rasterizer_state,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.rasterizer_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterizer_state_cull_modes() {
        assert_eq!(RasterizerState::CullBack.cull_mode(), vk::CullModeFlags::BACK);
        assert_eq!(RasterizerState::CullFront.cull_mode(), vk::CullModeFlags::FRONT);
    }

    #[test]
    fn test_rasterizer_state_depth_compare() {
        assert_eq!(RasterizerState::CullBack.depth_compare_op(), vk::CompareOp::LESS);
        assert_eq!(
            RasterizerState::CullFront.depth_compare_op(),
            vk::CompareOp::LESS_OR_EQUAL
        );
    }
}
