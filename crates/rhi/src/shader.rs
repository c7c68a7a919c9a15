//! SPIR-V shader modules.
//!
//! GLSL sources under `shaders/` are compiled ahead of time with `glslc`; this
//! module only loads the resulting `.spv` words. Every stage enters at `main`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), meshview_rhi::RhiError> {
//! let vs = Shader::load(device, Path::new("shaders/spirv/mesh.vert.spv"), ShaderStage::Vertex)?;
//! let _info = vs.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

pub const ENTRY_POINT: &CStr = c"main";

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    /// Also called the pixel stage.
    Fragment,
}

impl ShaderStage {
    pub fn flags(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// A compiled shader module tagged with the stage it was loaded for.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl Shader {
    /// Reads a `.spv` file and creates a module from it.
    ///
    /// # Errors
    ///
    /// [`RhiError::ShaderFile`] if the file cannot be read, [`RhiError::Shader`]
    /// if it is not SPIR-V, or a Vulkan error from module creation.
    pub fn load(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| RhiError::ShaderFile {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded {} shader {:?} ({} bytes)", stage, path, bytes.len());
        Self::from_bytes(device, &bytes, stage)
    }

    /// # Errors
    ///
    /// [`RhiError::Shader`] if `bytes` is not SPIR-V, or a Vulkan error from
    /// module creation.
    pub fn from_bytes(device: Arc<Device>, bytes: &[u8], stage: ShaderStage) -> RhiResult<Self> {
        let words = spirv_words(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);

        // SAFETY: `words` starts with the SPIR-V magic and outlives the call.
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.flags())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        // SAFETY: Pipelines do not keep references to the module after creation.
        unsafe { self.device.handle().destroy_shader_module(self.module, None) };
    }
}

fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| RhiError::Shader(format!("Malformed SPIR-V ({} bytes): {e}", bytes.len())))?;

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(other) => Err(RhiError::Shader(format!("Bad SPIR-V magic {other:#010x}"))),
        None => Err(RhiError::Shader("Empty SPIR-V module".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_stage_flags() {
        assert_eq!(ShaderStage::Vertex.flags(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.flags(), vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_spirv_words_accepts_module() {
        let bytes = module_bytes(&[SPIRV_MAGIC, 0x0001_0300, 7]);
        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 0x0001_0300, 7]);
    }

    #[test]
    fn test_spirv_words_rejects_garbage() {
        assert!(matches!(spirv_words(&[]), Err(RhiError::Shader(_))));
        assert!(matches!(spirv_words(&[1, 2, 3]), Err(RhiError::Shader(_))));
        let glsl = b"#version 450\nvoid main() {}\n\0\0\0";
        assert!(matches!(spirv_words(&glsl[..28]), Err(RhiError::Shader(_))));
    }

    #[test]
    fn test_entry_point_is_main() {
        assert_eq!(ENTRY_POINT.to_str().unwrap(), "main");
    }
}
