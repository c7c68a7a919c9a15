//! Physical device (GPU) selection.
//!
//! A device qualifies when it has a graphics queue, can present to the window
//! surface, supports Vulkan 1.3 with the required device extensions, and offers
//! anisotropic sampling. Among qualifying devices, discrete GPUs win, then VRAM.

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::DEVICE_EXTENSIONS;
use crate::error::RhiError;

/// Queue family indices used by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family that supports graphics (and therefore transfer) operations.
    pub graphics_family: Option<u32>,
    /// Family that can present to the window surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Unique family indices, for creating one queue per family.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Information about a selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("unknown device")
    }

    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }

    /// Maximum sampler anisotropy the device supports.
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Picks the highest-rated device that can render to `surface`.
///
/// # Errors
///
/// [`RhiError::NoSuitableGpu`] if no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    // SAFETY: `instance` is live.
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("{} Vulkan device(s) present", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;
    for device in devices {
        let info = match inspect_device(instance, device, surface, surface_loader) {
            Ok(info) => info,
            Err((name, reason)) => {
                debug!("Skipping '{}': {}", name, reason);
                continue;
            }
        };
        let score = rate_device(info.properties.device_type, info.device_local_memory());
        debug!("'{}' ({}) scores {}", info.device_name(), info.device_type_name(), score);
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((info, score));
        }
    }

    let Some((selected, _)) = best else {
        warn!("No GPU offers graphics, presentation, anisotropy and Vulkan 1.3");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Using '{}' ({}, Vulkan {}.{}.{})",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch
    );
    Ok(selected)
}

/// Gathers the device's properties, or names why it cannot be used.
fn inspect_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, (String, &'static str)> {
    // SAFETY: `device` was enumerated from `instance`.
    let (properties, features, memory_properties) = unsafe {
        (
            instance.get_physical_device_properties(device),
            instance.get_physical_device_features(device),
            instance.get_physical_device_memory_properties(device),
        )
    };
    let info = PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families: find_queue_families(instance, device, surface, surface_loader),
    };
    let reject = |reason| Err((info.device_name().to_owned(), reason));

    if !info.queue_families.is_complete() {
        return reject("no graphics or present queue family");
    }
    if features.sampler_anisotropy == vk::FALSE {
        return reject("no sampler anisotropy");
    }
    // Dynamic rendering is core in 1.3.
    if !supports_api_1_3(properties.api_version) {
        return reject("Vulkan 1.3 unsupported");
    }
    if !supports_device_extensions(instance, device) {
        return reject("missing swapchain or dynamic rendering extension");
    }
    Ok(info)
}

pub(crate) fn supports_device_extensions(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    // SAFETY: `device` was enumerated from `instance`.
    let Ok(available) = (unsafe { instance.enumerate_device_extension_properties(device) }) else {
        return false;
    };

    DEVICE_EXTENSIONS.iter().all(|required| {
        available
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *required))
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    // SAFETY: `device` was enumerated from `instance`.
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let capabilities: Vec<(vk::QueueFamilyProperties, bool)> = families
        .into_iter()
        .enumerate()
        .map(|(i, family)| {
            // SAFETY: `i` is a valid queue family index for `device`.
            let present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i as u32, surface)
                    .unwrap_or(false)
            };
            (family, present)
        })
        .collect();

    pick_queue_families(&capabilities)
}

/// Chooses graphics and present families, preferring one family that does both.
fn pick_queue_families(families: &[(vk::QueueFamilyProperties, bool)]) -> QueueFamilyIndices {
    let usable = || {
        families
            .iter()
            .enumerate()
            .filter(|(_, (family, _))| family.queue_count > 0)
    };
    let is_graphics =
        |family: &vk::QueueFamilyProperties| family.queue_flags.contains(vk::QueueFlags::GRAPHICS);

    if let Some((i, _)) = usable().find(|(_, (family, present))| is_graphics(family) && *present) {
        return QueueFamilyIndices {
            graphics_family: Some(i as u32),
            present_family: Some(i as u32),
        };
    }

    QueueFamilyIndices {
        graphics_family: usable()
            .find(|(_, (family, _))| is_graphics(family))
            .map(|(i, _)| i as u32),
        present_family: usable()
            .find(|(_, (_, present))| *present)
            .map(|(i, _)| i as u32),
    }
}

fn supports_api_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

/// Higher is better: device type dominates, VRAM breaks ties.
fn rate_device(device_type: vk::PhysicalDeviceType, device_local_memory: u64) -> u32 {
    let type_score = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 100,
        _ => 1,
    };
    let vram_mb = (device_local_memory / (1024 * 1024)).min(16_000) as u32;
    type_score + vram_mb
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_pick_prefers_shared_family() {
        let families = [
            (family(vk::QueueFlags::GRAPHICS, 1), false),
            (family(vk::QueueFlags::TRANSFER, 1), true),
            (family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1), true),
        ];
        let indices = pick_queue_families(&families);
        assert_eq!(indices.graphics_family, Some(2));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn test_pick_split_families() {
        let families = [
            (family(vk::QueueFlags::GRAPHICS, 1), false),
            (family(vk::QueueFlags::TRANSFER, 1), true),
        ];
        let indices = pick_queue_families(&families);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn test_pick_skips_empty_families() {
        let families = [
            (family(vk::QueueFlags::GRAPHICS, 0), true),
            (family(vk::QueueFlags::COMPUTE, 1), false),
        ];
        let indices = pick_queue_families(&families);
        assert!(!indices.is_complete());
        assert_eq!(indices.graphics_family, None);
    }

    #[test]
    fn test_supports_api_1_3() {
        assert!(supports_api_1_3(vk::API_VERSION_1_3));
        assert!(supports_api_1_3(vk::make_api_version(0, 1, 4, 0)));
        assert!(!supports_api_1_3(vk::API_VERSION_1_2));
    }

    #[test]
    fn test_rate_device_prefers_discrete() {
        let gib = 1024 * 1024 * 1024;
        let discrete = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 2 * gib);
        let integrated = rate_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 16 * gib);
        assert!(discrete > integrated);
        assert!(
            rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 8 * gib)
                > rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 4 * gib)
        );
    }

    #[test]
    fn test_device_type_name() {
        assert_eq!(
            device_type_name(vk::PhysicalDeviceType::DISCRETE_GPU),
            "Discrete GPU"
        );
        assert_eq!(device_type_name(vk::PhysicalDeviceType::OTHER), "Other");
    }
}
