//! VkInstance creation.
//!
//! With validation requested and `VK_LAYER_KHRONOS_validation` installed, a
//! debug messenger routes warnings and errors from the layer into `tracing`.
//!
//! ```no_run
//! use meshview_rhi::instance::Instance;
//!
//! # fn example() -> Result<(), meshview_rhi::RhiError> {
//! // Surface extensions normally come from the window.
//! let instance = Instance::new(&[], cfg!(debug_assertions))?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{Level, debug, error, info, warn};

use crate::error::RhiResult;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
}

impl Instance {
    /// Creates a Vulkan 1.3 instance with `surface_extensions` enabled.
    ///
    /// A missing validation layer is logged and skipped rather than treated as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the loader cannot be opened or instance or
    /// messenger creation fails.
    pub fn new(surface_extensions: &[*const c_char], enable_validation: bool) -> RhiResult<Self> {
        // SAFETY: Opening the system loader has no preconditions on our side.
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && has_layer(&entry, VALIDATION_LAYER)?;
        if enable_validation && !validation {
            warn!("{:?} requested but not installed", VALIDATION_LAYER);
        }

        let version = vk::make_api_version(0, 0, 1, 0);
        let app_info = vk::ApplicationInfo::default()
            .application_name(c"meshview")
            .application_version(version)
            .engine_name(c"meshview")
            .engine_version(version)
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = surface_extensions.to_vec();
        let mut layers = Vec::new();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: Every extension and layer pointer refers to a static C string
        // that outlives the call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if validation {
            match create_messenger(&entry, &instance) {
                Ok(debug) => Some(debug),
                Err(e) => {
                    // SAFETY: Nothing has been created from the instance yet.
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let validation_state = if debug.is_some() { "on" } else { "off" };
        info!("Vulkan 1.3 instance ready (validation {})", validation_state);

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: Every object created from the instance is gone by now; the
        // messenger goes first since it was created from the instance.
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("Vulkan instance destroyed");
    }
}

fn has_layer(entry: &Entry, name: &CStr) -> RhiResult<bool> {
    // SAFETY: Enumeration only reads loader state.
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|n| n == name)))
}

fn create_messenger(entry: &Entry, instance: &ash::Instance) -> RhiResult<DebugMessenger> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback));

    // SAFETY: The callback is a plain function with no user data.
    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
    Ok(DebugMessenger { loader, messenger })
}

fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::INFO
    } else {
        Level::DEBUG
    }
}

/// # Safety
///
/// Called by the loader with `data` valid for the duration of the call.
unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: `data` is null or valid per the loader contract.
    let message = match unsafe { data.as_ref() } {
        Some(data) if !data.p_message.is_null() => {
            // SAFETY: `p_message` is a NUL-terminated string owned by the loader.
            unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
        }
        _ => Cow::Borrowed("<no message>"),
    };

    let level = severity_level(severity);
    if level == Level::ERROR {
        error!(?kind, "{message}");
    } else if level == Level::WARN {
        warn!(?kind, "{message}");
    } else if level == Level::INFO {
        info!(?kind, "{message}");
    } else {
        debug!(?kind, "{message}");
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_level_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(severity_level(S::ERROR), Level::ERROR);
        assert_eq!(severity_level(S::WARNING), Level::WARN);
        assert_eq!(severity_level(S::INFO), Level::INFO);
        assert_eq!(severity_level(S::VERBOSE), Level::DEBUG);
        assert_eq!(severity_level(S::WARNING | S::ERROR), Level::ERROR);
    }

    #[test]
    fn test_instance_without_validation() {
        // Needs a Vulkan loader; skipped otherwise.
        match Instance::new(&[], false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(e) => eprintln!("Skipping test: Vulkan not available ({e})"),
        }
    }
}
