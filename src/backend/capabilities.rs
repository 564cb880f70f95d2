// Capability queries
//
// What the host and each GPU offer: instance/device extensions, queue
// families, surface formats, present modes and capabilities. Nothing here
// is cached - capabilities depend on the surface and are re-queried each
// time a decision is made.

use ash::vk;
use std::ffi::CStr;

use super::Driver;
use crate::error::{InitError, InitResult};

/// Device extensions every candidate GPU must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family slots; `None` means "not found yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub presentation: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_valid(&self) -> bool {
        self.graphics.is_some() && self.presentation.is_some()
    }

    /// (graphics, presentation) once both are known.
    pub fn resolve(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.presentation?))
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        for family in [self.graphics, self.presentation].into_iter().flatten() {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    /// Both roles live in the same family.
    pub fn is_shared(&self) -> bool {
        self.is_valid() && self.graphics == self.presentation
    }
}

/// Surface capabilities, formats and present modes of one (GPU, surface) pair.
#[derive(Debug, Clone, Default)]
pub struct SwapChainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Read-only snapshot of a candidate GPU.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub extensions_supported: bool,
    pub queue_families: QueueFamilyIndices,
    /// Only queried when the device extensions are supported.
    pub swap_chain: Option<SwapChainSupport>,
}

impl PhysicalDeviceInfo {
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_valid()
            && self.extensions_supported
            && self.swap_chain.as_ref().is_some_and(SwapChainSupport::is_adequate)
    }
}

pub fn instance_extensions(driver: &dyn Driver) -> InitResult<Vec<String>> {
    let extensions = driver
        .instance_extensions()
        .map_err(InitError::query("instance extensions"))?;
    log::debug!("{} instance extensions available", extensions.len());
    Ok(extensions)
}

/// Required names absent from `available` (exact match), in request order.
pub fn missing_extensions(available: &[String], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect()
}

pub fn has_all_instance_extensions(available: &[String], required: &[String]) -> bool {
    missing_extensions(available, required).is_empty()
}

pub fn device_extensions(driver: &dyn Driver, gpu: vk::PhysicalDevice) -> InitResult<Vec<String>> {
    driver
        .device_extensions(gpu)
        .map_err(InitError::query("device extensions"))
}

/// A GPU reporting no extensions at all counts as unsupported.
pub fn supports_device_extensions(available: &[String]) -> bool {
    if available.is_empty() {
        return false;
    }
    REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .all(|required| available.iter().any(|name| name.as_bytes() == required.to_bytes()))
}

/// First-fit scan of the queue family table.
pub fn queue_families(
    driver: &dyn Driver,
    gpu: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> InitResult<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in driver.queue_family_properties(gpu).iter().enumerate() {
        let index = index as u32;
        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if indices.presentation.is_none()
            && driver
                .surface_support(gpu, index, surface)
                .map_err(InitError::query("surface support"))?
        {
            indices.presentation = Some(index);
        }

        if indices.is_valid() {
            break;
        }
    }

    Ok(indices)
}

pub fn swap_chain_support(
    driver: &dyn Driver,
    gpu: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> InitResult<SwapChainSupport> {
    Ok(SwapChainSupport {
        capabilities: driver
            .surface_capabilities(gpu, surface)
            .map_err(InitError::query("surface capabilities"))?,
        formats: driver
            .surface_formats(gpu, surface)
            .map_err(InitError::query("surface formats"))?,
        present_modes: driver
            .surface_present_modes(gpu, surface)
            .map_err(InitError::query("present modes"))?,
    })
}

pub fn describe(
    driver: &dyn Driver,
    gpu: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> InitResult<PhysicalDeviceInfo> {
    let extensions_supported = supports_device_extensions(&device_extensions(driver, gpu)?);
    let swap_chain = if extensions_supported {
        Some(swap_chain_support(driver, gpu, surface)?)
    } else {
        None
    };

    Ok(PhysicalDeviceInfo {
        handle: gpu,
        name: driver.device_name(gpu),
        extensions_supported,
        queue_families: queue_families(driver, gpu, surface)?,
        swap_chain,
    })
}
