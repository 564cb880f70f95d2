// Vulkan Device - GPU selection and the logical device
//
// Responsibilities:
// - Physical device selection (first suitable GPU in enumeration order)
// - Logical device creation with one queue per distinct family
// - Queue handle retrieval

use ash::vk;

use super::capabilities::{self, PhysicalDeviceInfo, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS};
use super::Driver;
use crate::error::{InitError, InitResult, Stage};

/// Logical device plus its two queue handles (equal when the families are).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalDevice {
    pub handle: vk::Device,
    pub graphics_family: u32,
    pub presentation_family: u32,
    pub graphics_queue: vk::Queue,
    pub presentation_queue: vk::Queue,
}

/// Returns the first GPU that can render to `surface`. No scoring: the
/// enumeration order decides.
pub fn pick_physical_device(driver: &dyn Driver, surface: vk::SurfaceKHR) -> InitResult<PhysicalDeviceInfo> {
    let devices = driver
        .physical_devices()
        .map_err(InitError::query("physical devices"))?;

    if devices.is_empty() {
        return Err(InitError::NoDevice);
    }
    log::debug!("{} GPU(s) found", devices.len());

    for device in devices {
        // A GPU whose capability queries fail is treated as unsuitable
        let info = match capabilities::describe(driver, device, surface) {
            Ok(info) => info,
            Err(e) => {
                log::debug!("Skipping GPU {}: {}", driver.device_name(device), e);
                continue;
            }
        };
        if info.is_suitable() {
            log::info!("Selected GPU: {}", info.name);
            return Ok(info);
        }
        log::debug!(
            "Skipping GPU {}: queues valid = {}, extensions = {}, swap chain = {}",
            info.name,
            info.queue_families.is_valid(),
            info.extensions_supported,
            info.swap_chain.as_ref().is_some_and(|s| s.is_adequate()),
        );
    }

    Err(InitError::NoSuitableDevice)
}

pub fn create_logical_device(
    driver: &mut dyn Driver,
    gpu: vk::PhysicalDevice,
    indices: QueueFamilyIndices,
) -> InitResult<LogicalDevice> {
    let (graphics_family, presentation_family) =
        indices.resolve().ok_or(InitError::NoSuitableDevice)?;

    let handle = driver
        .create_device(gpu, &indices.unique(), REQUIRED_DEVICE_EXTENSIONS)
        .map_err(InitError::creation(Stage::LogicalDevice))?;

    // Queues are created together with the device; index 0 of each family
    let graphics_queue = driver.device_queue(graphics_family, 0);
    let presentation_queue = driver.device_queue(presentation_family, 0);

    log::info!(
        "Logical device created (graphics family {}, presentation family {})",
        graphics_family,
        presentation_family
    );

    Ok(LogicalDevice {
        handle,
        graphics_family,
        presentation_family,
        graphics_queue,
        presentation_queue,
    })
}
