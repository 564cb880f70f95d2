// Instance & surface
//
// The instance identity is fixed; only the extension list varies, and it
// comes from the window collaborator.

use ash::vk;
use std::ffi::CStr;

use super::{capabilities, Driver};
use crate::error::{InitError, InitResult, Stage};
use crate::window::WindowTarget;

/// Application/engine identity reported to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppIdentity {
    pub application_name: &'static CStr,
    pub application_version: u32,
    pub engine_name: &'static CStr,
    pub engine_version: u32,
    pub api_version: u32,
}

impl AppIdentity {
    pub const DEFAULT: AppIdentity = AppIdentity {
        application_name: c"Vulkan test",
        application_version: vk::make_api_version(0, 0, 0, 1),
        engine_name: c"No Engine",
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_2,
    };
}

/// Checks the requested extensions, then creates the instance.
pub fn create_instance(driver: &mut dyn Driver, required_extensions: &[String]) -> InitResult<vk::Instance> {
    let available = capabilities::instance_extensions(driver)?;
    let missing = capabilities::missing_extensions(&available, required_extensions);
    if !missing.is_empty() {
        return Err(InitError::ExtensionUnsupported { missing });
    }

    log::debug!("Enabling instance extensions: {:?}", required_extensions);
    let instance = driver
        .create_instance(&AppIdentity::DEFAULT, required_extensions)
        .map_err(InitError::creation(Stage::Instance))?;

    log::info!("Vulkan instance created");
    Ok(instance)
}

pub fn create_surface(
    driver: &mut dyn Driver,
    instance: vk::Instance,
    window: &dyn WindowTarget,
) -> InitResult<vk::SurfaceKHR> {
    let (display, window) = window.raw_handles()?;
    let surface = driver
        .create_surface(instance, display, window)
        .map_err(InitError::creation(Stage::Surface))?;

    log::info!("Window surface created");
    Ok(surface)
}
