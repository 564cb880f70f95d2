// Swapchain - Window presentation
//
// Negotiates format, present mode, extent and image count with the surface,
// then owns the chain of presentable images and one view per image.
// The chain is never resized in place.

use ash::vk;

use super::capabilities::{self, SwapChainSupport};
use super::device::LogicalDevice;
use super::driver::{create_each, Driver};
use crate::error::{InitError, InitResult, Stage};

/// Format used when the surface reports a single UNDEFINED entry ("anything goes").
pub const FALLBACK_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Preferred format when the surface offers a real list.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// How swap chain images are shared between the graphics and presentation families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    Exclusive,
    Concurrent([u32; 2]),
}

/// Everything the driver needs to create the swap chain.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: ImageSharing,
}

#[derive(Debug, Clone, Copy)]
pub struct SwapChainImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

#[derive(Debug)]
pub struct SwapChain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<SwapChainImage>,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

impl SwapChain {
    pub fn views(&self) -> Vec<vk::ImageView> {
        self.images.iter().map(|image| image.view).collect()
    }
}

pub fn choose_surface_format(candidates: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if let [only] = candidates {
        if only.format == vk::Format::UNDEFINED {
            return FALLBACK_SURFACE_FORMAT;
        }
    }

    candidates
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| candidates.first())
        .copied()
        .unwrap_or(FALLBACK_SURFACE_FORMAT)
}

/// MAILBOX: no vsync stall, no tearing, triple buffered
/// FIFO: vsync, guaranteed to be available
pub fn choose_present_mode(candidates: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    candidates
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    // u32::MAX means the surface size follows whatever extent we pick
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        // max-then-min: never panics when a driver reports min > max
        width: width.max(caps.min_image_extent.width).min(caps.max_image_extent.width),
        height: height.max(caps.min_image_extent.height).min(caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 = no maximum).
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count.saturating_add(1);
    if caps.max_image_count > 0 && count > caps.max_image_count {
        caps.max_image_count
    } else {
        count
    }
}

pub fn image_sharing(device: &LogicalDevice) -> ImageSharing {
    if device.graphics_family == device.presentation_family {
        ImageSharing::Exclusive
    } else {
        ImageSharing::Concurrent([device.graphics_family, device.presentation_family])
    }
}

pub fn describe_swap_chain(
    support: &SwapChainSupport,
    surface: vk::SurfaceKHR,
    device: &LogicalDevice,
    framebuffer_size: (u32, u32),
) -> SwapchainDesc {
    SwapchainDesc {
        surface,
        image_count: image_count(&support.capabilities),
        format: choose_surface_format(&support.formats),
        extent: choose_extent(&support.capabilities, framebuffer_size),
        present_mode: choose_present_mode(&support.present_modes),
        pre_transform: support.capabilities.current_transform,
        sharing: image_sharing(device),
    }
}

/// Creates the swap chain and a view per image. Capabilities are queried
/// again here rather than reused from device selection.
pub fn create_swap_chain(
    driver: &mut dyn Driver,
    gpu: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    device: &LogicalDevice,
    framebuffer_size: (u32, u32),
) -> InitResult<SwapChain> {
    let support = capabilities::swap_chain_support(driver, gpu, surface)?;
    let desc = describe_swap_chain(&support, surface, device, framebuffer_size);

    log::info!(
        "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images requested",
        desc.extent.width,
        desc.extent.height,
        desc.format.format,
        desc.format.color_space,
        desc.present_mode,
        desc.image_count
    );

    let handle = driver
        .create_swapchain(&desc)
        .map_err(InitError::creation(Stage::SwapChain))?;

    let images = match driver.swapchain_images(handle) {
        Ok(images) => images,
        Err(result) => {
            driver.destroy_swapchain(handle);
            return Err(InitError::Query { what: "swap chain images", result });
        }
    };

    let format = desc.format.format;
    let views = match create_each(
        &mut *driver,
        images.iter().copied(),
        |driver, image| driver.create_image_view(image, format),
        |driver, view| driver.destroy_image_view(view),
    ) {
        Ok(views) => views,
        Err(result) => {
            driver.destroy_swapchain(handle);
            return Err(InitError::Creation { stage: Stage::ImageView, result });
        }
    };

    log::info!("Created swapchain with {} images", images.len());

    Ok(SwapChain {
        handle,
        images: images
            .into_iter()
            .zip(views)
            .map(|(image, view)| SwapChainImage { image, view })
            .collect(),
        format: desc.format,
        present_mode: desc.present_mode,
        extent: desc.extent,
    })
}
