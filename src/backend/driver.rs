// Driver - the Vulkan entry points the bring-up sequence calls
//
// Everything above this trait deals in plain `vk` handles and small
// descriptor structs. `AshDriver` forwards to the real API; the test suite
// plugs in a scripted mock instead.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

use super::instance::AppIdentity;
use super::pipeline::{GraphicsPipelineDesc, RenderPassLayout};
use super::swapchain::SwapchainDesc;

/// One frame's worth of queue submission.
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmit {
    pub command_buffer: vk::CommandBuffer,
    pub wait: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal: vk::Semaphore,
}

pub trait Driver {
    // ─────────────────────────────────────────────────────────────────────
    // Instance & surface
    // ─────────────────────────────────────────────────────────────────────
    fn instance_extensions(&self) -> VkResult<Vec<String>>;
    fn create_instance(&mut self, app: &AppIdentity, extensions: &[String]) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self, instance: vk::Instance);
    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    // ─────────────────────────────────────────────────────────────────────
    // Physical device queries (always answered fresh)
    // ─────────────────────────────────────────────────────────────────────
    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn device_name(&self, gpu: vk::PhysicalDevice) -> String;
    fn device_extensions(&self, gpu: vk::PhysicalDevice) -> VkResult<Vec<String>>;
    fn queue_family_properties(&self, gpu: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn surface_support(
        &self,
        gpu: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_capabilities(
        &self,
        gpu: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        gpu: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        gpu: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // ─────────────────────────────────────────────────────────────────────
    // Logical device
    // ─────────────────────────────────────────────────────────────────────
    /// `queue_families` is already deduplicated: one queue is requested per entry.
    fn create_device(
        &mut self,
        gpu: vk::PhysicalDevice,
        queue_families: &[u32],
        extensions: &[&CStr],
    ) -> VkResult<vk::Device>;
    fn device_queue(&self, family: u32, index: u32) -> vk::Queue;
    fn wait_idle(&self) -> VkResult<()>;
    fn destroy_device(&mut self, device: vk::Device);

    // ─────────────────────────────────────────────────────────────────────
    // Swap chain
    // ─────────────────────────────────────────────────────────────────────
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);
    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&mut self, view: vk::ImageView);

    // ─────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────
    fn create_render_pass(&mut self, layout: &RenderPassLayout) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);
    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&mut self, module: vk::ShaderModule);
    /// Layout with no descriptor sets and no push constants.
    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout);
    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> VkResult<vk::Pipeline>;
    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline);

    // ─────────────────────────────────────────────────────────────────────
    // Frame resources
    // ─────────────────────────────────────────────────────────────────────
    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);
    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool>;
    /// Also frees every command buffer allocated from the pool.
    fn destroy_command_pool(&mut self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;

    // ─────────────────────────────────────────────────────────────────────
    // Command recording
    // ─────────────────────────────────────────────────────────────────────
    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()>;
    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_color: [f32; 4],
    );
    fn cmd_bind_pipeline(&mut self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_draw(&mut self, command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32);
    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer);

    // ─────────────────────────────────────────────────────────────────────
    // Synchronization & frame loop
    // ─────────────────────────────────────────────────────────────────────
    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore);
    /// Returns the image index and whether the swap chain is suboptimal.
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn queue_submit(&mut self, queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()>;
    /// Returns whether the swap chain is suboptimal.
    fn queue_present(
        &mut self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;
}

/// Create one object per input, destroying the ones already made if a later
/// creation fails.
pub(crate) fn create_each<D, T, H>(
    driver: &mut D,
    inputs: impl IntoIterator<Item = T>,
    mut create: impl FnMut(&mut D, T) -> VkResult<H>,
    mut destroy: impl FnMut(&mut D, H),
) -> VkResult<Vec<H>>
where
    D: Driver + ?Sized,
{
    let mut created = Vec::new();
    for input in inputs {
        match create(driver, input) {
            Ok(handle) => created.push(handle),
            Err(e) => {
                for handle in created.into_iter().rev() {
                    destroy(driver, handle);
                }
                return Err(e);
            }
        }
    }
    Ok(created)
}
