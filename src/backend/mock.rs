// Scripted driver for tests
//
// Hands out fake handles, records what it was asked to do, tracks which
// objects are still alive and can be told to fail a given call.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::{Mutex, MutexGuard};
use raw_window_handle::{
    HandleError, RawDisplayHandle, RawWindowHandle, WebDisplayHandle, WebWindowHandle,
};
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::Arc;

use super::driver::{Driver, FrameSubmit};
use super::instance::AppIdentity;
use super::pipeline::{GraphicsPipelineDesc, RenderPassLayout};
use super::shader::{ShaderCode, ShaderSet};
use super::swapchain::SwapchainDesc;
use crate::error::InitResult;
use crate::window::WindowTarget;

/// A queue family row plus whether it can present to the test surface.
pub fn family(flags: vk::QueueFlags, count: u32, present: bool) -> (vk::QueueFamilyProperties, bool) {
    let props = vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: count,
        ..Default::default()
    };
    (props, present)
}

/// SPIR-V magic followed by a version word; enough for module creation.
pub fn test_shaders() -> ShaderSet {
    ShaderSet {
        vertex: ShaderCode::from_words(vec![0x0723_0203, 0x0001_0000]),
        fragment: ShaderCode::from_words(vec![0x0723_0203, 0x0001_0000]),
    }
}

#[derive(Debug, Clone)]
pub struct MockGpu {
    pub name: String,
    pub extensions: Vec<String>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub present_support: Vec<bool>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl MockGpu {
    /// A GPU that passes every suitability check with a single shared family.
    pub fn capable(name: &str) -> Self {
        let (graphics, present) = family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1, true);
        Self {
            name: name.to_string(),
            extensions: vec!["VK_KHR_swapchain".to_string()],
            queue_families: vec![graphics],
            present_support: vec![present],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D { width: 800, height: 600 },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    pub fn with_families(mut self, families: Vec<(vk::QueueFamilyProperties, bool)>) -> Self {
        let (props, present): (Vec<_>, Vec<_>) = families.into_iter().unzip();
        self.queue_families = props;
        self.present_support = present;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_formats(mut self, formats: Vec<vk::SurfaceFormatKHR>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_present_modes(mut self, modes: Vec<vk::PresentModeKHR>) -> Self {
        self.present_modes = modes;
        self
    }

    pub fn with_capabilities(mut self, capabilities: vk::SurfaceCapabilitiesKHR) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// A command recorded into a command buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Begin { flags: vk::CommandBufferUsageFlags },
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: (i32, i32, u32, u32),
        clear_color: [f32; 4],
    },
    BindPipeline(vk::Pipeline),
    Draw { vertex_count: u32, instance_count: u32 },
    EndRenderPass,
    End,
}

#[derive(Debug, Clone, Copy)]
pub struct Present {
    pub queue: vk::Queue,
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait: vk::Semaphore,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    call: &'static str,
    /// 1-based call number; `None` fails every call.
    nth: Option<usize>,
    result: vk::Result,
}

#[derive(Debug)]
pub struct MockState {
    pub instance_extensions: Vec<String>,
    pub gpus: Vec<MockGpu>,
    failures: Vec<Failure>,
    pub call_counts: HashMap<&'static str, usize>,
    /// Every driver call, in order.
    pub calls: Vec<&'static str>,
    /// Kinds of destroyed objects, in destruction order.
    pub destroyed: Vec<&'static str>,
    /// Destroy calls for handles that were never created or already gone.
    pub stray_destroys: Vec<(&'static str, u64)>,
    live: Vec<(&'static str, u64)>,
    next_handle: u64,

    pub app_identity: Option<AppIdentity>,
    pub enabled_instance_extensions: Vec<String>,
    pub device_queue_families: Vec<u32>,
    pub device_extensions: Vec<String>,
    pub swapchain_desc: Option<SwapchainDesc>,
    pub render_pass_layout: Option<RenderPassLayout>,
    pub pipeline_desc: Option<GraphicsPipelineDesc>,
    pub command_pool_family: Option<u32>,
    pub commands: HashMap<u64, Vec<Command>>,
    pub submits: Vec<(vk::Queue, FrameSubmit)>,
    pub presents: Vec<Present>,
    pub acquires: u32,
    /// Forces the index handed out by acquire.
    pub acquire_index: Option<u32>,
    pub acquire_suboptimal: bool,
    pub present_suboptimal: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            instance_extensions: vec![
                "VK_KHR_surface".to_string(),
                "VK_KHR_xlib_surface".to_string(),
                "VK_KHR_wayland_surface".to_string(),
            ],
            gpus: Vec::new(),
            failures: Vec::new(),
            call_counts: HashMap::new(),
            calls: Vec::new(),
            destroyed: Vec::new(),
            stray_destroys: Vec::new(),
            live: Vec::new(),
            next_handle: 0x1000,
            app_identity: None,
            enabled_instance_extensions: Vec::new(),
            device_queue_families: Vec::new(),
            device_extensions: Vec::new(),
            swapchain_desc: None,
            render_pass_layout: None,
            pipeline_desc: None,
            command_pool_family: None,
            commands: HashMap::new(),
            submits: Vec::new(),
            presents: Vec::new(),
            acquires: 0,
            acquire_index: None,
            acquire_suboptimal: false,
            present_suboptimal: false,
        }
    }
}

impl MockState {
    /// Counts the call and returns the scripted failure, if any.
    fn enter(&mut self, call: &'static str) -> VkResult<()> {
        self.calls.push(call);
        let count = self.call_counts.entry(call).or_insert(0);
        *count += 1;
        let count = *count;

        match self
            .failures
            .iter()
            .find(|f| f.call == call && f.nth.map_or(true, |n| n == count))
        {
            Some(failure) => Err(failure.result),
            None => Ok(()),
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create<H: Handle>(&mut self, call: &'static str, kind: &'static str) -> VkResult<H> {
        self.enter(call)?;
        let raw = self.allocate();
        self.live.push((kind, raw));
        Ok(H::from_raw(raw))
    }

    fn destroy<H: Handle>(&mut self, call: &'static str, kind: &'static str, handle: H) {
        self.calls.push(call);
        *self.call_counts.entry(call).or_insert(0) += 1;

        let raw = handle.as_raw();
        match self.live.iter().position(|&entry| entry == (kind, raw)) {
            Some(pos) => {
                self.live.remove(pos);
                self.destroyed.push(kind);
            }
            None => self.stray_destroys.push((kind, raw)),
        }
    }

    fn gpu(&self, handle: vk::PhysicalDevice) -> MockGpu {
        (handle.as_raw() as usize)
            .checked_sub(1)
            .and_then(|index| self.gpus.get(index))
            .cloned()
            .unwrap_or_else(|| MockGpu::capable("unlisted"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn with_gpus(gpus: Vec<MockGpu>) -> Self {
        let driver = Self::default();
        driver.state.lock().gpus = gpus;
        driver
    }

    pub fn set_instance_extensions(&self, names: &[&str]) {
        self.state.lock().instance_extensions = names.iter().map(|s| s.to_string()).collect();
    }

    /// Every call to `call` fails with `result`.
    pub fn fail_on(&self, call: &'static str, result: vk::Result) {
        self.state.lock().failures.push(Failure { call, nth: None, result });
    }

    /// Only the `nth` call (1-based) to `call` fails.
    pub fn fail_on_nth(&self, call: &'static str, nth: usize, result: vk::Result) {
        self.state.lock().failures.push(Failure { call, nth: Some(nth), result });
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state.lock().call_counts.get(call).copied().unwrap_or(0)
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    /// Objects created and not yet destroyed, as (kind, raw handle).
    pub fn live_handles(&self) -> Vec<(&'static str, u64)> {
        self.state.lock().live.clone()
    }

    pub fn destroyed(&self) -> Vec<&'static str> {
        self.state.lock().destroyed.clone()
    }
}

impl Driver for MockDriver {
    fn instance_extensions(&self) -> VkResult<Vec<String>> {
        let mut state = self.state.lock();
        state.enter("instance_extensions")?;
        Ok(state.instance_extensions.clone())
    }

    fn create_instance(&mut self, app: &AppIdentity, extensions: &[String]) -> VkResult<vk::Instance> {
        let mut state = self.state.lock();
        let instance = state.create("create_instance", "instance")?;
        state.app_identity = Some(*app);
        state.enabled_instance_extensions = extensions.to_vec();
        Ok(instance)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.state.lock().destroy("destroy_instance", "instance", instance);
    }

    fn create_surface(
        &mut self,
        _instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.state.lock().create("create_surface", "surface")
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        self.state.lock().destroy("destroy_surface", "surface", surface);
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let mut state = self.state.lock();
        state.enter("physical_devices")?;
        Ok((1..=state.gpus.len() as u64).map(vk::PhysicalDevice::from_raw).collect())
    }

    fn device_name(&self, gpu: vk::PhysicalDevice) -> String {
        self.state.lock().gpu(gpu).name
    }

    fn device_extensions(&self, gpu: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let mut state = self.state.lock();
        state.enter("device_extensions")?;
        Ok(state.gpu(gpu).extensions)
    }

    fn queue_family_properties(&self, gpu: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        let mut state = self.state.lock();
        state.calls.push("queue_family_properties");
        state.gpu(gpu).queue_families
    }

    fn surface_support(&self, gpu: vk::PhysicalDevice, family: u32, _surface: vk::SurfaceKHR) -> VkResult<bool> {
        let mut state = self.state.lock();
        state.enter("surface_support")?;
        Ok(state.gpu(gpu).present_support.get(family as usize).copied().unwrap_or(false))
    }

    fn surface_capabilities(
        &self,
        gpu: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let mut state = self.state.lock();
        state.enter("surface_capabilities")?;
        Ok(state.gpu(gpu).capabilities)
    }

    fn surface_formats(&self, gpu: vk::PhysicalDevice, _surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let mut state = self.state.lock();
        state.enter("surface_formats")?;
        Ok(state.gpu(gpu).formats)
    }

    fn surface_present_modes(
        &self,
        gpu: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let mut state = self.state.lock();
        state.enter("surface_present_modes")?;
        Ok(state.gpu(gpu).present_modes)
    }

    fn create_device(
        &mut self,
        _gpu: vk::PhysicalDevice,
        queue_families: &[u32],
        extensions: &[&CStr],
    ) -> VkResult<vk::Device> {
        let mut state = self.state.lock();
        let device = state.create("create_device", "device")?;
        state.device_queue_families = queue_families.to_vec();
        state.device_extensions = extensions
            .iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(device)
    }

    fn device_queue(&self, family: u32, _index: u32) -> vk::Queue {
        self.state.lock().calls.push("device_queue");
        vk::Queue::from_raw(0x100 + family as u64)
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.state.lock().enter("wait_idle")
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.state.lock().destroy("destroy_device", "device", device);
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state.lock();
        let swapchain = state.create("create_swapchain", "swapchain")?;
        state.swapchain_desc = Some(*desc);
        Ok(swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let mut state = self.state.lock();
        state.enter("swapchain_images")?;
        let count = state.swapchain_desc.map_or(0, |desc| desc.image_count);
        // Images belong to the swap chain and are never destroyed individually
        Ok((0..count).map(|_| vk::Image::from_raw(state.allocate())).collect())
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.state.lock().destroy("destroy_swapchain", "swapchain", swapchain);
    }

    fn create_image_view(&mut self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        self.state.lock().create("create_image_view", "image_view")
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.state.lock().destroy("destroy_image_view", "image_view", view);
    }

    fn create_render_pass(&mut self, layout: &RenderPassLayout) -> VkResult<vk::RenderPass> {
        let mut state = self.state.lock();
        let render_pass = state.create("create_render_pass", "render_pass")?;
        state.render_pass_layout = Some(*layout);
        Ok(render_pass)
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.state.lock().destroy("destroy_render_pass", "render_pass", render_pass);
    }

    fn create_shader_module(&mut self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        self.state.lock().create("create_shader_module", "shader_module")
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        self.state.lock().destroy("destroy_shader_module", "shader_module", module);
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        self.state.lock().create("create_pipeline_layout", "pipeline_layout")
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        self.state.lock().destroy("destroy_pipeline_layout", "pipeline_layout", layout);
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> VkResult<vk::Pipeline> {
        let mut state = self.state.lock();
        let pipeline = state.create("create_graphics_pipeline", "pipeline")?;
        state.pipeline_desc = Some(*desc);
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.state.lock().destroy("destroy_pipeline", "pipeline", pipeline);
    }

    fn create_framebuffer(
        &mut self,
        _render_pass: vk::RenderPass,
        _attachment: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        self.state.lock().create("create_framebuffer", "framebuffer")
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        self.state.lock().destroy("destroy_framebuffer", "framebuffer", framebuffer);
    }

    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool> {
        let mut state = self.state.lock();
        let pool = state.create("create_command_pool", "command_pool")?;
        state.command_pool_family = Some(queue_family);
        Ok(pool)
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        self.state.lock().destroy("destroy_command_pool", "command_pool", pool);
    }

    fn allocate_command_buffers(&mut self, _pool: vk::CommandPool, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock();
        state.enter("allocate_command_buffers")?;
        // Freed together with their pool
        Ok((0..count).map(|_| vk::CommandBuffer::from_raw(state.allocate())).collect())
    }

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let mut state = self.state.lock();
        state.enter("begin_command_buffer")?;
        state
            .commands
            .insert(command_buffer.as_raw(), vec![Command::Begin { flags }]);
        Ok(())
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.state.lock();
        state.enter("end_command_buffer")?;
        state.commands.entry(command_buffer.as_raw()).or_default().push(Command::End);
        Ok(())
    }

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_color: [f32; 4],
    ) {
        let area = (
            render_area.offset.x,
            render_area.offset.y,
            render_area.extent.width,
            render_area.extent.height,
        );
        self.state
            .lock()
            .commands
            .entry(command_buffer.as_raw())
            .or_default()
            .push(Command::BeginRenderPass { render_pass, framebuffer, area, clear_color });
    }

    fn cmd_bind_pipeline(&mut self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.state
            .lock()
            .commands
            .entry(command_buffer.as_raw())
            .or_default()
            .push(Command::BindPipeline(pipeline));
    }

    fn cmd_draw(&mut self, command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        self.state
            .lock()
            .commands
            .entry(command_buffer.as_raw())
            .or_default()
            .push(Command::Draw { vertex_count, instance_count });
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        self.state
            .lock()
            .commands
            .entry(command_buffer.as_raw())
            .or_default()
            .push(Command::EndRenderPass);
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        self.state.lock().create("create_semaphore", "semaphore")
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        self.state.lock().destroy("destroy_semaphore", "semaphore", semaphore);
    }

    fn acquire_next_image(
        &mut self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state.lock();
        state.enter("acquire_next_image")?;
        let count = state.swapchain_desc.map_or(1, |desc| desc.image_count.max(1));
        let index = state.acquire_index.unwrap_or(state.acquires % count);
        state.acquires += 1;
        Ok((index, state.acquire_suboptimal))
    }

    fn queue_submit(&mut self, queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()> {
        let mut state = self.state.lock();
        state.enter("queue_submit")?;
        state.submits.push((queue, *submit));
        Ok(())
    }

    fn queue_present(
        &mut self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut state = self.state.lock();
        state.enter("queue_present")?;
        state.presents.push(Present { queue, swapchain, image_index, wait });
        Ok(state.present_suboptimal)
    }
}

/// Window stand-in with a fixed size and a Wayland-flavoured extension list.
#[derive(Debug, Clone)]
pub struct MockWindow {
    pub size: (u32, u32),
    pub extensions: Vec<String>,
}

impl Default for MockWindow {
    fn default() -> Self {
        Self {
            size: (800, 600),
            extensions: vec!["VK_KHR_surface".to_string(), "VK_KHR_wayland_surface".to_string()],
        }
    }
}

impl WindowTarget for MockWindow {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        Ok((
            RawDisplayHandle::Web(WebDisplayHandle::new()),
            RawWindowHandle::Web(WebWindowHandle::new(1)),
        ))
    }

    fn required_instance_extensions(&self) -> InitResult<Vec<String>> {
        Ok(self.extensions.clone())
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }
}
