// AshDriver - the Driver trait over the real Vulkan API
//
// Owns the loaded entry points: the instance and device function tables and
// the surface/swapchain extension loaders. Handles are destroyed only when
// the caller asks; there is no Drop, the renderer decides the order.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CStr, CString};

use super::driver::{Driver, FrameSubmit};
use super::instance::AppIdentity;
use super::pipeline::{GraphicsPipelineDesc, RenderPassLayout};
use super::swapchain::{ImageSharing, SwapchainDesc};

/// Returned when a call needs an object that has not been created yet.
const NOT_READY: vk::Result = vk::Result::ERROR_INITIALIZATION_FAILED;

pub struct AshDriver {
    entry: ash::Entry,
    instance: Option<ash::Instance>,
    surface_fn: Option<ash::khr::surface::Instance>,
    device: Option<ash::Device>,
    swapchain_fn: Option<ash::khr::swapchain::Device>,
}

impl AshDriver {
    /// Load the Vulkan library.
    pub fn load() -> Result<Self, ash::LoadingError> {
        let entry = unsafe { ash::Entry::load()? };
        Ok(Self {
            entry,
            instance: None,
            surface_fn: None,
            device: None,
            swapchain_fn: None,
        })
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(NOT_READY)
    }

    fn surface_fn(&self) -> VkResult<&ash::khr::surface::Instance> {
        self.surface_fn.as_ref().ok_or(NOT_READY)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device.as_ref().ok_or(NOT_READY)
    }

    fn swapchain_fn(&self) -> VkResult<&ash::khr::swapchain::Device> {
        self.swapchain_fn.as_ref().ok_or(NOT_READY)
    }
}

fn extension_names(properties: &[vk::ExtensionProperties]) -> Vec<String> {
    properties
        .iter()
        .filter_map(|p| p.extension_name_as_c_str().ok())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

impl Driver for AshDriver {
    fn instance_extensions(&self) -> VkResult<Vec<String>> {
        let properties = unsafe { self.entry.enumerate_instance_extension_properties(None)? };
        Ok(extension_names(&properties))
    }

    fn create_instance(&mut self, app: &AppIdentity, extensions: &[String]) -> VkResult<vk::Instance> {
        let app_info = vk::ApplicationInfo::default()
            .application_name(app.application_name)
            .application_version(app.application_version)
            .engine_name(app.engine_name)
            .engine_version(app.engine_version)
            .api_version(app.api_version);

        // Names come from the driver's own list, so an interior NUL cannot match anyway
        let names = extensions
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let name_ptrs: Vec<*const c_char> = names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&name_ptrs);

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        let handle = instance.handle();
        self.surface_fn = Some(ash::khr::surface::Instance::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.surface_fn = None;
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
    }

    fn create_surface(
        &mut self,
        _instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe { ash_window::create_surface(&self.entry, instance, display, window, None) }
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(surface_fn) = &self.surface_fn {
            unsafe { surface_fn.destroy_surface(surface, None) };
        }
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
    }

    fn device_name(&self, gpu: vk::PhysicalDevice) -> String {
        let Ok(instance) = self.instance() else {
            return String::new();
        };
        let properties = unsafe { instance.get_physical_device_properties(gpu) };
        properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn device_extensions(&self, gpu: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let properties = unsafe { self.instance()?.enumerate_device_extension_properties(gpu)? };
        Ok(extension_names(&properties))
    }

    fn queue_family_properties(&self, gpu: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        match self.instance() {
            Ok(instance) => unsafe { instance.get_physical_device_queue_family_properties(gpu) },
            Err(_) => Vec::new(),
        }
    }

    fn surface_support(&self, gpu: vk::PhysicalDevice, family: u32, surface: vk::SurfaceKHR) -> VkResult<bool> {
        unsafe { self.surface_fn()?.get_physical_device_surface_support(gpu, family, surface) }
    }

    fn surface_capabilities(
        &self,
        gpu: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.surface_fn()?.get_physical_device_surface_capabilities(gpu, surface) }
    }

    fn surface_formats(&self, gpu: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface_fn()?.get_physical_device_surface_formats(gpu, surface) }
    }

    fn surface_present_modes(
        &self,
        gpu: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe { self.surface_fn()?.get_physical_device_surface_present_modes(gpu, surface) }
    }

    fn create_device(
        &mut self,
        gpu: vk::PhysicalDevice,
        queue_families: &[u32],
        extensions: &[&CStr],
    ) -> VkResult<vk::Device> {
        let instance = self.instance.as_ref().ok_or(NOT_READY)?;

        let priorities = [1.0f32];
        let queue_infos: Vec<_> = queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|name| name.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(gpu, &create_info, None)? };
        let handle = device.handle();
        self.swapchain_fn = Some(ash::khr::swapchain::Device::new(instance, &device));
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, family: u32, index: u32) -> vk::Queue {
        match self.device() {
            Ok(device) => unsafe { device.get_device_queue(family, index) },
            Err(_) => vk::Queue::null(),
        }
    }

    fn wait_idle(&self) -> VkResult<()> {
        match &self.device {
            Some(device) => unsafe { device.device_wait_idle() },
            None => Ok(()),
        }
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        self.swapchain_fn = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let (sharing_mode, families): (_, &[u32]) = match &desc.sharing {
            ImageSharing::Exclusive => (vk::SharingMode::EXCLUSIVE, &[]),
            ImageSharing::Concurrent(families) => (vk::SharingMode::CONCURRENT, families),
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(desc.surface)
            .min_image_count(desc.image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(families)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        unsafe { self.swapchain_fn()?.create_swapchain(&create_info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_fn()?.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Some(swapchain_fn) = &self.swapchain_fn {
            unsafe { swapchain_fn.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device()?.create_image_view(&create_info, None) }
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(&mut self, layout: &RenderPassLayout) -> VkResult<vk::RenderPass> {
        let attachments = [layout.color_attachment];
        let color_refs = [layout.color_reference];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&layout.dependencies);

        unsafe { self.device()?.create_render_pass(&create_info, None) }
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe { self.device()?.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_shader_module(module, None) };
        }
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::default();
        unsafe { self.device()?.create_pipeline_layout(&create_info, None) }
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> VkResult<vk::Pipeline> {
        let state = &desc.state;

        let stages: Vec<_> = desc
            .stages
            .iter()
            .map(|stage| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(stage.module)
                    .name(stage.entry_point)
            })
            .collect();

        // No vertex buffers
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(state.topology)
            .primitive_restart_enable(false);

        let viewports = [state.viewport];
        let scissors = [state.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(state.rasterization.polygon_mode)
            .line_width(state.rasterization.line_width)
            .cull_mode(state.rasterization.cull_mode)
            .front_face(state.rasterization.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(state.samples);

        let blend_attachments = [state.blend];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            self.device()?
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| e)?
        };
        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_pipeline(pipeline, None) };
        }
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let attachments = [attachment];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device()?.create_framebuffer(&create_info, None) }
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default().queue_family_index(queue_family);
        unsafe { self.device()?.create_command_pool(&create_info, None) }
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(&mut self, pool: vk::CommandPool, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device()?.allocate_command_buffers(&allocate_info) }
    }

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.device()?.begin_command_buffer(command_buffer, &begin_info) }
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(command_buffer) }
    }

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_color: [f32; 4],
    ) {
        let Some(device) = &self.device else { return };

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        }];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        unsafe { device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE) };
    }

    fn cmd_bind_pipeline(&mut self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        if let Some(device) = &self.device {
            unsafe { device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline) };
        }
    }

    fn cmd_draw(&mut self, command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        if let Some(device) = &self.device {
            unsafe { device.cmd_draw(command_buffer, vertex_count, instance_count, 0, 0) };
        }
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        if let Some(device) = &self.device {
            unsafe { device.cmd_end_render_pass(command_buffer) };
        }
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device()?.create_semaphore(&create_info, None) }
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_semaphore(semaphore, None) };
        }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_fn()?
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn queue_submit(&mut self, queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()> {
        let wait_semaphores = [submit.wait];
        let wait_stages = [submit.wait_stage];
        let command_buffers = [submit.command_buffer];
        let signal_semaphores = [submit.signal];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe { self.device()?.queue_submit(queue, &[submit_info], vk::Fence::null()) }
    }

    fn queue_present(
        &mut self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_fn()?.queue_present(queue, &present_info) }
    }
}
