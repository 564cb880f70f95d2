// Renderer - bring-up, frame loop and teardown
//
// Owns every Vulkan object the triangle needs. Each slot is filled as its
// bring-up step succeeds, so a single teardown routine can release whatever
// exists, whether init finished or not.
//
// FRAME FLOW:
// 1. Acquire the next swap chain image (signals image_available)
// 2. Submit that image's pre-recorded command buffer (waits image_available,
//    signals render_finished)
// 3. Present on the presentation queue (waits render_finished)
//
// One frame in flight, no fences. Any failure halts the loop for good.

use ash::vk;

use crate::backend::{
    device, frame, instance, pipeline, swapchain, Driver, FrameSubmit, FrameSync, GraphicsPipeline,
    LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, ShaderSet, SwapChain,
};
use crate::error::{FrameError, InitResult};
use crate::window::WindowTarget;

/// Background color used when nothing else is configured.
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.6, 0.65, 0.4, 1.0];

/// Knobs the renderer takes from the outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    pub clear_color: [f32; 4],
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

/// Where the frame loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    ImageAcquired,
    Submitted,
    Presented,
    /// A frame step failed; no further frames are attempted.
    Halted,
}

pub struct Renderer<D: Driver> {
    driver: D,

    // ─────────────────────────────────────────────────────────────────────────
    // INSTANCE, SURFACE & DEVICE
    // ─────────────────────────────────────────────────────────────────────────
    instance: Option<vk::Instance>,
    surface: Option<vk::SurfaceKHR>,
    gpu: Option<PhysicalDeviceInfo>,
    device: Option<LogicalDevice>,

    // ─────────────────────────────────────────────────────────────────────────
    // PRESENTATION & PIPELINE
    // ─────────────────────────────────────────────────────────────────────────
    swap_chain: Option<SwapChain>,
    render_pass: Option<vk::RenderPass>,
    pipeline: Option<GraphicsPipeline>,

    // ─────────────────────────────────────────────────────────────────────────
    // COMMANDS
    // ─────────────────────────────────────────────────────────────────────────
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: Option<vk::CommandPool>,
    /// One per swap chain image, recorded once at init
    command_buffers: Vec<vk::CommandBuffer>,

    // ─────────────────────────────────────────────────────────────────────────
    // SYNCHRONIZATION & STATE
    // ─────────────────────────────────────────────────────────────────────────
    sync: Option<FrameSync>,
    phase: FramePhase,
    shut_down: bool,
}

impl<D: Driver> Renderer<D> {
    /// Runs the full bring-up sequence. On failure everything created so far
    /// is released before the error is returned.
    pub fn init(
        driver: D,
        window: &dyn WindowTarget,
        shaders: &ShaderSet,
        settings: RendererSettings,
    ) -> InitResult<Self> {
        let mut renderer = Self {
            driver,
            instance: None,
            surface: None,
            gpu: None,
            device: None,
            swap_chain: None,
            render_pass: None,
            pipeline: None,
            framebuffers: Vec::new(),
            command_pool: None,
            command_buffers: Vec::new(),
            sync: None,
            phase: FramePhase::Idle,
            shut_down: false,
        };

        if let Err(e) = renderer.bring_up(window, shaders, &settings) {
            log::debug!("Bring-up failed ({e}), releasing partial state");
            renderer.shutdown();
            return Err(e);
        }

        log::info!("Renderer ready");
        Ok(renderer)
    }

    fn bring_up(
        &mut self,
        window: &dyn WindowTarget,
        shaders: &ShaderSet,
        settings: &RendererSettings,
    ) -> InitResult<()> {
        // Step 1: Instance with the window's surface extensions
        let extensions = window.required_instance_extensions()?;
        let instance = instance::create_instance(&mut self.driver, &extensions)?;
        self.instance = Some(instance);

        // Step 2: Surface
        let surface = instance::create_surface(&mut self.driver, instance, window)?;
        self.surface = Some(surface);

        // Step 3: Physical + logical device
        let gpu = device::pick_physical_device(&self.driver, surface)?;
        let gpu_handle = gpu.handle;
        let queue_families = gpu.queue_families;
        self.gpu = Some(gpu);

        let logical = device::create_logical_device(&mut self.driver, gpu_handle, queue_families)?;
        self.device = Some(logical);

        // Step 4: Swap chain + image views
        let swap_chain = swapchain::create_swap_chain(
            &mut self.driver,
            gpu_handle,
            surface,
            &logical,
            window.framebuffer_size(),
        )?;
        let format = swap_chain.format.format;
        let extent = swap_chain.extent;
        let views = swap_chain.views();
        self.swap_chain = Some(swap_chain);

        // Step 5: Render pass + pipeline
        let render_pass = pipeline::create_render_pass(&mut self.driver, format)?;
        self.render_pass = Some(render_pass);

        let graphics_pipeline =
            pipeline::create_graphics_pipeline(&mut self.driver, render_pass, extent, shaders)?;
        self.pipeline = Some(graphics_pipeline);

        // Step 6: Framebuffers, command pool + pre-recorded command buffers
        self.framebuffers = frame::create_framebuffers(&mut self.driver, render_pass, &views, extent)?;

        let pool = frame::create_command_pool(&mut self.driver, logical.graphics_family)?;
        self.command_pool = Some(pool);

        self.command_buffers =
            frame::allocate_command_buffers(&mut self.driver, pool, self.framebuffers.len())?;
        frame::record_commands(
            &mut self.driver,
            &self.command_buffers,
            &self.framebuffers,
            render_pass,
            &graphics_pipeline,
            extent,
            settings.clear_color,
        )?;

        // Step 7: Semaphores
        self.sync = Some(FrameSync::new(&mut self.driver)?);

        Ok(())
    }

    // =========================================================================
    // FRAME LOOP
    // =========================================================================

    /// Acquire, submit and present one frame.
    pub fn draw_frame(&mut self) -> Result<(), FrameError> {
        if self.shut_down {
            return Err(FrameError::ShutDown);
        }
        if self.phase == FramePhase::Halted {
            return Err(FrameError::Halted);
        }

        self.phase = FramePhase::Idle;
        let result = self.run_frame();
        if let Err(ref e) = result {
            log::error!("Frame loop halted: {e}");
            self.phase = FramePhase::Halted;
        }
        result
    }

    fn run_frame(&mut self) -> Result<(), FrameError> {
        let swapchain = self.swap_chain.as_ref().map(|chain| chain.handle);
        let (Some(swapchain), Some(device), Some(sync)) = (swapchain, self.device, self.sync) else {
            return Err(FrameError::ShutDown);
        };

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Acquire next swapchain image
        // ─────────────────────────────────────────────────────────────────────
        let (image_index, suboptimal) = self
            .driver
            .acquire_next_image(swapchain, u64::MAX, sync.image_available)
            .map_err(FrameError::Acquire)?;
        if suboptimal {
            log::debug!("Swap chain is suboptimal (acquire)");
        }
        self.phase = FramePhase::ImageAcquired;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Submit the pre-recorded command buffer
        // ─────────────────────────────────────────────────────────────────────
        let command_buffer = *self
            .command_buffers
            .get(image_index as usize)
            .ok_or(FrameError::ImageIndex {
                index: image_index,
                count: self.command_buffers.len(),
            })?;

        let submit = FrameSubmit {
            command_buffer,
            wait: sync.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal: sync.render_finished,
        };
        self.driver
            .queue_submit(device.graphics_queue, &submit)
            .map_err(FrameError::Submit)?;
        self.phase = FramePhase::Submitted;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Present
        // ─────────────────────────────────────────────────────────────────────
        let suboptimal = self
            .driver
            .queue_present(device.presentation_queue, swapchain, image_index, sync.render_finished)
            .map_err(FrameError::Present)?;
        if suboptimal {
            log::debug!("Swap chain is suboptimal (present)");
        }
        self.phase = FramePhase::Presented;

        Ok(())
    }

    // =========================================================================
    // CLEANUP
    // =========================================================================

    /// Releases everything. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.teardown();
    }

    fn teardown(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Wait for the GPU before destroying anything it may still use
        if self.device.is_some() {
            if let Err(e) = self.driver.wait_idle() {
                log::warn!("wait_idle failed during teardown: {e}");
            }
        }

        if let Some(sync) = self.sync.take() {
            sync.destroy(&mut self.driver);
        }

        // Also frees the command buffers
        if let Some(pool) = self.command_pool.take() {
            self.driver.destroy_command_pool(pool);
        }
        self.command_buffers.clear();

        for framebuffer in self.framebuffers.drain(..) {
            self.driver.destroy_framebuffer(framebuffer);
        }

        if let Some(graphics_pipeline) = self.pipeline.take() {
            self.driver.destroy_pipeline(graphics_pipeline.pipeline);
            self.driver.destroy_pipeline_layout(graphics_pipeline.layout);
        }

        if let Some(render_pass) = self.render_pass.take() {
            self.driver.destroy_render_pass(render_pass);
        }

        if let Some(swap_chain) = self.swap_chain.take() {
            for image in &swap_chain.images {
                self.driver.destroy_image_view(image.view);
            }
            self.driver.destroy_swapchain(swap_chain.handle);
        }

        if let Some(surface) = self.surface.take() {
            self.driver.destroy_surface(surface);
        }

        if let Some(device) = self.device.take() {
            self.driver.destroy_device(device.handle);
        }
        self.gpu = None;

        if let Some(instance) = self.instance.take() {
            self.driver.destroy_instance(instance);
        }

        log::info!("Cleanup complete");
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn queue_families(&self) -> Option<QueueFamilyIndices> {
        self.gpu.as_ref().map(|gpu| gpu.queue_families)
    }

    pub fn gpu_name(&self) -> Option<&str> {
        self.gpu.as_ref().map(|gpu| gpu.name.as_str())
    }

    pub fn swap_chain(&self) -> Option<&SwapChain> {
        self.swap_chain.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: Driver> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
