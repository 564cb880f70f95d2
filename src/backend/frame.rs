// Per-image frame resources
//
// One framebuffer and one pre-recorded command buffer per swap chain image.
// Recording happens once at init; the frame loop only submits.

use ash::vk;

use super::driver::{create_each, Driver};
use super::pipeline::GraphicsPipeline;
use crate::error::{InitError, InitResult, Stage};

/// The triangle comes from gl_VertexIndex, so no vertex buffer is bound.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

pub fn create_framebuffers(
    driver: &mut dyn Driver,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> InitResult<Vec<vk::Framebuffer>> {
    let framebuffers = create_each(
        &mut *driver,
        views.iter().copied(),
        |driver, view| driver.create_framebuffer(render_pass, view, extent),
        |driver, framebuffer| driver.destroy_framebuffer(framebuffer),
    )
    .map_err(InitError::creation(Stage::Framebuffer))?;

    log::debug!("{} framebuffers created", framebuffers.len());
    Ok(framebuffers)
}

pub fn create_command_pool(driver: &mut dyn Driver, graphics_family: u32) -> InitResult<vk::CommandPool> {
    driver
        .create_command_pool(graphics_family)
        .map_err(InitError::creation(Stage::CommandPool))
}

/// Primary buffers, one per framebuffer. They are released with the pool.
pub fn allocate_command_buffers(
    driver: &mut dyn Driver,
    pool: vk::CommandPool,
    count: usize,
) -> InitResult<Vec<vk::CommandBuffer>> {
    driver
        .allocate_command_buffers(pool, count as u32)
        .map_err(InitError::creation(Stage::CommandBuffers))
}

/// Records clear + draw into each buffer against its matching framebuffer.
pub fn record_commands(
    driver: &mut dyn Driver,
    command_buffers: &[vk::CommandBuffer],
    framebuffers: &[vk::Framebuffer],
    render_pass: vk::RenderPass,
    pipeline: &GraphicsPipeline,
    extent: vk::Extent2D,
    clear_color: [f32; 4],
) -> InitResult<()> {
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };

    for (index, (&cb, &framebuffer)) in command_buffers.iter().zip(framebuffers).enumerate() {
        let record = move |result: vk::Result| InitError::Record { index, result };

        // Submitted every time its image comes round, possibly while still pending
        driver
            .begin_command_buffer(cb, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
            .map_err(record)?;

        driver.cmd_begin_render_pass(cb, render_pass, framebuffer, render_area, clear_color);
        driver.cmd_bind_pipeline(cb, pipeline.pipeline);
        driver.cmd_draw(cb, TRIANGLE_VERTEX_COUNT, 1);
        driver.cmd_end_render_pass(cb);

        driver.end_command_buffer(cb).map_err(record)?;
    }

    log::debug!("Recorded {} command buffers", command_buffers.len());
    Ok(())
}
