// Graphics pipeline creation
//
// One render pass with a single color attachment and one subpass, and one
// fixed pipeline drawing a hardcoded triangle: no vertex input, static
// viewport, back-face culling, alpha blending, empty layout.

use ash::vk;

use super::shader::{self, ShaderSet, ENTRY_POINT};
use super::Driver;
use crate::error::{InitError, InitResult, Stage};

/// Attachment, reference and the two external dependencies of the render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassLayout {
    pub color_attachment: vk::AttachmentDescription,
    pub color_reference: vk::AttachmentReference,
    pub dependencies: [vk::SubpassDependency; 2],
}

#[derive(Debug, Clone, Copy)]
pub struct Rasterization {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
}

/// Fixed-function state baked into the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct FixedFunctionState {
    pub topology: vk::PrimitiveTopology,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub rasterization: Rasterization,
    pub samples: vk::SampleCountFlags,
    pub blend: vk::PipelineColorBlendAttachmentState,
}

#[derive(Debug, Clone, Copy)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: &'static std::ffi::CStr,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineDesc {
    pub stages: [ShaderStage; 2],
    pub state: FixedFunctionState,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

/// Pipeline plus the layout it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsPipeline {
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

pub fn render_pass_layout(color_format: vk::Format) -> RenderPassLayout {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let color_reference = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    // The layout transitions happen at these two edges: UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL
    // on entry, COLOR_ATTACHMENT_OPTIMAL -> PRESENT_SRC_KHR on exit.
    let attachment_access =
        vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;

    let into_subpass = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        .src_access_mask(vk::AccessFlags::MEMORY_READ)
        .dst_subpass(0)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(attachment_access);

    let out_of_subpass = vk::SubpassDependency::default()
        .src_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(attachment_access)
        .dst_subpass(vk::SUBPASS_EXTERNAL)
        .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ);

    RenderPassLayout {
        color_attachment,
        color_reference,
        dependencies: [into_subpass, out_of_subpass],
    }
}

pub fn fixed_function_state(extent: vk::Extent2D) -> FixedFunctionState {
    let viewport = vk::Viewport::default()
        .x(0.0)
        .y(0.0)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0)
        .max_depth(1.0);

    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };

    // Standard "over" compositing
    let blend = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD);

    FixedFunctionState {
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        viewport,
        scissor,
        rasterization: Rasterization {
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
        },
        samples: vk::SampleCountFlags::TYPE_1,
        blend,
    }
}

pub fn create_render_pass(driver: &mut dyn Driver, color_format: vk::Format) -> InitResult<vk::RenderPass> {
    let render_pass = driver
        .create_render_pass(&render_pass_layout(color_format))
        .map_err(InitError::creation(Stage::RenderPass))?;

    log::debug!("Render pass created for {:?}", color_format);
    Ok(render_pass)
}

/// Builds the pipeline. Shader modules only live for the duration of this call.
pub fn create_graphics_pipeline(
    driver: &mut dyn Driver,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    shaders: &ShaderSet,
) -> InitResult<GraphicsPipeline> {
    let vertex = shader::create_shader_module(driver, &shaders.vertex)?;
    let fragment = match shader::create_shader_module(driver, &shaders.fragment) {
        Ok(module) => module,
        Err(e) => {
            driver.destroy_shader_module(vertex);
            return Err(e);
        }
    };

    let result = build_pipeline(driver, render_pass, extent, vertex, fragment);

    driver.destroy_shader_module(fragment);
    driver.destroy_shader_module(vertex);

    result
}

fn build_pipeline(
    driver: &mut dyn Driver,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
) -> InitResult<GraphicsPipeline> {
    let layout = driver
        .create_pipeline_layout()
        .map_err(InitError::creation(Stage::PipelineLayout))?;

    let desc = GraphicsPipelineDesc {
        stages: [
            ShaderStage {
                stage: vk::ShaderStageFlags::VERTEX,
                module: vertex,
                entry_point: ENTRY_POINT,
            },
            ShaderStage {
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fragment,
                entry_point: ENTRY_POINT,
            },
        ],
        state: fixed_function_state(extent),
        layout,
        render_pass,
        subpass: 0,
    };

    match driver.create_graphics_pipeline(&desc) {
        Ok(pipeline) => {
            log::info!("Graphics pipeline created ({}x{})", extent.width, extent.height);
            Ok(GraphicsPipeline { layout, pipeline })
        }
        Err(result) => {
            driver.destroy_pipeline_layout(layout);
            Err(InitError::Creation { stage: Stage::Pipeline, result })
        }
    }
}
