// Error types for bring-up and the frame loop
//
// Init failures name the stage that was rejected so the binary can log
// something actionable. Frame failures are fatal to the loop.

use ash::vk;
use std::fmt;
use thiserror::Error;

/// The creation step that the API rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Instance,
    Surface,
    LogicalDevice,
    SwapChain,
    ImageView,
    RenderPass,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    Framebuffer,
    CommandPool,
    CommandBuffers,
    Semaphore,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Instance => "instance",
            Stage::Surface => "surface",
            Stage::LogicalDevice => "logical device",
            Stage::SwapChain => "swap chain",
            Stage::ImageView => "image view",
            Stage::RenderPass => "render pass",
            Stage::ShaderModule => "shader module",
            Stage::PipelineLayout => "pipeline layout",
            Stage::Pipeline => "graphics pipeline",
            Stage::Framebuffer => "framebuffer",
            Stage::CommandPool => "command pool",
            Stage::CommandBuffers => "command buffers",
            Stage::Semaphore => "semaphore",
        };
        f.write_str(name)
    }
}

/// Everything that can abort `Renderer::init`.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("required instance extensions not supported: {}", .missing.join(", "))]
    ExtensionUnsupported { missing: Vec<String> },

    #[error("no Vulkan-capable GPU found")]
    NoDevice,

    #[error("no GPU supports the required queues, extensions and swap chain")]
    NoSuitableDevice,

    #[error("failed to create {stage}: {result}")]
    Creation { stage: Stage, result: vk::Result },

    #[error("failed to query {what}: {result}")]
    Query { what: &'static str, result: vk::Result },

    #[error("failed to record command buffer {index}: {result}")]
    Record { index: usize, result: vk::Result },

    #[error("invalid shader bytecode: {0}")]
    Shader(#[source] std::io::Error),

    #[error("window handle unavailable: {0}")]
    Window(#[from] raw_window_handle::HandleError),
}

impl InitError {
    pub(crate) fn creation(stage: Stage) -> impl FnOnce(vk::Result) -> Self {
        move |result| InitError::Creation { stage, result }
    }

    pub(crate) fn query(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| InitError::Query { what, result }
    }
}

/// Per-frame failures. None of them are recovered from.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to acquire swap chain image: {0}")]
    Acquire(vk::Result),

    #[error("acquired image index {index} but the swap chain has {count} images")]
    ImageIndex { index: u32, count: usize },

    #[error("failed to submit draw commands: {0}")]
    Submit(vk::Result),

    #[error("failed to present image: {0}")]
    Present(vk::Result),

    #[error("frame loop halted after an earlier failure")]
    Halted,

    #[error("renderer has been shut down")]
    ShutDown,
}

pub type InitResult<T> = Result<T, InitError>;
