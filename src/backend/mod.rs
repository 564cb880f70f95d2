// Backend module - Vulkan bring-up steps
//
// Each step is a free function over `&mut dyn Driver` returning plain
// handles; `Renderer` strings them together and owns the results.

pub mod ash_driver;
pub mod capabilities;
pub mod device;
pub mod driver;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
pub(crate) mod mock;

pub use ash_driver::AshDriver;
pub use capabilities::{PhysicalDeviceInfo, QueueFamilyIndices, SwapChainSupport};
pub use device::LogicalDevice;
pub use driver::{Driver, FrameSubmit};
pub use instance::AppIdentity;
pub use pipeline::GraphicsPipeline;
pub use shader::{ShaderCode, ShaderSet};
pub use swapchain::SwapChain;
pub use sync::FrameSync;
