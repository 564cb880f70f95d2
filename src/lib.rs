// trianglevk - Vulkan bring-up and a single-triangle frame loop
//
// instance -> surface -> GPU -> logical device -> swap chain -> render pass
// -> pipeline -> framebuffers -> command buffers -> semaphores, then
// acquire / submit / present until told to stop.

pub mod backend;
pub mod config;
pub mod error;
pub mod renderer;
pub mod window;


pub use backend::{AshDriver, Driver, ShaderCode, ShaderSet};
pub use config::Config;
pub use error::{FrameError, InitError, Stage};
pub use renderer::{FramePhase, Renderer, RendererSettings};
pub use window::WindowTarget;
