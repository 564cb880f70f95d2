// =============================================================================
// TRIANGLEVK - One triangle, one window
// =============================================================================
//
// FRAME FLOW:
// 1. winit asks for a redraw
// 2. Renderer acquires a swap chain image
// 3. Submits the pre-recorded command buffer for that image
// 4. Presents it
//
// Any init or frame error is logged and ends the program.
//
// =============================================================================

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::process::ExitCode;
use trianglevk::{AshDriver, Config, Renderer, ShaderCode, ShaderSet};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> ExitCode {
    let config = Config::load();
    init_logging(&config);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<()> {
    log::info!("Starting trianglevk");
    log::info!("Window: {}x{} ({})", config.window.width, config.window.height, config.window.title);

    let shaders = load_shaders(&config)?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config, shaders);
    event_loop.run_app(&mut app).context("Event loop failed")?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn load_shaders(config: &Config) -> Result<ShaderSet> {
    let vertex = &config.graphics.vertex_shader;
    let fragment = &config.graphics.fragment_shader;
    Ok(ShaderSet {
        vertex: ShaderCode::load(vertex)
            .with_context(|| format!("Failed to load vertex shader {:?}", vertex))?,
        fragment: ShaderCode::load(fragment)
            .with_context(|| format!("Failed to load fragment shader {:?}", fragment))?,
    })
}

/// Initialize logging with an optional session header in the log file
fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::new();
    builder.filter_level(config.debug.level_filter());
    builder.parse_env("RUST_LOG");
    builder.init();

    if config.debug.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "=== {} ===", config.window.title);
                let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
                let _ = writeln!(file);
            }
            Err(e) => log::warn!("Cannot open log file {}: {}", config.debug.log_file, e),
        }
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

struct App {
    config: Config,
    shaders: ShaderSet,

    // The renderer goes first so it is dropped before the window it presents to
    renderer: Option<Renderer<AshDriver>>,
    window: Option<Window>,

    /// Set when init or a frame fails; reported after the loop exits
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config, shaders: ShaderSet) -> Self {
        Self {
            config,
            shaders,
            renderer: None,
            window: None,
            failure: None,
        }
    }

    fn init_renderer(&self, window: &Window) -> Result<Renderer<AshDriver>> {
        let driver = AshDriver::load().context("Failed to load Vulkan library. Is Vulkan installed?")?;
        let renderer = Renderer::init(driver, window, &self.shaders, self.config.renderer_settings())
            .context("Failed to initialize Vulkan")?;
        Ok(renderer)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        self.failure = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        match self.init_renderer(&window) {
            Ok(renderer) => {
                if let Some(name) = renderer.gpu_name() {
                    log::info!("Rendering on {}", name);
                }
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            // ─────────────────────────────────────────────────────────────────
            // CLOSE REQUEST
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            // ─────────────────────────────────────────────────────────────────
            // REDRAW REQUESTED
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if let Err(e) = renderer.draw_frame() {
                    self.fail(event_loop, anyhow::Error::new(e).context("Frame loop stopped"));
                }
            }

            // ─────────────────────────────────────────────────────────────────
            // KEYBOARD INPUT
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Keep redrawing continuously.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release Vulkan objects while the window still exists
        if let Some(mut renderer) = self.renderer.take() {
            renderer.shutdown();
        }
    }
}
