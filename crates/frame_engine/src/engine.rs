//! Core engine: window, renderer and the main loop

use ash::vk;
use std::rc::Rc;
use thiserror::Error;

use crate::{
    application::{AppError, Application},
    config::{ConfigError, EngineConfig},
    foundation::{logging, time::Timer},
    render::{
        vulkan::{HostVertexArena, VulkanContext, VulkanDevice, VulkanResourceFactory, Window, WindowError},
        FrameOutcome, Mesh, Renderer, VulkanError,
    },
};

/// Renderer over the Vulkan backend
pub type VulkanRenderer = Renderer<VulkanDevice, VulkanResourceFactory, HostVertexArena>;

/// Main engine struct
///
/// Owns the window and the renderer. The renderer is declared first so it
/// is torn down while the window (and its surface) still exist.
pub struct Engine {
    renderer: VulkanRenderer,
    window: Window,
    timer: Timer,
    config: EngineConfig,
    running: bool,
}

impl Engine {
    /// Create the window and every GPU object needed to draw the first frame
    pub fn init(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init(&config.log_level);
        log::info!("Initializing engine...");

        let mut window = Window::new(&config.window)?;
        let context = Rc::new(VulkanContext::new(&mut window, &config.renderer)?);
        log::info!("Using GPU: {}", context.physical_device().name());

        let device = VulkanDevice::new(Rc::clone(&context), config.renderer.fence_timeout());
        let factory = VulkanResourceFactory::new(Rc::clone(&context), &config.renderer)?;
        let arena = HostVertexArena::new(context, config.renderer.vertex_capacity)?;
        let renderer = Renderer::new(device, factory, arena, &config.renderer, window.framebuffer_extent())?;

        Ok(Self {
            renderer,
            window,
            timer: Timer::new(),
            config,
            running: true,
        })
    }

    /// Run the main loop until the window closes or [`Engine::quit`] is called
    pub fn run<A: Application>(&mut self, app: &mut A) -> Result<(), AppError> {
        app.initialize(self)?;
        log::info!("Starting main loop...");

        let result = self.main_loop(app);

        app.cleanup(self);
        let idle = self.renderer.wait_idle();
        log::info!(
            "Main loop finished after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        settle_shutdown(result, idle)
    }

    fn main_loop<A: Application>(&mut self, app: &mut A) -> Result<(), AppError> {
        while self.running && !self.window.should_close() {
            self.window.poll_events();
            for event in self.window.flush_events() {
                if app.handle_event(self, &event) {
                    continue;
                }
                self.handle_event(&event);
            }
            if !self.running || self.window.should_close() {
                break;
            }

            self.timer.tick();
            let delta_time = self.timer.delta_time();
            app.on_pre_render(self, delta_time)?;

            let extent = self.window.framebuffer_extent();
            match self.renderer.draw_frame(extent).map_err(EngineError::from)? {
                FrameOutcome::Deferred => self.window.wait_events(),
                FrameOutcome::Aborted { .. } => log::debug!("Frame aborted, swapchain rebuilt"),
                FrameOutcome::Presented { .. } => {}
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: &glfw::WindowEvent) {
        match event {
            glfw::WindowEvent::FramebufferSize(width, height) => {
                log::debug!("Framebuffer resized to {}x{}", width, height);
                self.renderer.notify_resized();
            }
            glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) | glfw::WindowEvent::Close => {
                self.quit();
            }
            _ => {}
        }
    }

    /// Replace the drawn geometry
    ///
    /// Waits until no in-flight frame can still read the vertex arena.
    /// Returns the number of vertices now drawn per frame.
    pub fn update_vertex_buffer(&mut self, meshes: &[Mesh]) -> Result<u32, EngineError> {
        Ok(self.renderer.update_vertex_buffer(meshes)?)
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
        self.window.set_should_close(true);
    }

    /// Current framebuffer size
    pub fn framebuffer_extent(&self) -> vk::Extent2D {
        self.window.framebuffer_extent()
    }

    /// The renderer
    pub fn renderer(&self) -> &VulkanRenderer {
        &self.renderer
    }

    /// Frame timing
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Configuration the engine was created with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Combine the main loop result with the final idle wait
///
/// A loop error wins; an idle failure after it is only logged.
fn settle_shutdown(result: Result<(), AppError>, idle: Result<(), VulkanError>) -> Result<(), AppError> {
    match (result, idle) {
        (Err(e), Err(idle_error)) => {
            log::error!("Device wait during shutdown failed: {}", idle_error);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), idle) => idle.map_err(|e| AppError::Engine(EngineError::from(e))),
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Vulkan failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
