//! Application trait and lifecycle management

use crate::engine::{Engine, EngineError};
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive the engine's main loop.
pub trait Application {
    /// Initialize the application
    ///
    /// Called once before the first frame. Upload the initial geometry here.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Called every frame before drawing
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn on_pre_render(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
        Ok(())
    }

    /// Handle a window event; return `true` to stop the engine from handling it
    fn handle_event(&mut self, _engine: &mut Engine, _event: &glfw::WindowEvent) -> bool {
        false
    }

    /// Called once after the main loop exits
    fn cleanup(&mut self, _engine: &mut Engine) {}
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}
