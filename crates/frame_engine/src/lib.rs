//! # Frame Engine
//!
//! A small Vulkan renderer that draws 2D triangle meshes through a
//! double-buffered presentation pipeline.
//!
//! ## Features
//!
//! - **Frame synchronization**: N frame slots of semaphores and fences, with
//!   per-image fence ownership tracking
//! - **Swapchain epochs**: all swapchain-derived resources are rebuilt as one
//!   unit on resize or out-of-date results
//! - **Vertex upload**: a fixed-capacity host-coherent vertex arena refilled
//!   whenever geometry changes
//! - **Backend seams**: the core is generic over [`render::GpuDevice`],
//!   [`render::ResourceFactory`] and [`render::ArenaMemory`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         let triangle = Mesh::new(vec![
//!             Vertex::new([100.0, 100.0], [1.0, 0.0, 0.0]),
//!             Vertex::new([150.0, 200.0], [0.0, 1.0, 0.0]),
//!             Vertex::new([200.0, 100.0], [0.0, 0.0, 1.0]),
//!         ]);
//!         engine.update_vertex_buffer(&[triangle])?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::init(EngineConfig::default())?;
//!     engine.run(&mut MyApp)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, EngineConfig, RendererConfig, WindowConfig},
        foundation::{
            math::{orthographic_projection, Mat4, Vec2, Vec3},
            time::Timer,
        },
        render::{FrameOutcome, Mesh, Vertex, VulkanError, VulkanResult},
        AppError, Application, Engine, EngineError,
    };
}
