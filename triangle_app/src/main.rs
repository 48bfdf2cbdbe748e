//! Triangle demo
//!
//! Draws two textured, vertex-colored triangles that slide back and forth
//! across the window. Resize or minimize the window to exercise swapchain
//! rebuilds; press Escape to quit.
//!
//! Settings are read from `triangle_app.toml` in the working directory when
//! it exists.

use frame_engine::prelude::*;
use std::process::ExitCode;

const CONFIG_PATH: &str = "triangle_app.toml";
const SLIDE_DISTANCE: f32 = 150.0;
const SLIDE_SPEED: f32 = 1.5;

/// One triangle inside the box at `(x, y)` of size `w` x `h`, apex at the bottom middle
fn add_triangle(x: f32, y: f32, w: f32, h: f32) -> Mesh {
    Mesh::new(vec![
        Vertex::with_tex_coord([x, y], [1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::with_tex_coord([x + w / 2.0, y + h], [0.0, 1.0, 0.0], [0.5, 1.0]),
        Vertex::with_tex_coord([x + w, y], [0.0, 0.0, 1.0], [1.0, 0.0]),
    ])
}

/// The two-triangle scene shifted horizontally by `offset` pixels
fn scene(offset: f32) -> Vec<Mesh> {
    vec![
        add_triangle(200.0 + offset, 150.0, 150.0, 150.0),
        add_triangle(450.0 - offset, 300.0, 150.0, 150.0),
    ]
}

struct TriangleApp {
    elapsed: f32,
}

impl Application for TriangleApp {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        let vertex_count = engine.update_vertex_buffer(&scene(0.0))?;
        log::info!("Uploaded {} vertices", vertex_count);
        Ok(())
    }

    fn on_pre_render(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
        self.elapsed += delta_time;
        let offset = (self.elapsed * SLIDE_SPEED).sin() * SLIDE_DISTANCE;
        engine.update_vertex_buffer(&scene(offset))?;
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        log::info!(
            "Triangle demo ran for {:.1}s, {} frames",
            self.elapsed,
            engine.timer().frame_count()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default(CONFIG_PATH)?;
    let mut engine = Engine::init(config)?;
    engine.run(&mut TriangleApp { elapsed: 0.0 })?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Triangle demo failed: {}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
