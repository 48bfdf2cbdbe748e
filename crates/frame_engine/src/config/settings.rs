//! Engine, window and renderer settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{Config, ConfigError};

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the window settings
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Set the renderer settings
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate().map_err(ConfigError::Invalid)?;
        self.renderer.validate().map_err(ConfigError::Invalid)
    }
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Frame Engine".to_string(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create window settings with the given title and size
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }

    /// Validate window settings
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("window size must be nonzero, got {}x{}", self.width, self.height));
        }
        Ok(())
    }
}

/// SPIR-V shader locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Vertex shader SPIR-V file
    pub vertex_shader: PathBuf,
    /// Fragment shader SPIR-V file
    pub fragment_shader: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::from("triangle.vert.spv"),
            fragment_shader: PathBuf::from("triangle.frag.spv"),
        }
    }
}

impl ShaderConfig {
    /// Create a shader configuration
    pub fn new(vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader: vertex.into(),
            fragment_shader: fragment.into(),
        }
    }

    /// Resolved vertex shader path
    pub fn vertex_path(&self) -> PathBuf {
        resolve_shader_path(&self.vertex_shader)
    }

    /// Resolved fragment shader path
    pub fn fragment_path(&self) -> PathBuf {
        resolve_shader_path(&self.fragment_shader)
    }
}

/// Try the path as given, then `target/shaders`, `../target/shaders`,
/// `shaders` and the executable's directory
fn resolve_shader_path(path: &Path) -> PathBuf {
    if path.exists() || path.is_absolute() {
        return path.to_path_buf();
    }
    let Some(file_name) = path.file_name() else {
        return path.to_path_buf();
    };

    let mut candidates = vec![
        PathBuf::from("target/shaders").join(file_name),
        PathBuf::from("../target/shaders").join(file_name),
        PathBuf::from("shaders").join(file_name),
    ];
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        candidates.push(exe_dir.join(file_name));
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan instance
    pub application_name: String,
    /// Number of frame slots
    pub max_frames_in_flight: usize,
    /// Vertex arena capacity in vertices
    pub vertex_capacity: usize,
    /// Clear color, RGBA in `[0, 1]`
    pub clear_color: [f32; 4],
    /// Texture image; `None` uses a 1x1 white texture
    pub texture_path: Option<PathBuf>,
    /// Validation layers; `None` enables them in debug builds only
    pub enable_validation: Option<bool>,
    /// Fence wait bound in nanoseconds; `None` waits forever
    pub fence_timeout_ns: Option<u64>,
    /// Shader locations
    pub shaders: ShaderConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Frame Engine".to_string(),
            max_frames_in_flight: 2,
            vertex_capacity: 1000,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shaders: ShaderConfig::default(),
            texture_path: None,
            enable_validation: None,
            fence_timeout_ns: None,
        }
    }
}

impl RendererConfig {
    /// Set the application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set the number of frame slots
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set the vertex arena capacity
    pub fn with_vertex_capacity(mut self, capacity: usize) -> Self {
        self.vertex_capacity = capacity;
        self
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the shader locations
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the texture image
    pub fn with_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.texture_path = Some(path.into());
        self
    }

    /// Force validation layers on or off
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Bound every fence wait
    pub fn with_fence_timeout_ns(mut self, timeout: u64) -> Self {
        self.fence_timeout_ns = Some(timeout);
        self
    }

    /// Whether validation layers should be enabled for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Fence timeout passed to `vkWaitForFences`
    pub fn fence_timeout(&self) -> u64 {
        self.fence_timeout_ns.unwrap_or(u64::MAX)
    }

    /// Validate renderer settings
    pub fn validate(&self) -> Result<(), String> {
        if self.max_frames_in_flight == 0 {
            return Err("max_frames_in_flight must be at least 1".to_string());
        }
        if self.vertex_capacity == 0 {
            return Err("vertex_capacity must be at least 1".to_string());
        }
        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(format!("clear_color components must be in [0, 1], got {:?}", self.clear_color));
        }
        if self.fence_timeout_ns == Some(0) {
            return Err("fence_timeout_ns must be nonzero".to_string());
        }
        Ok(())
    }
}
