//! Vulkan implementation of the render seams
//!
//! [`VulkanContext`] owns instance and devices. [`VulkanDevice`],
//! [`VulkanResourceFactory`] and [`HostVertexArena`] share it and implement
//! the traits in [`crate::render::backend`].

pub mod buffer;
pub mod command_pool;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod factory;
pub mod pipeline;
pub mod render_pass;
pub mod swapchain;
pub mod texture;
pub mod window;

pub use buffer::HostVertexArena;
pub use context::VulkanContext;
pub use device::VulkanDevice;
pub use factory::VulkanResourceFactory;
pub use window::{Window, WindowError, WindowResult};
