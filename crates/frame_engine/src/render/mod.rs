//! Rendering: the frame synchronization core and its Vulkan backend
//!
//! The core ([`FrameSynchronizer`], [`SwapchainLifecycle`],
//! [`VertexUploadChannel`] and [`record_frame`]) is generic over the traits
//! in [`backend`]. [`vulkan`] supplies the real implementations.

pub mod backend;
pub mod commands;
pub mod error;
pub mod frame_sync;
pub mod renderer;
pub mod swapchain_lifecycle;
pub mod sync;
pub mod vertex;
pub mod vertex_upload;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod tests;

pub use backend::{ArenaMemory, GpuDevice, PipelineHandles, ResourceFactory, Submission, SwapchainImages};
pub use commands::{record_frame, FrameInputs, ProjectionPushConstant, RenderCommand};
pub use error::{AcquireOutcome, PresentOutcome, VulkanError, VulkanResult};
pub use frame_sync::{FrameOutcome, FrameSynchronizer};
pub use renderer::Renderer;
pub use swapchain_lifecycle::{LifecycleState, RebuildStatus, SwapchainEpoch, SwapchainLifecycle};
pub use sync::{FrameSlot, FrameSlots, ImageFenceMap};
pub use vertex::{Mesh, Vertex};
pub use vertex_upload::VertexUploadChannel;
