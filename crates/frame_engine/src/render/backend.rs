//! Seams between the frame core and the graphics API
//!
//! The synchronizer, lifecycle manager and upload channel only talk to the
//! GPU through these three traits. The Vulkan backend implements them in
//! [`crate::render::vulkan`]; tests implement them with a recording mock.
//!
//! All handles are raw `ash::vk` handles. The core never looks inside them.

use ash::vk;

use super::commands::RenderCommand;
use super::error::{AcquireOutcome, PresentOutcome, VulkanResult};
use super::vertex::Vertex;

/// One queue submission for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// Command buffer to execute
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore signaled by image acquisition
    pub wait_semaphore: vk::Semaphore,
    /// Stage at which the wait applies
    pub wait_stage: vk::PipelineStageFlags,
    /// Semaphore signaled when rendering completes
    pub signal_semaphore: vk::Semaphore,
    /// Fence signaled when the submission retires
    pub fence: vk::Fence,
}

/// Swapchain images plus the properties they were created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainImages {
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Presentable images owned by the swapchain
    pub images: Vec<vk::Image>,
    /// Image format
    pub format: vk::Format,
    /// Image extent
    pub extent: vk::Extent2D,
}

/// A graphics pipeline and its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineHandles {
    /// Pipeline handle
    pub pipeline: vk::Pipeline,
    /// Layout used for descriptor binding and push constants
    pub layout: vk::PipelineLayout,
}

/// Device-level operations used every frame
pub trait GpuDevice {
    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);

    /// Block until every fence is signaled
    fn wait_for_fences(&self, fences: &[vk::Fence]) -> VulkanResult<()>;

    /// Return a fence to the unsignaled state
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Acquire the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, signal: vk::Semaphore) -> VulkanResult<AcquireOutcome>;

    /// Reset `command_buffer` and record `commands` into it
    fn record(&self, command_buffer: vk::CommandBuffer, commands: &[RenderCommand]) -> VulkanResult<()>;

    /// Submit to the graphics queue
    fn submit(&self, submission: &Submission) -> VulkanResult<()>;

    /// Queue `image_index` for presentation once `wait` is signaled
    fn present(&self, swapchain: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore) -> VulkanResult<PresentOutcome>;

    /// Block until the device has no pending work
    fn wait_idle(&self) -> VulkanResult<()>;
}

/// Builds and destroys swapchain-derived resources
///
/// Every `create_*` either fully succeeds or leaves nothing behind.
pub trait ResourceFactory {
    /// Extent a swapchain created now would get for a `requested` window size
    ///
    /// The surface may disagree with the window, e.g. report 0x0 while minimized.
    fn surface_extent(&mut self, requested: vk::Extent2D) -> VulkanResult<vk::Extent2D>;

    /// Query surface capabilities and create a swapchain for `extent`
    fn create_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<SwapchainImages>;

    /// Destroy a swapchain
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);

    /// Create one color view per swapchain image
    fn create_image_views(&mut self, images: &[vk::Image], format: vk::Format) -> VulkanResult<Vec<vk::ImageView>>;

    /// Destroy image views
    fn destroy_image_views(&mut self, views: &[vk::ImageView]);

    /// Create the single-subpass color render pass
    fn create_render_pass(&mut self, format: vk::Format) -> VulkanResult<vk::RenderPass>;

    /// Destroy a render pass
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);

    /// Create the graphics pipeline for `render_pass` at `extent`
    fn create_pipeline(&mut self, render_pass: vk::RenderPass, extent: vk::Extent2D) -> VulkanResult<PipelineHandles>;

    /// Destroy a pipeline and its layout
    fn destroy_pipeline(&mut self, pipeline: PipelineHandles);

    /// Create one framebuffer per view
    fn create_framebuffers(
        &mut self,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>>;

    /// Destroy framebuffers
    fn destroy_framebuffers(&mut self, framebuffers: &[vk::Framebuffer]);

    /// Allocate primary command buffers
    fn allocate_command_buffers(&mut self, count: usize) -> VulkanResult<Vec<vk::CommandBuffer>>;

    /// Free command buffers
    fn free_command_buffers(&mut self, command_buffers: &[vk::CommandBuffer]);

    /// Allocate the texture descriptor set
    fn create_descriptor_set(&mut self) -> VulkanResult<vk::DescriptorSet>;

    /// Free a descriptor set
    fn destroy_descriptor_set(&mut self, set: vk::DescriptorSet);
}

/// Fixed-capacity, host-visible vertex storage
pub trait ArenaMemory {
    /// Capacity in vertices
    fn capacity(&self) -> usize;

    /// Buffer bound for drawing
    fn buffer(&self) -> vk::Buffer;

    /// Map the whole arena, run `f` on it, then unmap
    ///
    /// The mapping is released on every exit path. The slice always has
    /// exactly [`ArenaMemory::capacity`] elements.
    fn with_mapped<R>(&mut self, f: impl FnOnce(&mut [Vertex]) -> R) -> VulkanResult<R>;
}
