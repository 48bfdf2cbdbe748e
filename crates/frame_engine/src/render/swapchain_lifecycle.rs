//! Swapchain epoch ownership and rebuild protocol
//!
//! Every resource whose validity is tied to one swapchain instance lives in
//! a [`SwapchainEpoch`]. Exactly one epoch is live at a time. A rebuild
//! waits for the device to go idle, tears the old epoch down in reverse
//! creation order and builds a fresh one from current surface capabilities.
//!
//! Creation order: swapchain, image views, render pass, pipeline,
//! framebuffers, command buffers.

use ash::vk;

use super::backend::{GpuDevice, PipelineHandles, ResourceFactory};
use super::error::{AcquireOutcome, PresentOutcome, VulkanError, VulkanResult};
use super::sync::ImageFenceMap;

/// One generation of swapchain-derived resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainEpoch {
    /// Monotonic generation number, 0 for the startup epoch
    pub generation: u64,
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Presentable images
    pub images: Vec<vk::Image>,
    /// Image format
    pub format: vk::Format,
    /// Image extent
    pub extent: vk::Extent2D,
    /// One view per image
    pub image_views: Vec<vk::ImageView>,
    /// Render pass
    pub render_pass: vk::RenderPass,
    /// Graphics pipeline and layout
    pub pipeline: PipelineHandles,
    /// One framebuffer per image
    pub framebuffers: Vec<vk::Framebuffer>,
    /// One command buffer per image
    pub command_buffers: Vec<vk::CommandBuffer>,
    /// Which slot fence last rendered into each image
    pub image_fences: ImageFenceMap,
}

impl SwapchainEpoch {
    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer for `image_index`
    pub fn framebuffer(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| out_of_range("framebuffer", image_index, self.framebuffers.len()))
    }

    /// Command buffer for `image_index`
    pub fn command_buffer(&self, image_index: u32) -> VulkanResult<vk::CommandBuffer> {
        self.command_buffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| out_of_range("command buffer", image_index, self.command_buffers.len()))
    }
}

fn out_of_range(what: &str, index: u32, len: usize) -> VulkanError {
    VulkanError::InvalidOperation {
        reason: format!("{} index {} out of range ({} available)", what, index, len),
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The epoch is valid and serving acquire/present
    Live,
    /// Between tearing down one epoch and finishing the next
    Rebuilding,
}

/// Result of a rebuild request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStatus {
    /// A new epoch is live
    Rebuilt {
        /// Generation of the new epoch
        generation: u64,
        /// Its swapchain image count
        image_count: usize,
    },
    /// Zero-area surface; the previous epoch is untouched and the rebuild stays pending
    Deferred,
}

/// Whether `extent` has no drawable area
pub fn is_zero_area(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Owns the live swapchain epoch and rebuilds it on demand
#[derive(Debug)]
pub struct SwapchainLifecycle {
    epoch: Option<SwapchainEpoch>,
    state: LifecycleState,
    rebuild_pending: bool,
    next_generation: u64,
}

impl SwapchainLifecycle {
    /// Build epoch 0
    ///
    /// Unlike a later rebuild, a zero-area surface at startup is a setup failure.
    pub fn new<D: GpuDevice, F: ResourceFactory>(
        device: &D,
        factory: &mut F,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        if is_zero_area(extent) {
            return Err(VulkanError::InitializationFailed(format!(
                "cannot create a swapchain for a {}x{} surface",
                extent.width, extent.height
            )));
        }

        let mut lifecycle = Self {
            epoch: None,
            state: LifecycleState::Rebuilding,
            rebuild_pending: false,
            next_generation: 0,
        };
        match lifecycle.rebuild(device, factory, extent)? {
            RebuildStatus::Rebuilt { .. } => Ok(lifecycle),
            RebuildStatus::Deferred => Err(VulkanError::InitializationFailed(
                "surface has no drawable area at startup".to_string(),
            )),
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether a rebuild was requested but has not happened yet
    pub fn is_rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Ask for a rebuild on the next opportunity
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    /// The live epoch
    pub fn epoch(&self) -> VulkanResult<&SwapchainEpoch> {
        self.epoch.as_ref().ok_or_else(no_epoch)
    }

    /// The live epoch, mutably
    pub fn epoch_mut(&mut self) -> VulkanResult<&mut SwapchainEpoch> {
        self.epoch.as_mut().ok_or_else(no_epoch)
    }

    /// Acquire the next image of the live swapchain
    pub fn acquire<D: GpuDevice>(&self, device: &D, signal: vk::Semaphore) -> VulkanResult<AcquireOutcome> {
        let epoch = self.live_epoch()?;
        device.acquire_next_image(epoch.swapchain, signal)
    }

    /// Present `image_index` of the live swapchain
    pub fn present<D: GpuDevice>(
        &self,
        device: &D,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let epoch = self.live_epoch()?;
        device.present(epoch.swapchain, image_index, wait)
    }

    fn live_epoch(&self) -> VulkanResult<&SwapchainEpoch> {
        match (self.state, self.epoch.as_ref()) {
            (LifecycleState::Live, Some(epoch)) => Ok(epoch),
            _ => Err(no_epoch()),
        }
    }

    /// Replace the live epoch with one built for `extent`
    ///
    /// A zero-area extent, from the window or from the surface itself, leaves
    /// the current epoch alone, marks the rebuild pending and returns
    /// [`RebuildStatus::Deferred`]. Frame slots and the
    /// vertex arena are never touched here.
    pub fn rebuild<D: GpuDevice, F: ResourceFactory>(
        &mut self,
        device: &D,
        factory: &mut F,
        extent: vk::Extent2D,
    ) -> VulkanResult<RebuildStatus> {
        if is_zero_area(extent) {
            return Ok(self.defer(extent));
        }
        // The surface can be 0x0 while the window still reports its old size
        let extent = factory.surface_extent(extent)?;
        if is_zero_area(extent) {
            return Ok(self.defer(extent));
        }

        self.state = LifecycleState::Rebuilding;
        self.rebuild_pending = true;

        // Nothing in flight may reference the old epoch past this point
        device.wait_idle()?;
        if let Some(old) = self.epoch.take() {
            log::debug!("Destroying swapchain epoch {}", old.generation);
            Self::destroy_epoch(factory, old);
        }

        let generation = self.next_generation;
        let epoch = Self::build_epoch(factory, extent, generation)?;
        let image_count = epoch.image_count();
        log::info!(
            "Swapchain epoch {} built: {} images, {:?}, {}x{}",
            generation,
            image_count,
            epoch.format,
            epoch.extent.width,
            epoch.extent.height
        );

        self.epoch = Some(epoch);
        self.next_generation += 1;
        self.state = LifecycleState::Live;
        self.rebuild_pending = false;

        Ok(RebuildStatus::Rebuilt { generation, image_count })
    }

    fn defer(&mut self, extent: vk::Extent2D) -> RebuildStatus {
        log::warn!("Surface is {}x{}, deferring swapchain rebuild", extent.width, extent.height);
        self.rebuild_pending = true;
        RebuildStatus::Deferred
    }

    /// Wait for idle and destroy the live epoch
    pub fn destroy<D: GpuDevice, F: ResourceFactory>(&mut self, device: &D, factory: &mut F) -> VulkanResult<()> {
        device.wait_idle()?;
        if let Some(epoch) = self.epoch.take() {
            log::debug!("Destroying swapchain epoch {}", epoch.generation);
            Self::destroy_epoch(factory, epoch);
        }
        self.state = LifecycleState::Rebuilding;
        Ok(())
    }

    fn build_epoch<F: ResourceFactory>(
        factory: &mut F,
        extent: vk::Extent2D,
        generation: u64,
    ) -> VulkanResult<SwapchainEpoch> {
        let swapchain = factory.create_swapchain(extent)?;

        let image_views = match factory.create_image_views(&swapchain.images, swapchain.format) {
            Ok(views) => views,
            Err(e) => {
                factory.destroy_swapchain(swapchain.swapchain);
                return Err(e);
            }
        };

        let render_pass = match factory.create_render_pass(swapchain.format) {
            Ok(render_pass) => render_pass,
            Err(e) => {
                factory.destroy_image_views(&image_views);
                factory.destroy_swapchain(swapchain.swapchain);
                return Err(e);
            }
        };

        let pipeline = match factory.create_pipeline(render_pass, swapchain.extent) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                factory.destroy_render_pass(render_pass);
                factory.destroy_image_views(&image_views);
                factory.destroy_swapchain(swapchain.swapchain);
                return Err(e);
            }
        };

        let framebuffers = match factory.create_framebuffers(render_pass, &image_views, swapchain.extent) {
            Ok(framebuffers) => framebuffers,
            Err(e) => {
                factory.destroy_pipeline(pipeline);
                factory.destroy_render_pass(render_pass);
                factory.destroy_image_views(&image_views);
                factory.destroy_swapchain(swapchain.swapchain);
                return Err(e);
            }
        };

        let command_buffers = match factory.allocate_command_buffers(swapchain.images.len()) {
            Ok(command_buffers) => command_buffers,
            Err(e) => {
                factory.destroy_framebuffers(&framebuffers);
                factory.destroy_pipeline(pipeline);
                factory.destroy_render_pass(render_pass);
                factory.destroy_image_views(&image_views);
                factory.destroy_swapchain(swapchain.swapchain);
                return Err(e);
            }
        };

        let image_fences = ImageFenceMap::new(swapchain.images.len());
        Ok(SwapchainEpoch {
            generation,
            swapchain: swapchain.swapchain,
            images: swapchain.images,
            format: swapchain.format,
            extent: swapchain.extent,
            image_views,
            render_pass,
            pipeline,
            framebuffers,
            command_buffers,
            image_fences,
        })
    }

    fn destroy_epoch<F: ResourceFactory>(factory: &mut F, epoch: SwapchainEpoch) {
        factory.free_command_buffers(&epoch.command_buffers);
        factory.destroy_framebuffers(&epoch.framebuffers);
        factory.destroy_pipeline(epoch.pipeline);
        factory.destroy_render_pass(epoch.render_pass);
        factory.destroy_image_views(&epoch.image_views);
        factory.destroy_swapchain(epoch.swapchain);
    }
}

fn no_epoch() -> VulkanError {
    VulkanError::InvalidOperation {
        reason: "no live swapchain epoch".to_string(),
    }
}
