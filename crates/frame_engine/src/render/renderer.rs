//! Owned renderer context
//!
//! [`Renderer`] ties the frame synchronizer, swapchain lifecycle and vertex
//! upload channel to one device, factory and arena. It is the only object
//! the driving loop talks to.

use ash::vk;

use super::backend::{ArenaMemory, GpuDevice, ResourceFactory};
use super::commands::FrameInputs;
use super::error::{VulkanError, VulkanResult};
use super::frame_sync::{FrameOutcome, FrameSynchronizer};
use super::swapchain_lifecycle::SwapchainLifecycle;
use super::vertex::Mesh;
use super::vertex_upload::VertexUploadChannel;
use crate::config::RendererConfig;

/// Frame core bound to a concrete backend
pub struct Renderer<D: GpuDevice, F: ResourceFactory, M: ArenaMemory> {
    device: D,
    factory: F,
    lifecycle: SwapchainLifecycle,
    frames: FrameSynchronizer,
    uploads: VertexUploadChannel<M>,
    descriptor_set: vk::DescriptorSet,
    clear_color: [f32; 4],
    shut_down: bool,
}

impl<D: GpuDevice, F: ResourceFactory, M: ArenaMemory> Renderer<D, F, M> {
    /// Build epoch 0, the frame slots and the texture descriptor set
    pub fn new(device: D, mut factory: F, arena: M, config: &RendererConfig, extent: vk::Extent2D) -> VulkanResult<Self> {
        config.validate().map_err(VulkanError::InitializationFailed)?;

        let mut lifecycle = SwapchainLifecycle::new(&device, &mut factory, extent)?;

        let mut frames = match FrameSynchronizer::new(&device, config.max_frames_in_flight) {
            Ok(frames) => frames,
            Err(e) => {
                lifecycle.destroy(&device, &mut factory)?;
                return Err(e);
            }
        };

        let descriptor_set = match factory.create_descriptor_set() {
            Ok(set) => set,
            Err(e) => {
                lifecycle.destroy(&device, &mut factory)?;
                frames.destroy(&device);
                return Err(e);
            }
        };

        log::info!(
            "Renderer ready: {} frames in flight, vertex capacity {}",
            frames.frames_in_flight(),
            arena.capacity()
        );

        Ok(Self {
            device,
            factory,
            lifecycle,
            frames,
            uploads: VertexUploadChannel::new(arena),
            descriptor_set,
            clear_color: config.clear_color,
            shut_down: false,
        })
    }

    /// Replace the arena contents with `meshes`
    ///
    /// Waits for every in-flight frame first so no GPU read overlaps the copy.
    /// Returns the new draw count.
    pub fn update_vertex_buffer(&mut self, meshes: &[Mesh]) -> VulkanResult<u32> {
        self.frames.wait_all_in_flight(&self.device)?;
        self.uploads.upload(meshes)
    }

    /// Run one frame against a surface of `extent`
    pub fn draw_frame(&mut self, extent: vk::Extent2D) -> VulkanResult<FrameOutcome> {
        let inputs = FrameInputs {
            vertex_buffer: self.uploads.buffer(),
            vertex_count: self.uploads.vertex_count(),
            descriptor_set: self.descriptor_set,
            clear_color: self.clear_color,
        };
        self.frames
            .tick(&self.device, &mut self.factory, &mut self.lifecycle, extent, &inputs)
    }

    /// Signal that the window framebuffer changed size
    pub fn notify_resized(&mut self) {
        self.frames.notify_resized();
    }

    /// Current draw count
    pub fn vertex_count(&self) -> u32 {
        self.uploads.vertex_count()
    }

    /// Arena capacity in vertices
    pub fn vertex_capacity(&self) -> usize {
        self.uploads.capacity()
    }

    /// Slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.frames.current_frame()
    }

    /// Swapchain lifecycle
    pub fn lifecycle(&self) -> &SwapchainLifecycle {
        &self.lifecycle
    }

    /// Frame synchronizer
    pub fn frames(&self) -> &FrameSynchronizer {
        &self.frames
    }

    /// Backend device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Vertex arena
    pub fn arena(&self) -> &M {
        self.uploads.arena()
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.wait_idle()
    }

    /// Wait for idle and release every GPU object the core created
    pub fn shutdown(&mut self) -> VulkanResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.device.wait_idle()?;
        self.lifecycle.destroy(&self.device, &mut self.factory)?;
        self.frames.destroy(&self.device);
        self.factory.destroy_descriptor_set(self.descriptor_set);
        log::info!("Renderer shut down");
        Ok(())
    }
}

impl<D: GpuDevice, F: ResourceFactory, M: ArenaMemory> Drop for Renderer<D, F, M> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Renderer shutdown failed: {}", e);
        }
    }
}
