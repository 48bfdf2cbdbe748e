//! Per-tick frame state machine
//!
//! One [`FrameSynchronizer::tick`] drives a full frame:
//!
//! 1. wait on the current slot's in-flight fence unless already waited since
//!    its last submission (bounds CPU lead to N frames)
//! 2. acquire an image; a stale swapchain aborts the tick and rebuilds
//! 3. wait on whichever fence last rendered into that image, then claim it
//! 4. record the image's command buffer
//! 5. reset the slot fence and submit
//! 6. present, then rebuild if present or acquire asked for it or a resize was signaled
//! 7. advance to the next slot
//!
//! An aborted tick submits nothing and does not advance the slot.

use ash::vk;

use super::backend::{GpuDevice, ResourceFactory, Submission};
use super::commands::{record_frame, FrameInputs};
use super::error::{AcquireOutcome, PresentOutcome, VulkanResult};
use super::swapchain_lifecycle::{is_zero_area, RebuildStatus, SwapchainLifecycle};
use super::sync::{FrameSlot, FrameSlots};

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and handed to the presentation engine
    Presented {
        /// Slot used for this frame
        slot: usize,
        /// Swapchain image drawn into
        image_index: u32,
        /// Rebuild performed during the tick, if any
        rebuild: Option<RebuildStatus>,
    },
    /// The swapchain was stale at acquire; nothing was submitted
    Aborted {
        /// Result of the rebuild that followed
        rebuild: RebuildStatus,
    },
    /// Zero-area window or surface; nothing was submitted
    Deferred,
}

/// Owns the frame slots and drives acquire, record, submit and present
#[derive(Debug)]
pub struct FrameSynchronizer {
    slots: FrameSlots,
    // Slots whose fence was waited on with no submission since
    retired: Vec<bool>,
    current_frame: usize,
    framebuffer_resized: bool,
}

impl FrameSynchronizer {
    /// Create `frames_in_flight` slots
    pub fn new<D: GpuDevice>(device: &D, frames_in_flight: usize) -> VulkanResult<Self> {
        Ok(Self {
            slots: FrameSlots::new(device, frames_in_flight)?,
            retired: vec![false; frames_in_flight],
            current_frame: 0,
            framebuffer_resized: false,
        })
    }

    /// Slot the next tick will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot at `index`
    pub fn slot(&self, index: usize) -> VulkanResult<FrameSlot> {
        self.slots.get(index)
    }

    /// Record an external resize; the rebuild happens after the next present
    pub fn notify_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    /// Whether a resize is waiting to be handled
    pub fn is_resize_pending(&self) -> bool {
        self.framebuffer_resized
    }

    /// Run one frame
    pub fn tick<D: GpuDevice, F: ResourceFactory>(
        &mut self,
        device: &D,
        factory: &mut F,
        lifecycle: &mut SwapchainLifecycle,
        extent: vk::Extent2D,
        inputs: &FrameInputs,
    ) -> VulkanResult<FrameOutcome> {
        if is_zero_area(extent) {
            lifecycle.request_rebuild();
            return Ok(FrameOutcome::Deferred);
        }

        // A deferred rebuild resolves as soon as the surface has area again
        let early_rebuild = if lifecycle.is_rebuild_pending() {
            self.framebuffer_resized = false;
            match lifecycle.rebuild(device, factory, extent)? {
                RebuildStatus::Deferred => return Ok(FrameOutcome::Deferred),
                rebuilt => Some(rebuilt),
            }
        } else {
            None
        };

        let slot = self.slots.get(self.current_frame)?;
        if !self.retired[slot.index] {
            device.wait_for_fences(&[slot.in_flight])?;
            self.retired[slot.index] = true;
        }

        let (image_index, acquire_suboptimal) = match lifecycle.acquire(device, slot.image_available)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date at acquire, rebuilding");
                self.framebuffer_resized = false;
                let rebuild = lifecycle.rebuild(device, factory, extent)?;
                return Ok(FrameOutcome::Aborted { rebuild });
            }
        };

        let epoch = lifecycle.epoch_mut()?;
        if let Some(owner) = epoch.image_fences.owner(image_index) {
            if owner != slot.in_flight {
                device.wait_for_fences(&[owner])?;
            }
        }
        epoch.image_fences.claim(image_index, slot.in_flight)?;

        let commands = record_frame(epoch, image_index, inputs)?;
        let command_buffer = epoch.command_buffer(image_index)?;
        device.record(command_buffer, &commands)?;

        device.reset_fence(slot.in_flight)?;
        self.retired[slot.index] = false;
        device.submit(&Submission {
            command_buffer,
            wait_semaphore: slot.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.render_finished,
            fence: slot.in_flight,
        })?;

        let present = lifecycle.present(device, image_index, slot.render_finished)?;
        if acquire_suboptimal || present == PresentOutcome::Suboptimal {
            log::warn!("Swapchain suboptimal for {}x{}", extent.width, extent.height);
        }
        let late_rebuild = if present.needs_rebuild() || acquire_suboptimal || self.framebuffer_resized {
            log::debug!(
                "Rebuilding after present ({:?}, acquire suboptimal: {}, resized: {})",
                present,
                acquire_suboptimal,
                self.framebuffer_resized
            );
            self.framebuffer_resized = false;
            Some(lifecycle.rebuild(device, factory, extent)?)
        } else {
            None
        };

        self.current_frame = (self.current_frame + 1) % self.slots.len();

        Ok(FrameOutcome::Presented {
            slot: slot.index,
            image_index,
            rebuild: late_rebuild.or(early_rebuild),
        })
    }

    /// Block until every slot's last submission has retired
    ///
    /// Fences already waited on since their last submission are skipped, and
    /// the next tick on a slot waited here does not wait again.
    pub fn wait_all_in_flight<D: GpuDevice>(&mut self, device: &D) -> VulkanResult<()> {
        let fences: Vec<vk::Fence> = self
            .slots
            .in_flight_fences()
            .into_iter()
            .zip(&self.retired)
            .filter(|(_, &retired)| !retired)
            .map(|(fence, _)| fence)
            .collect();
        if fences.is_empty() {
            return Ok(());
        }
        device.wait_for_fences(&fences)?;
        self.retired.iter_mut().for_each(|retired| *retired = true);
        Ok(())
    }

    /// Destroy the slots; the caller guarantees the device is idle
    pub fn destroy<D: GpuDevice>(&mut self, device: &D) {
        self.slots.destroy(device);
        self.retired.clear();
    }
}
