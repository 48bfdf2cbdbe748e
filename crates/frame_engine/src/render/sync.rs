//! Frame slots and per-image fence ownership
//!
//! A [`FrameSlot`] bundles the semaphores and fence one frame in flight
//! needs. Slots are created once and reused every N frames; swapchain
//! rebuilds never touch them.
//!
//! [`ImageFenceMap`] remembers which slot fence last submitted work for each
//! swapchain image. The swapchain may hold more images than there are slots,
//! so the slot fence alone does not prove an image is idle.

use ash::vk;

use super::backend::GpuDevice;
use super::error::{VulkanError, VulkanResult};

/// Synchronization objects for one frame in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Signaled when the acquired image is ready to render into
    pub image_available: vk::Semaphore,
    /// Signaled when rendering completes, waited on by present
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's last submission retires
    pub in_flight: vk::Fence,
    /// Position in the ring
    pub index: usize,
}

impl FrameSlot {
    fn create<D: GpuDevice>(device: &D, index: usize) -> VulkanResult<Self> {
        let image_available = device.create_semaphore()?;
        let render_finished = match device.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(e) => {
                device.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        // Created signaled so the first wait on each slot returns immediately
        let in_flight = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_semaphore(render_finished);
                device.destroy_semaphore(image_available);
                return Err(e);
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
            index,
        })
    }

    fn destroy<D: GpuDevice>(self, device: &D) {
        device.destroy_fence(self.in_flight);
        device.destroy_semaphore(self.render_finished);
        device.destroy_semaphore(self.image_available);
    }
}

/// Fixed ring of frame slots
#[derive(Debug)]
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
}

impl FrameSlots {
    /// Create `count` slots
    pub fn new<D: GpuDevice>(device: &D, count: usize) -> VulkanResult<Self> {
        if count == 0 {
            return Err(VulkanError::InitializationFailed(
                "at least one frame slot is required".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(count);
        for index in 0..count {
            match FrameSlot::create(device, index) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in slots.drain(..) {
                        slot.destroy(device);
                    }
                    return Err(e);
                }
            }
        }

        log::debug!("Created {} frame slots", count);
        Ok(Self { slots })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the slots have been destroyed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot at `index`
    pub fn get(&self, index: usize) -> VulkanResult<FrameSlot> {
        self.slots.get(index).copied().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {} out of range ({} slots)", index, self.slots.len()),
        })
    }

    /// Every slot's in-flight fence
    pub fn in_flight_fences(&self) -> Vec<vk::Fence> {
        self.slots.iter().map(|slot| slot.in_flight).collect()
    }

    /// Destroy every slot; the caller guarantees the device is idle
    pub fn destroy<D: GpuDevice>(&mut self, device: &D) {
        for slot in self.slots.drain(..) {
            slot.destroy(device);
        }
    }
}

/// Image index to the fence of the frame that last rendered into it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFenceMap {
    owners: Vec<Option<vk::Fence>>,
}

impl ImageFenceMap {
    /// Map with every image unowned
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// Forget every owner and resize for a new image count
    pub fn reset(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }

    /// Number of tracked images
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no images are tracked
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Fence that last claimed `image_index`
    pub fn owner(&self, image_index: u32) -> Option<vk::Fence> {
        self.owners.get(image_index as usize).copied().flatten()
    }

    /// Record `fence` as the owner of `image_index`
    pub fn claim(&mut self, image_index: u32, fence: vk::Fence) -> VulkanResult<()> {
        let count = self.owners.len();
        let owner = self.owners.get_mut(image_index as usize).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("image index {} out of range ({} images)", image_index, count),
        })?;
        *owner = Some(fence);
        Ok(())
    }
}
