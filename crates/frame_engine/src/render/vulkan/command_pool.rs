//! Graphics command pool

use ash::{vk, Device};

use crate::render::error::VulkanResult;

/// Pool for resettable primary command buffers on the graphics family
pub struct CommandPool {
    pool: vk::CommandPool,
    device: Device,
    queue: vk::Queue,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: &Device, queue_family: u32, queue: vk::Queue) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let pool = unsafe { device.create_command_pool(&create_info, None)? };

        Ok(Self {
            pool,
            device: device.clone(),
            queue,
        })
    }

    /// Allocate `count` primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        Ok(unsafe { self.device.allocate_command_buffers(&alloc_info)? })
    }

    /// Return command buffers to the pool
    pub fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if !command_buffers.is_empty() {
            unsafe { self.device.free_command_buffers(self.pool, command_buffers) };
        }
    }

    /// Record with `record`, submit, and block until the queue is idle
    pub fn execute_one_time(&self, record: impl FnOnce(&Device, vk::CommandBuffer)) -> VulkanResult<()> {
        let command_buffers = self.allocate(1)?;
        let result = self.submit_and_wait(command_buffers[0], record);
        self.free(&command_buffers);
        result
    }

    fn submit_and_wait(
        &self,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(&Device, vk::CommandBuffer),
    ) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(command_buffer, &begin_info)?;
            record(&self.device, command_buffer);
            self.device.end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
            self.device.queue_submit(self.queue, &[submit_info], vk::Fence::null())?;
            self.device.queue_wait_idle(self.queue)?;
        }
        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}
