//! [`GpuDevice`] over a real Vulkan device

use ash::vk;
use std::rc::Rc;

use super::context::VulkanContext;
use crate::render::backend::{GpuDevice, Submission};
use crate::render::commands::RenderCommand;
use crate::render::error::{AcquireOutcome, PresentOutcome, VulkanError, VulkanResult};

/// Frame-level device operations on the graphics and present queues
pub struct VulkanDevice {
    context: Rc<VulkanContext>,
    fence_timeout: u64,
}

impl VulkanDevice {
    /// Wrap a context; `fence_timeout` bounds every fence wait and acquire
    pub fn new(context: Rc<VulkanContext>, fence_timeout: u64) -> Self {
        Self { context, fence_timeout }
    }

    /// Shared context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    fn replay(&self, command_buffer: vk::CommandBuffer, command: &RenderCommand) {
        let device = self.context.device();
        unsafe {
            match *command {
                RenderCommand::BeginRenderPass {
                    render_pass,
                    framebuffer,
                    extent,
                    clear_color,
                } => {
                    let clear_values = [vk::ClearValue {
                        color: vk::ClearColorValue { float32: clear_color },
                    }];
                    let begin_info = vk::RenderPassBeginInfo::builder()
                        .render_pass(render_pass)
                        .framebuffer(framebuffer)
                        .render_area(vk::Rect2D {
                            offset: vk::Offset2D { x: 0, y: 0 },
                            extent,
                        })
                        .clear_values(&clear_values);
                    device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
                }
                RenderCommand::BindPipeline { pipeline } => {
                    device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
                }
                RenderCommand::BindDescriptorSet { layout, set } => {
                    device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        layout,
                        0,
                        &[set],
                        &[],
                    );
                }
                RenderCommand::PushConstants {
                    layout,
                    stages,
                    projection,
                } => {
                    device.cmd_push_constants(command_buffer, layout, stages, 0, projection.as_bytes());
                }
                RenderCommand::BindVertexBuffer { buffer, offset } => {
                    device.cmd_bind_vertex_buffers(command_buffer, 0, &[buffer], &[offset]);
                }
                RenderCommand::Draw {
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                } => {
                    device.cmd_draw(command_buffer, vertex_count, instance_count, first_vertex, first_instance);
                }
                RenderCommand::EndRenderPass => {
                    device.cmd_end_render_pass(command_buffer);
                }
            }
        }
    }
}

impl GpuDevice for VulkanDevice {
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.context.device().create_semaphore(&create_info, None) }.map_err(VulkanError::from)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.context.device().destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.context.device().create_fence(&create_info, None) }.map_err(VulkanError::from)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.context.device().destroy_fence(fence, None) };
    }

    fn wait_for_fences(&self, fences: &[vk::Fence]) -> VulkanResult<()> {
        unsafe { self.context.device().wait_for_fences(fences, true, self.fence_timeout) }.map_err(VulkanError::from)
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.context.device().reset_fences(&[fence]) }.map_err(VulkanError::from)
    }

    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, signal: vk::Semaphore) -> VulkanResult<AcquireOutcome> {
        let result = unsafe {
            self.context
                .swapchain_loader()
                .acquire_next_image(swapchain, self.fence_timeout, signal, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn record(&self, command_buffer: vk::CommandBuffer, commands: &[RenderCommand]) -> VulkanResult<()> {
        let device = self.context.device();
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::from)?;
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::from)?;
        }

        for command in commands {
            self.replay(command_buffer, command);
        }

        unsafe { device.end_command_buffer(command_buffer) }.map_err(VulkanError::from)
    }

    fn submit(&self, submission: &Submission) -> VulkanResult<()> {
        let wait_semaphores = [submission.wait_semaphore];
        let wait_stages = [submission.wait_stage];
        let command_buffers = [submission.command_buffer];
        let signal_semaphores = [submission.signal_semaphore];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], submission.fence)
        }
        .map_err(VulkanError::from)
    }

    fn present(&self, swapchain: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.context.device().device_wait_idle() }.map_err(VulkanError::from)
    }
}
