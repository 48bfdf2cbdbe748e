//! Per-frame command recording
//!
//! [`record_frame`] turns the current epoch, image index and frame inputs
//! into a flat list of [`RenderCommand`]s. It keeps no state between calls;
//! the device backend replays the list into a real command buffer.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use super::error::{VulkanError, VulkanResult};
use super::swapchain_lifecycle::SwapchainEpoch;
use crate::foundation::math::orthographic_projection;

/// Projection matrix pushed to the vertex stage, column-major
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProjectionPushConstant {
    /// Matrix columns
    pub columns: [[f32; 4]; 4],
}

impl ProjectionPushConstant {
    /// Size of the push constant range in bytes
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Projection for a framebuffer of the given extent
    pub fn for_extent(extent: vk::Extent2D) -> Self {
        let projection = orthographic_projection(extent.width as f32, extent.height as f32);
        Self {
            columns: projection.into(),
        }
    }

    /// Raw bytes for `vkCmdPushConstants`
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Shader stages that read the projection push constant
pub const PROJECTION_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;

/// Frame-independent state the recorder reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    /// Vertex arena buffer
    pub vertex_buffer: vk::Buffer,
    /// Vertices to draw from the start of the arena
    pub vertex_count: u32,
    /// Texture descriptor set
    pub descriptor_set: vk::DescriptorSet,
    /// Clear color for the render pass
    pub clear_color: [f32; 4],
}

/// One recorded command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    /// Begin the render pass on a framebuffer, clearing it
    BeginRenderPass {
        /// Render pass
        render_pass: vk::RenderPass,
        /// Target framebuffer
        framebuffer: vk::Framebuffer,
        /// Render area
        extent: vk::Extent2D,
        /// Clear color
        clear_color: [f32; 4],
    },
    /// Bind the graphics pipeline
    BindPipeline {
        /// Pipeline
        pipeline: vk::Pipeline,
    },
    /// Bind a descriptor set at set 0
    BindDescriptorSet {
        /// Pipeline layout
        layout: vk::PipelineLayout,
        /// Descriptor set
        set: vk::DescriptorSet,
    },
    /// Push the projection constant
    PushConstants {
        /// Pipeline layout
        layout: vk::PipelineLayout,
        /// Stages reading the constant
        stages: vk::ShaderStageFlags,
        /// Projection data
        projection: ProjectionPushConstant,
    },
    /// Bind a vertex buffer at binding 0
    BindVertexBuffer {
        /// Buffer
        buffer: vk::Buffer,
        /// Byte offset
        offset: vk::DeviceSize,
    },
    /// Non-indexed draw
    Draw {
        /// Vertices to draw
        vertex_count: u32,
        /// Instances to draw
        instance_count: u32,
        /// First vertex
        first_vertex: u32,
        /// First instance
        first_instance: u32,
    },
    /// End the render pass
    EndRenderPass,
}

/// Build the command sequence for one acquired image
pub fn record_frame(epoch: &SwapchainEpoch, image_index: u32, inputs: &FrameInputs) -> VulkanResult<Vec<RenderCommand>> {
    let framebuffer = epoch.framebuffer(image_index)?;
    let layout = epoch.pipeline.layout;

    if inputs.vertex_buffer == vk::Buffer::null() {
        return Err(VulkanError::InvalidOperation {
            reason: "no vertex buffer bound".to_string(),
        });
    }

    Ok(vec![
        RenderCommand::BeginRenderPass {
            render_pass: epoch.render_pass,
            framebuffer,
            extent: epoch.extent,
            clear_color: inputs.clear_color,
        },
        RenderCommand::BindPipeline {
            pipeline: epoch.pipeline.pipeline,
        },
        RenderCommand::BindDescriptorSet {
            layout,
            set: inputs.descriptor_set,
        },
        RenderCommand::PushConstants {
            layout,
            stages: PROJECTION_STAGES,
            projection: ProjectionPushConstant::for_extent(epoch.extent),
        },
        RenderCommand::BindVertexBuffer {
            buffer: inputs.vertex_buffer,
            offset: 0,
        },
        RenderCommand::Draw {
            vertex_count: inputs.vertex_count,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        },
        RenderCommand::EndRenderPass,
    ])
}
