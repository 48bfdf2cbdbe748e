//! [`ResourceFactory`] backed by the Vulkan context

use ash::vk;
use std::rc::Rc;

use super::command_pool::CommandPool;
use super::context::VulkanContext;
use super::descriptor::{write_image_sampler, DescriptorPool, DescriptorSetLayout};
use super::pipeline::{create_graphics_pipeline, load_spirv};
use super::render_pass;
use super::swapchain;
use super::texture::{Texture, TexturePixels};
use crate::config::RendererConfig;
use crate::render::backend::{PipelineHandles, ResourceFactory, SwapchainImages};
use crate::render::error::VulkanResult;

/// Owns the long-lived objects swapchain resources are built from
///
/// Fields drop in declaration order; the context goes last.
pub struct VulkanResourceFactory {
    texture: Texture,
    descriptor_pool: DescriptorPool,
    descriptor_set_layout: DescriptorSetLayout,
    command_pool: CommandPool,
    vertex_spirv: Vec<u32>,
    fragment_spirv: Vec<u32>,
    context: Rc<VulkanContext>,
}

impl VulkanResourceFactory {
    /// Load shaders and the texture, and create the pools
    pub fn new(context: Rc<VulkanContext>, config: &RendererConfig) -> VulkanResult<Self> {
        let vertex_spirv = load_spirv(config.shaders.vertex_path())?;
        let fragment_spirv = load_spirv(config.shaders.fragment_path())?;

        let device = context.device();
        let command_pool = CommandPool::new(device, context.graphics_family(), context.graphics_queue())?;
        let descriptor_set_layout = DescriptorSetLayout::new(device)?;
        let descriptor_pool = DescriptorPool::new(device, 1)?;

        let pixels = match &config.texture_path {
            Some(path) => TexturePixels::load(path)?,
            None => TexturePixels::white(),
        };
        let texture = Texture::new(&context, &command_pool, &pixels)?;

        Ok(Self {
            texture,
            descriptor_pool,
            descriptor_set_layout,
            command_pool,
            vertex_spirv,
            fragment_spirv,
            context,
        })
    }
}

impl ResourceFactory for VulkanResourceFactory {
    fn surface_extent(&mut self, requested: vk::Extent2D) -> VulkanResult<vk::Extent2D> {
        let support = swapchain::SwapchainSupport::query(&self.context)?;
        Ok(swapchain::choose_extent(&support.capabilities, requested))
    }

    fn create_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<SwapchainImages> {
        swapchain::create_swapchain(&self.context, extent)
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        unsafe { self.context.swapchain_loader().destroy_swapchain(swapchain, None) };
    }

    fn create_image_views(&mut self, images: &[vk::Image], format: vk::Format) -> VulkanResult<Vec<vk::ImageView>> {
        swapchain::create_image_views(self.context.device(), images, format)
    }

    fn destroy_image_views(&mut self, views: &[vk::ImageView]) {
        for &view in views {
            unsafe { self.context.device().destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(&mut self, format: vk::Format) -> VulkanResult<vk::RenderPass> {
        render_pass::create_render_pass(self.context.device(), format)
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        unsafe { self.context.device().destroy_render_pass(render_pass, None) };
    }

    fn create_pipeline(&mut self, render_pass: vk::RenderPass, extent: vk::Extent2D) -> VulkanResult<PipelineHandles> {
        create_graphics_pipeline(
            self.context.device(),
            render_pass,
            extent,
            self.descriptor_set_layout.handle(),
            &self.vertex_spirv,
            &self.fragment_spirv,
        )
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandles) {
        unsafe {
            self.context.device().destroy_pipeline(pipeline.pipeline, None);
            self.context.device().destroy_pipeline_layout(pipeline.layout, None);
        }
    }

    fn create_framebuffers(
        &mut self,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        render_pass::create_framebuffers(self.context.device(), render_pass, views, extent)
    }

    fn destroy_framebuffers(&mut self, framebuffers: &[vk::Framebuffer]) {
        for &framebuffer in framebuffers {
            unsafe { self.context.device().destroy_framebuffer(framebuffer, None) };
        }
    }

    fn allocate_command_buffers(&mut self, count: usize) -> VulkanResult<Vec<vk::CommandBuffer>> {
        self.command_pool.allocate(count as u32)
    }

    fn free_command_buffers(&mut self, command_buffers: &[vk::CommandBuffer]) {
        self.command_pool.free(command_buffers);
    }

    fn create_descriptor_set(&mut self) -> VulkanResult<vk::DescriptorSet> {
        let set = self.descriptor_pool.allocate(self.descriptor_set_layout.handle())?;
        write_image_sampler(self.context.device(), set, self.texture.view(), self.texture.sampler());
        Ok(set)
    }

    fn destroy_descriptor_set(&mut self, set: vk::DescriptorSet) {
        if let Err(e) = self.descriptor_pool.free(set) {
            log::warn!("Failed to free descriptor set: {}", e);
        }
    }
}
