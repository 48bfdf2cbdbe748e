//! Recording mock of the GPU seams
//!
//! [`MockGpu`] hands out a [`MockDevice`] and [`MockFactory`] that share one
//! [`MockState`]. Every call is appended to a log so tests can assert on
//! ordering. Submissions retire instantly unless `gpu_stalled` is set, and
//! waiting on an unsignaled fence reports `Timeout` instead of hanging.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::vk::{self, Handle};

use crate::render::backend::{
    ArenaMemory, GpuDevice, PipelineHandles, ResourceFactory, Submission, SwapchainImages,
};
use crate::render::commands::RenderCommand;
use crate::render::error::{AcquireOutcome, PresentOutcome, VulkanError, VulkanResult};
use crate::render::swapchain_lifecycle::SwapchainEpoch;
use crate::render::sync::ImageFenceMap;
use crate::render::vertex::Vertex;

/// Swapchain-derived resource groups created by the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Swapchain,
    ImageViews,
    RenderPass,
    Pipeline,
    Framebuffers,
    CommandBuffers,
    DescriptorSet,
}

/// One logged call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateSemaphore(vk::Semaphore),
    DestroySemaphore(vk::Semaphore),
    CreateFence { fence: vk::Fence, signaled: bool },
    DestroyFence(vk::Fence),
    WaitForFences(Vec<vk::Fence>),
    ResetFence(vk::Fence),
    Acquire { swapchain: vk::SwapchainKHR, signal: vk::Semaphore },
    Record { command_buffer: vk::CommandBuffer, commands: Vec<RenderCommand> },
    Submit(Submission),
    Present { swapchain: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore },
    WaitIdle,
    Create(Resource),
    Destroy(Resource),
}

/// Shared mock state
#[derive(Debug, Default)]
pub struct MockState {
    calls: Vec<GpuCall>,
    next_handle: u64,
    fences: HashMap<vk::Fence, bool>,
    semaphores: HashSet<vk::Semaphore>,
    live: HashMap<Resource, i64>,
    next_image: u32,
    acquire_calls: usize,
    fences_created: usize,

    /// Images per swapchain
    pub image_count: usize,
    /// 1-based acquire calls that report a stale swapchain
    pub stale_acquires: HashSet<usize>,
    /// 1-based acquire calls that report suboptimal
    pub suboptimal_acquires: HashSet<usize>,
    /// Results for upcoming present calls; `Presented` once empty
    pub present_script: VecDeque<VulkanResult<PresentOutcome>>,
    /// Next factory call of this kind fails
    pub fail_next: Option<Resource>,
    /// Fence creation fails once this many fences exist
    pub fail_fence_creation_after: Option<usize>,
    /// Submissions never retire
    pub gpu_stalled: bool,
    /// Extent the surface reports instead of the requested one
    pub surface_extent: Option<vk::Extent2D>,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        0x1000 + self.next_handle
    }

    fn log(&mut self, call: GpuCall) {
        self.calls.push(call);
    }

    fn create(&mut self, resource: Resource) -> VulkanResult<()> {
        if self.fail_next == Some(resource) {
            self.fail_next = None;
            return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        *self.live.entry(resource).or_insert(0) += 1;
        self.log(GpuCall::Create(resource));
        Ok(())
    }

    fn destroy(&mut self, resource: Resource) {
        *self.live.entry(resource).or_insert(0) -= 1;
        self.log(GpuCall::Destroy(resource));
    }

    /// Every call so far
    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    /// Forget the call log
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Whether `fence` is currently signaled
    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.get(&fence).copied().unwrap_or(false)
    }

    /// Semaphores plus fences not yet destroyed
    pub fn live_sync_objects(&self) -> usize {
        self.semaphores.len() + self.fences.len()
    }

    /// Live count for one resource group
    pub fn live(&self, resource: Resource) -> i64 {
        self.live.get(&resource).copied().unwrap_or(0)
    }

    /// Live count across all resource groups
    pub fn live_resources(&self) -> i64 {
        self.live.values().sum()
    }

    /// Number of logged calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of submits
    pub fn submits(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::Submit(_)))
    }

    /// Number of presents
    pub fn presents(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::Present { .. }))
    }

    /// Commands from the most recent record call
    pub fn last_recorded(&self) -> Option<&[RenderCommand]> {
        self.calls.iter().rev().find_map(|call| match call {
            GpuCall::Record { commands, .. } => Some(commands.as_slice()),
            _ => None,
        })
    }

    /// Vertex count of every recorded draw, in order
    pub fn draw_counts(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::Record { commands, .. } => commands.iter().find_map(|command| match command {
                    RenderCommand::Draw { vertex_count, .. } => Some(*vertex_count),
                    _ => None,
                }),
                _ => None,
            })
            .collect()
    }
}

/// Owner of the shared state
#[derive(Clone)]
pub struct MockGpu {
    state: Rc<RefCell<MockState>>,
}

impl MockGpu {
    /// Mock whose swapchains have `image_count` images
    pub fn new(image_count: usize) -> Self {
        let state = MockState {
            image_count,
            ..MockState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn device(&self) -> MockDevice {
        MockDevice {
            state: Rc::clone(&self.state),
        }
    }

    pub fn factory(&self) -> MockFactory {
        MockFactory {
            state: Rc::clone(&self.state),
        }
    }

    pub fn state(&self) -> Ref<'_, MockState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }
}

/// [`GpuDevice`] backed by [`MockState`]
pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
}

impl GpuDevice for MockDevice {
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let mut state = self.state.borrow_mut();
        let semaphore = vk::Semaphore::from_raw(state.handle());
        state.semaphores.insert(semaphore);
        state.log(GpuCall::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state.borrow_mut();
        state.semaphores.remove(&semaphore);
        state.log(GpuCall::DestroySemaphore(semaphore));
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let mut state = self.state.borrow_mut();
        if state.fail_fence_creation_after == Some(state.fences_created) {
            return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        }
        state.fences_created += 1;
        let fence = vk::Fence::from_raw(state.handle());
        state.fences.insert(fence, signaled);
        state.log(GpuCall::CreateFence { fence, signaled });
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.borrow_mut();
        state.fences.remove(&fence);
        state.log(GpuCall::DestroyFence(fence));
    }

    fn wait_for_fences(&self, fences: &[vk::Fence]) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.log(GpuCall::WaitForFences(fences.to_vec()));
        if fences.iter().all(|fence| state.fence_signaled(*fence)) {
            Ok(())
        } else {
            Err(VulkanError::Timeout)
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.fences.insert(fence, false);
        state.log(GpuCall::ResetFence(fence));
        Ok(())
    }

    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, signal: vk::Semaphore) -> VulkanResult<AcquireOutcome> {
        let mut state = self.state.borrow_mut();
        state.acquire_calls += 1;
        state.log(GpuCall::Acquire { swapchain, signal });

        if state.stale_acquires.contains(&state.acquire_calls) {
            return Ok(AcquireOutcome::OutOfDate);
        }
        let image_index = state.next_image % state.image_count as u32;
        state.next_image += 1;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: state.suboptimal_acquires.contains(&state.acquire_calls),
        })
    }

    fn record(&self, command_buffer: vk::CommandBuffer, commands: &[RenderCommand]) -> VulkanResult<()> {
        self.state.borrow_mut().log(GpuCall::Record {
            command_buffer,
            commands: commands.to_vec(),
        });
        Ok(())
    }

    fn submit(&self, submission: &Submission) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let retired = !state.gpu_stalled;
        state.fences.insert(submission.fence, retired);
        state.log(GpuCall::Submit(*submission));
        Ok(())
    }

    fn present(&self, swapchain: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore) -> VulkanResult<PresentOutcome> {
        let mut state = self.state.borrow_mut();
        state.log(GpuCall::Present {
            swapchain,
            image_index,
            wait,
        });
        state.present_script.pop_front().unwrap_or(Ok(PresentOutcome::Presented))
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        self.state.borrow_mut().log(GpuCall::WaitIdle);
        Ok(())
    }
}

/// [`ResourceFactory`] backed by [`MockState`]
pub struct MockFactory {
    state: Rc<RefCell<MockState>>,
}

impl ResourceFactory for MockFactory {
    fn surface_extent(&mut self, requested: vk::Extent2D) -> VulkanResult<vk::Extent2D> {
        Ok(self.state.borrow().surface_extent.unwrap_or(requested))
    }

    fn create_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<SwapchainImages> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::Swapchain)?;
        state.next_image = 0;
        let swapchain = vk::SwapchainKHR::from_raw(state.handle());
        let images = (0..state.image_count).map(|_| vk::Image::from_raw(state.handle())).collect();
        Ok(SwapchainImages {
            swapchain,
            images,
            format: vk::Format::B8G8R8A8_SRGB,
            extent,
        })
    }

    fn destroy_swapchain(&mut self, _swapchain: vk::SwapchainKHR) {
        self.state.borrow_mut().destroy(Resource::Swapchain);
    }

    fn create_image_views(&mut self, images: &[vk::Image], _format: vk::Format) -> VulkanResult<Vec<vk::ImageView>> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::ImageViews)?;
        Ok(images.iter().map(|_| vk::ImageView::from_raw(state.handle())).collect())
    }

    fn destroy_image_views(&mut self, _views: &[vk::ImageView]) {
        self.state.borrow_mut().destroy(Resource::ImageViews);
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> VulkanResult<vk::RenderPass> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::RenderPass)?;
        Ok(vk::RenderPass::from_raw(state.handle()))
    }

    fn destroy_render_pass(&mut self, _render_pass: vk::RenderPass) {
        self.state.borrow_mut().destroy(Resource::RenderPass);
    }

    fn create_pipeline(&mut self, _render_pass: vk::RenderPass, _extent: vk::Extent2D) -> VulkanResult<PipelineHandles> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::Pipeline)?;
        Ok(PipelineHandles {
            pipeline: vk::Pipeline::from_raw(state.handle()),
            layout: vk::PipelineLayout::from_raw(state.handle()),
        })
    }

    fn destroy_pipeline(&mut self, _pipeline: PipelineHandles) {
        self.state.borrow_mut().destroy(Resource::Pipeline);
    }

    fn create_framebuffers(
        &mut self,
        _render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::Framebuffers)?;
        Ok(views.iter().map(|_| vk::Framebuffer::from_raw(state.handle())).collect())
    }

    fn destroy_framebuffers(&mut self, _framebuffers: &[vk::Framebuffer]) {
        self.state.borrow_mut().destroy(Resource::Framebuffers);
    }

    fn allocate_command_buffers(&mut self, count: usize) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::CommandBuffers)?;
        Ok((0..count).map(|_| vk::CommandBuffer::from_raw(state.handle())).collect())
    }

    fn free_command_buffers(&mut self, _command_buffers: &[vk::CommandBuffer]) {
        self.state.borrow_mut().destroy(Resource::CommandBuffers);
    }

    fn create_descriptor_set(&mut self) -> VulkanResult<vk::DescriptorSet> {
        let mut state = self.state.borrow_mut();
        state.create(Resource::DescriptorSet)?;
        Ok(vk::DescriptorSet::from_raw(state.handle()))
    }

    fn destroy_descriptor_set(&mut self, _set: vk::DescriptorSet) {
        self.state.borrow_mut().destroy(Resource::DescriptorSet);
    }
}

/// In-memory [`ArenaMemory`] that tracks mapping
#[derive(Debug)]
pub struct MockArena {
    storage: Vec<Vertex>,
    mapped: bool,
    map_count: usize,
    /// Next map attempt fails
    pub fail_next_map: bool,
}

impl MockArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![Vertex::default(); capacity],
            mapped: false,
            map_count: 0,
            fail_next_map: false,
        }
    }

    pub fn contents(&self) -> &[Vertex] {
        &self.storage
    }

    pub fn map_count(&self) -> usize {
        self.map_count
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl ArenaMemory for MockArena {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn buffer(&self) -> vk::Buffer {
        vk::Buffer::from_raw(0xA11)
    }

    fn with_mapped<R>(&mut self, f: impl FnOnce(&mut [Vertex]) -> R) -> VulkanResult<R> {
        if self.fail_next_map {
            self.fail_next_map = false;
            return Err(VulkanError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        assert!(!self.mapped, "arena mapped twice");
        self.mapped = true;
        self.map_count += 1;
        let result = f(&mut self.storage);
        self.mapped = false;
        Ok(result)
    }
}

/// A standalone epoch with distinct fake handles
pub fn sample_epoch(image_count: usize, extent: vk::Extent2D) -> SwapchainEpoch {
    let handles = |base: u64| (0..image_count as u64).map(move |i| base + i);
    SwapchainEpoch {
        generation: 0,
        swapchain: vk::SwapchainKHR::from_raw(0x10),
        images: handles(0x100).map(vk::Image::from_raw).collect(),
        format: vk::Format::B8G8R8A8_SRGB,
        extent,
        image_views: handles(0x200).map(vk::ImageView::from_raw).collect(),
        render_pass: vk::RenderPass::from_raw(0x20),
        pipeline: PipelineHandles {
            pipeline: vk::Pipeline::from_raw(0x30),
            layout: vk::PipelineLayout::from_raw(0x31),
        },
        framebuffers: handles(0x300).map(vk::Framebuffer::from_raw).collect(),
        command_buffers: handles(0x400).map(vk::CommandBuffer::from_raw).collect(),
        image_fences: ImageFenceMap::new(image_count),
    }
}
