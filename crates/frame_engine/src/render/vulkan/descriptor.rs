//! Descriptor layout and pool for the texture sampler

use ash::{vk, Device};

use crate::render::error::VulkanResult;

/// Binding slot of the combined image sampler in the fragment shader
pub const SAMPLER_BINDING: u32 = 0;

/// Layout with a single fragment-stage combined image sampler
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Create the sampler layout
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(SAMPLER_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .build()];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        Ok(Self {
            layout,
            device: device.clone(),
        })
    }

    /// Vulkan handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_set_layout(self.layout, None) };
    }
}

/// Pool whose sets can be freed individually
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool sized for `max_sets` sampler sets
    pub fn new(device: &Device, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: max_sets,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate one set with `layout`
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info)? };
        sets.into_iter()
            .next()
            .ok_or(crate::render::error::VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY))
    }

    /// Return a set to the pool
    pub fn free(&self, set: vk::DescriptorSet) -> VulkanResult<()> {
        unsafe { self.device.free_descriptor_sets(self.pool, &[set])? };
        Ok(())
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
    }
}

/// Point `set` at a sampled image in shader-read layout
pub fn write_image_sampler(device: &Device, set: vk::DescriptorSet, view: vk::ImageView, sampler: vk::Sampler) {
    let image_infos = [vk::DescriptorImageInfo {
        sampler,
        image_view: view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }];
    let writes = [vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(SAMPLER_BINDING)
        .dst_array_element(0)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_infos)
        .build()];
    unsafe { device.update_descriptor_sets(&writes, &[]) };
}
