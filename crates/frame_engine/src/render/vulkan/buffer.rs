//! Buffers with dedicated memory and the host-visible vertex arena

use ash::{vk, Device};
use std::rc::Rc;

use super::context::VulkanContext;
use crate::render::backend::ArenaMemory;
use crate::render::error::{VulkanError, VulkanResult};
use crate::render::vertex::Vertex;

/// Buffer bound to its own memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind memory with `properties`
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };

        let memory = match Self::allocate_and_bind(context, buffer, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    fn allocate_and_bind(
        context: &VulkanContext,
        buffer: vk::Buffer,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<vk::DeviceMemory> {
        let device = context.device();
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = find_memory_type(context, requirements.memory_type_bits, properties)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe { device.allocate_memory(&alloc_info, None)? };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.free_memory(memory, None) };
            return Err(e.into());
        }
        Ok(memory)
    }

    /// Copy `bytes` to the start of the buffer through a temporary mapping
    pub fn write_bytes(&mut self, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::CapacityExceeded {
                requested: bytes.len(),
                capacity: self.size as usize,
            });
        }
        let mapped = MappedMemory::new(&self.device, self.memory, self.size)?;
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.ptr.cast::<u8>(), bytes.len()) };
        Ok(())
    }

    /// Vulkan handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Mapping released when dropped
struct MappedMemory<'a> {
    device: &'a Device,
    memory: vk::DeviceMemory,
    ptr: *mut std::ffi::c_void,
}

impl<'a> MappedMemory<'a> {
    fn new(device: &'a Device, memory: vk::DeviceMemory, size: vk::DeviceSize) -> VulkanResult<Self> {
        let ptr = unsafe { device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty())? };
        Ok(Self { device, memory, ptr })
    }
}

impl Drop for MappedMemory<'_> {
    fn drop(&mut self) {
        unsafe { self.device.unmap_memory(self.memory) };
    }
}

/// Find a memory type allowed by `type_filter` that has every flag in `properties`
pub fn find_memory_type(
    context: &VulkanContext,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let memory_properties = unsafe {
        context
            .instance()
            .get_physical_device_memory_properties(context.physical_device().device)
    };
    select_memory_type(&memory_properties, type_filter, properties).ok_or(VulkanError::NoSuitableMemoryType)
}

fn select_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        type_filter & (1 << i) != 0 && memory_properties.memory_types[i as usize].property_flags.contains(properties)
    })
}

/// Fixed-size host-visible, host-coherent vertex buffer
///
/// Sized once at startup and never reallocated. Holds the context so the
/// device outlives the buffer.
pub struct HostVertexArena {
    buffer: Buffer,
    capacity: usize,
    _context: Rc<VulkanContext>,
}

impl HostVertexArena {
    /// Allocate room for `capacity` vertices
    pub fn new(context: Rc<VulkanContext>, capacity: usize) -> VulkanResult<Self> {
        if capacity == 0 {
            return Err(VulkanError::InitializationFailed("vertex capacity must be non-zero".to_string()));
        }
        let size = (capacity * std::mem::size_of::<Vertex>()) as vk::DeviceSize;
        let buffer = Buffer::new(
            &context,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        log::debug!("Vertex arena: {} vertices ({} bytes)", capacity, size);

        Ok(Self {
            buffer,
            capacity,
            _context: context,
        })
    }
}

impl ArenaMemory for HostVertexArena {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn buffer(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    fn with_mapped<R>(&mut self, f: impl FnOnce(&mut [Vertex]) -> R) -> VulkanResult<R> {
        let mapped = MappedMemory::new(&self.buffer.device, self.buffer.memory, self.buffer.size)?;
        // Mapped pointers are aligned to minMemoryMapAlignment, which covers f32
        let vertices = unsafe { std::slice::from_raw_parts_mut(mapped.ptr.cast::<Vertex>(), self.capacity) };
        Ok(f(vertices))
    }
}
