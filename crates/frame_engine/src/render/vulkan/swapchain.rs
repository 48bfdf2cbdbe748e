//! Swapchain support queries and creation
//!
//! The `choose_*` helpers are pure so they can be tested without a device.

use ash::vk;

use super::context::VulkanContext;
use crate::render::backend::SwapchainImages;
use crate::render::error::{VulkanError, VulkanResult};

/// What the surface supports on the selected physical device
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Surface capabilities
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format/color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Query support for the context's surface
    pub fn query(context: &VulkanContext) -> VulkanResult<Self> {
        let physical = context.physical_device().device;
        let surface = context.surface();
        let loader = context.surface_loader();
        unsafe {
            Ok(Self {
                capabilities: loader.get_physical_device_surface_capabilities(physical, surface)?,
                formats: loader.get_physical_device_surface_formats(physical, surface)?,
                present_modes: loader.get_physical_device_surface_present_modes(physical, surface)?,
            })
        }
    }
}

/// Prefer B8G8R8A8_SRGB with sRGB non-linear color space, else the first reported
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::InitializationFailed("surface reports no formats".to_string()))
}

/// Prefer MAILBOX; FIFO is always available
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's current extent unless the window manager lets us pick
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: requested
            .width
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: requested
            .height
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Create a swapchain sized for `requested`
pub fn create_swapchain(context: &VulkanContext, requested: vk::Extent2D) -> VulkanResult<SwapchainImages> {
    let support = SwapchainSupport::query(context)?;
    let surface_format = choose_surface_format(&support.formats)?;
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = choose_extent(&support.capabilities, requested);
    if extent.width == 0 || extent.height == 0 {
        return Err(VulkanError::InvalidOperation {
            reason: format!("surface reports a {}x{} extent", extent.width, extent.height),
        });
    }
    let image_count = choose_image_count(&support.capabilities);

    let families = [context.graphics_family(), context.present_family()];
    let builder = vk::SwapchainCreateInfoKHR::builder()
        .surface(context.surface())
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .pre_transform(support.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true);

    let create_info = if families[0] != families[1] {
        builder
            .image_sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(&families)
    } else {
        builder.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
    };

    let loader = context.swapchain_loader();
    let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
    let images = match unsafe { loader.get_swapchain_images(swapchain) } {
        Ok(images) => images,
        Err(e) => {
            unsafe { loader.destroy_swapchain(swapchain, None) };
            return Err(e.into());
        }
    };

    log::debug!(
        "Swapchain {}x{} with {} images ({:?}, {:?})",
        extent.width,
        extent.height,
        images.len(),
        surface_format.format,
        present_mode
    );

    Ok(SwapchainImages {
        swapchain,
        images,
        format: surface_format.format,
        extent,
    })
}

/// Create one 2D color view per image, destroying any already made on failure
pub fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> VulkanResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        match unsafe { device.create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(e) => {
                for view in views {
                    unsafe { device.destroy_image_view(view, None) };
                }
                return Err(e.into());
            }
        }
    }
    Ok(views)
}
