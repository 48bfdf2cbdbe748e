//! SPIR-V loading and graphics pipeline creation

use ash::vk;
use ash::Device;
use std::fs::File;
use std::path::Path;

use crate::render::backend::PipelineHandles;
use crate::render::commands::{ProjectionPushConstant, PROJECTION_STAGES};
use crate::render::error::{VulkanError, VulkanResult};
use crate::render::vertex::Vertex;

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Read SPIR-V words from a compiled shader file
pub fn load_spirv(path: impl AsRef<Path>) -> VulkanResult<Vec<u32>> {
    let path = path.as_ref();
    log::debug!("Loading shader from {:?}", path);

    let mut file = File::open(path).map_err(|e| {
        log::error!("Failed to open shader file {:?}: {}", path, e);
        VulkanError::InitializationFailed(format!("Failed to open shader file {}: {}", path.display(), e))
    })?;

    ash::util::read_spv(&mut file)
        .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V in {}: {}", path.display(), e)))
}

/// Shader module destroyed when dropped
pub struct ShaderModule<'a> {
    device: &'a Device,
    module: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    /// Create a module from SPIR-V words
    pub fn new(device: &'a Device, code: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        Ok(Self { device, module })
    }

    /// Stage info for the `main` entry point
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

/// Build the triangle pipeline with a fixed viewport covering `extent`
///
/// The layout carries one descriptor set (the texture sampler) and the
/// projection push constant for the vertex stage.
pub fn create_graphics_pipeline(
    device: &Device,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    descriptor_set_layout: vk::DescriptorSetLayout,
    vertex_spirv: &[u32],
    fragment_spirv: &[u32],
) -> VulkanResult<PipelineHandles> {
    let vertex_module = ShaderModule::new(device, vertex_spirv)?;
    let fragment_module = ShaderModule::new(device, fragment_spirv)?;
    let stages = [
        vertex_module.stage_info(vk::ShaderStageFlags::VERTEX),
        fragment_module.stage_info(vk::ShaderStageFlags::FRAGMENT),
    ];

    let bindings = [Vertex::binding_description()];
    let attributes = Vertex::attribute_descriptions();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewports = [vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }];
    let scissors = [vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }];
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewports(&viewports)
        .scissors(&scissors);

    // Triangles come from user geometry with either winding
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::CLOCKWISE);

    let multisampling =
        vk::PipelineMultisampleStateCreateInfo::builder().rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build()];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&blend_attachments);

    let set_layouts = [descriptor_set_layout];
    let push_ranges = [vk::PushConstantRange {
        stage_flags: PROJECTION_STAGES,
        offset: 0,
        size: ProjectionPushConstant::SIZE,
    }];
    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_ranges);
    let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipelines = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) };
    match pipelines {
        Ok(pipelines) => match pipelines.first() {
            Some(&pipeline) => Ok(PipelineHandles { pipeline, layout }),
            None => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(VulkanError::InitializationFailed("no pipeline returned".to_string()))
            }
        },
        Err((_, e)) => {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            log::error!("Graphics pipeline creation failed: {:?}", e);
            Err(e.into())
        }
    }
}
