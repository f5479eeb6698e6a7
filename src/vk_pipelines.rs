use core::slice;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use ash::{Device, vk};
use crate::vk_check;
use crate::vk_types::EngineError;

/// `<dir>/<name>.spv`, e.g. `shaders/triangle.vert.spv`
pub fn shader_path(shader_dir: &Path, name: &str) -> PathBuf {
    shader_dir.join(format!("{name}.spv"))
}

pub fn read_shader_code(file_path: &Path) -> Result<Vec<u32>, EngineError> {
    let mut file = std::fs::File::open(file_path).map_err(|source| EngineError::ShaderNotFound {
        path: file_path.to_path_buf(),
        source,
    })?;
    ash::util::read_spv(&mut file).map_err(|source| EngineError::InvalidShader {
        path: file_path.to_path_buf(),
        source,
    })
}

pub fn load_shader_module(file_path: &Path, device: &Device) -> Result<vk::ShaderModule, EngineError> {
    let byte_code_aligned = read_shader_code(file_path)?;
    let shader_create_info = vk::ShaderModuleCreateInfo::builder()
        .code(&byte_code_aligned)
        .build();

    vk_check!(unsafe {device.create_shader_module(&shader_create_info, None)}, "create_shader_module")
}

#[derive(Default)]
pub struct PipelineBuilder {
    pub shader_stages: Vec<vk::PipelineShaderStageCreateInfo>,
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo,
    pub rasterizer: vk::PipelineRasterizationStateCreateInfo,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub multisampling: vk::PipelineMultisampleStateCreateInfo,
    pub pipeline_layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
}


impl PipelineBuilder {
    pub fn build_pipeline(self, device: &Device) -> Result<vk::Pipeline, EngineError> {
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1)
            .build();

        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(slice::from_ref(&self.color_blend_attachment));

        //vertices are generated in the vertex shader, no vertex buffers
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default();

        //dynamic state setup
        let state = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

        let dynamic_info = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(&state)
            .build();

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&self.shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterizer)
            .multisample_state(&self.multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_info)
            .layout(self.pipeline_layout)
            .render_pass(self.render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {device.create_graphics_pipelines(vk::PipelineCache::null(), slice::from_ref(&pipeline_info), None)}
            .map_err(|(_, result)| EngineError::Vulkan { context: "create_graphics_pipelines", result })?;
        Ok(pipelines[0])
    }

    pub fn set_shaders(&mut self, vertex_shader: vk::ShaderModule, fragment_shader: vk::ShaderModule, vertex_entry: &CStr, fragment_entry: &CStr) {
        self.shader_stages.clear();
        self.shader_stages.push(vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader)
            .name(vertex_entry)
            .build());
        self.shader_stages.push(vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader)
            .name(fragment_entry)
            .build());
    }

    pub fn set_input_topology(&mut self, topology: vk::PrimitiveTopology) {
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = vk::FALSE;
    }

    pub fn set_polygon_mode(&mut self, mode: vk::PolygonMode) {
        self.rasterizer.polygon_mode = mode;
        self.rasterizer.line_width = 1f32;
    }

    pub fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) {
        self.rasterizer.cull_mode = cull_mode;
        self.rasterizer.front_face = front_face;
    }

    pub fn set_multisampling_none(&mut self) {
        self.multisampling.sample_shading_enable = vk::FALSE;
        //defaults to no multisampling
        self.multisampling.rasterization_samples = vk::SampleCountFlags::TYPE_1;
        self.multisampling.min_sample_shading = 1f32;
        //no alpha to coverage either
        self.multisampling.alpha_to_coverage_enable = vk::FALSE;
        self.multisampling.alpha_to_one_enable = vk::FALSE;
    }

    pub fn disable_blending(&mut self) {
        //default write mask
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        //no blending
        self.color_blend_attachment.blend_enable = vk::FALSE;
    }
}
