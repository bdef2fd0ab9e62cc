use std::{ffi::CString, fs, io::Cursor, ops::Deref, path::Path, rc::Rc};

use anyhow::{bail, Context, Result};
use ash::{
    util::read_spv,
    vk::{
        BlendFactor, BlendOp, ColorComponentFlags, CullModeFlags, DescriptorSetLayout, DynamicState, Format, FrontFace,
        GraphicsPipelineCreateInfo, Pipeline, PipelineCache, PipelineColorBlendAttachmentState,
        PipelineColorBlendStateCreateInfo, PipelineDynamicStateCreateInfo,
        PipelineInputAssemblyStateCreateInfo, PipelineLayout, PipelineLayoutCreateInfo,
        PipelineMultisampleStateCreateInfo, PipelineRasterizationStateCreateInfo,
        PipelineRenderingCreateInfo, PipelineShaderStageCreateInfo,
        PipelineVertexInputStateCreateInfo, PipelineViewportStateCreateInfo, PolygonMode,
        PrimitiveTopology, PushConstantRange, SampleCountFlags, ShaderModule,
        ShaderModuleCreateInfo, ShaderStageFlags, VertexInputAttributeDescription,
        VertexInputBindingDescription,
    },
};
use tracing::debug;

use crate::{Guard, LogicalDeviceGuard, PNext, StructureChain};

/// Reads SPIR-V words from raw bytes, checking size and magic number.
pub(crate) fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    Ok(read_spv(&mut Cursor::new(bytes)).context("invalid SPIR-V")?)
}

/// RAII for ShaderModule
pub struct ShaderModuleGuard {
    shader_module: Guard<ShaderModule, LogicalDeviceGuard>,
}

impl ShaderModuleGuard {
    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>, bytes: &[u8]) -> Result<Self> {
        let code = parse_spirv(bytes)?;
        let create_info = ShaderModuleCreateInfo::builder().code(&code);
        let shader_module = unsafe { logical_device.create_shader_module(&create_info, None) }?;
        Ok(Self {
            shader_module: Guard::new(logical_device, shader_module),
        })
    }

    pub fn from_file(logical_device: &Rc<LogicalDeviceGuard>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        debug!("Loaded shader {}", path.display());
        Self::try_new(logical_device, &bytes)
    }
}

impl Deref for ShaderModuleGuard {
    type Target = ShaderModule;

    fn deref(&self) -> &Self::Target {
        &self.shader_module
    }
}

/// RAII for PipelineLayout
pub struct PipelineLayoutGuard {
    pipeline_layout: Guard<PipelineLayout, LogicalDeviceGuard>,
}

impl PipelineLayoutGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        set_layouts: &[DescriptorSetLayout],
        push_constant_ranges: &[PushConstantRange],
    ) -> Result<Rc<Self>> {
        let create_info = PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let pipeline_layout =
            unsafe { logical_device.create_pipeline_layout(&create_info, None) }?;
        Ok(Rc::new(Self {
            pipeline_layout: Guard::new(logical_device, pipeline_layout),
        }))
    }

    pub fn logical_device(&self) -> &Rc<LogicalDeviceGuard> {
        self.pipeline_layout.parent()
    }
}

impl Deref for PipelineLayoutGuard {
    type Target = PipelineLayout;

    fn deref(&self) -> &Self::Target {
        &self.pipeline_layout
    }
}

struct ShaderStage {
    stage: ShaderStageFlags,
    module: ShaderModule,
    entry_point: String,
}

/// Graphics pipeline for dynamic rendering: no render pass, attachment
/// formats are given up front and viewport and scissor are dynamic.
pub struct GraphicsPipelineBuilder {
    stages: Vec<ShaderStage>,
    vertex_bindings: Vec<VertexInputBindingDescription>,
    vertex_attributes: Vec<VertexInputAttributeDescription>,
    topology: PrimitiveTopology,
    cull_mode: CullModeFlags,
    front_face: FrontFace,
    color_attachment_formats: Vec<Format>,
    depth_attachment_format: Format,
    blend_enable: bool,
    dynamic_states: Vec<DynamicState>,
    next: PNext,
}

impl Default for GraphicsPipelineBuilder {
    fn default() -> Self {
        Self {
            stages: vec![],
            vertex_bindings: vec![],
            vertex_attributes: vec![],
            topology: PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: CullModeFlags::BACK,
            front_face: FrontFace::CLOCKWISE,
            color_attachment_formats: vec![],
            depth_attachment_format: Format::UNDEFINED,
            blend_enable: false,
            dynamic_states: vec![DynamicState::VIEWPORT, DynamicState::SCISSOR],
            next: PNext::default(),
        }
    }
}

impl GraphicsPipelineBuilder {
    /// The module has to stay alive until [`build`](Self::build) returns.
    pub fn stage(mut self, stage: ShaderStageFlags, module: &ShaderModuleGuard, entry_point: &str) -> Self {
        self.stages.push(ShaderStage {
            stage,
            module: **module,
            entry_point: entry_point.to_owned(),
        });
        self
    }

    pub fn vertex_input(
        mut self,
        bindings: &[VertexInputBindingDescription],
        attributes: &[VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_bindings.extend_from_slice(bindings);
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn cull_mode(mut self, cull_mode: CullModeFlags, front_face: FrontFace) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    pub fn color_attachment_format(mut self, format: Format) -> Self {
        self.color_attachment_formats.push(format);
        self
    }

    pub fn depth_attachment_format(mut self, format: Format) -> Self {
        self.depth_attachment_format = format;
        self
    }

    pub fn alpha_blending(mut self, enabled: bool) -> Self {
        self.blend_enable = enabled;
        self
    }

    /// Chained after the rendering info the builder adds itself.
    pub fn next(mut self, next: impl Into<PNext>) -> Self {
        self.next = next.into();
        self
    }

    pub fn with_create_info<R>(
        &self,
        layout: PipelineLayout,
        f: impl FnOnce(&GraphicsPipelineCreateInfo) -> R,
    ) -> Result<R> {
        if self.stages.is_empty() {
            bail!("graphics pipeline needs at least one shader stage");
        }
        let entry_points = self
            .stages
            .iter()
            .map(|stage| CString::new(stage.entry_point.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let shader_stages = self
            .stages
            .iter()
            .zip(&entry_points)
            .map(|(stage, entry_point)| {
                PipelineShaderStageCreateInfo::builder()
                    .stage(stage.stage)
                    .module(stage.module)
                    .name(entry_point)
                    .build()
            })
            .collect::<Vec<_>>();

        let vertex_input_state = PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);
        let input_assembly_state =
            PipelineInputAssemblyStateCreateInfo::builder().topology(self.topology);
        // counts only, viewport and scissor are set while recording
        let viewport_state = PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization_state = PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face);
        let multisample_state = PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(SampleCountFlags::TYPE_1);

        let color_blend_attachment_states = self
            .color_attachment_formats
            .iter()
            .map(|_| {
                PipelineColorBlendAttachmentState::builder()
                    .color_write_mask(ColorComponentFlags::RGBA)
                    .blend_enable(self.blend_enable)
                    .src_color_blend_factor(BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(BlendOp::ADD)
                    .src_alpha_blend_factor(BlendFactor::ONE)
                    .dst_alpha_blend_factor(BlendFactor::ZERO)
                    .alpha_blend_op(BlendOp::ADD)
                    .build()
            })
            .collect::<Vec<_>>();
        let color_blend_state =
            PipelineColorBlendStateCreateInfo::builder().attachments(&color_blend_attachment_states);
        let dynamic_state =
            PipelineDynamicStateCreateInfo::builder().dynamic_states(&self.dynamic_states);

        // the caller's chain hangs off the end of the rendering info
        let rendering = StructureChain::new(chain![PipelineRenderingCreateInfo {
            p_next: self.next.value(),
            ..PipelineRenderingCreateInfo::builder()
                .color_attachment_formats(&self.color_attachment_formats)
                .depth_attachment_format(self.depth_attachment_format)
                .build()
        }]);

        let mut create_info = GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .build();
        create_info.p_next = rendering.as_ptr();

        Ok(f(&create_info))
    }

    pub fn build(self, layout: &Rc<PipelineLayoutGuard>) -> Result<PipelineGuard> {
        debug!("Creating graphics pipeline...");
        let logical_device = layout.logical_device();
        let pipelines = self.with_create_info(layout.pipeline_layout.handle(), |create_info| unsafe {
            logical_device.create_graphics_pipelines(
                PipelineCache::null(),
                std::slice::from_ref(create_info),
                None,
            )
        })?;
        let pipelines = pipelines.map_err(|(_, err)| err)?;
        let Some(&pipeline) = pipelines.first() else {
            bail!("driver returned no pipeline");
        };
        debug!("Graphics pipeline created");
        Ok(PipelineGuard {
            pipeline: Guard::new(logical_device, pipeline),
            layout: Rc::clone(layout),
        })
    }
}

/// RAII for Pipeline
pub struct PipelineGuard {
    pipeline: Guard<Pipeline, LogicalDeviceGuard>,
    // the layout has to outlive every pipeline built with it
    layout: Rc<PipelineLayoutGuard>,
}

impl PipelineGuard {
    pub fn layout(&self) -> &Rc<PipelineLayoutGuard> {
        &self.layout
    }
}

impl Deref for PipelineGuard {
    type Target = Pipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{c_void, CStr};

    use ash::vk::{self, Handle, StructureType};

    use super::*;

    fn builder() -> GraphicsPipelineBuilder {
        let mut builder = GraphicsPipelineBuilder::default().color_attachment_format(Format::B8G8R8A8_SRGB);
        builder.stages = vec![
            ShaderStage {
                stage: ShaderStageFlags::VERTEX,
                module: ShaderModule::from_raw(1),
                entry_point: "main".to_owned(),
            },
            ShaderStage {
                stage: ShaderStageFlags::FRAGMENT,
                module: ShaderModule::from_raw(2),
                entry_point: "frag_main".to_owned(),
            },
        ];
        builder
    }

    #[test]
    fn spirv_needs_whole_words_and_the_magic_number() {
        let words = parse_spirv(&[0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(words, vec![0x0723_0203, 0x0001_0000]);

        assert!(parse_spirv(&[0x03, 0x02, 0x23]).is_err());
        assert!(parse_spirv(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }

    #[test]
    fn rendering_info_sits_in_front_of_the_callers_chain() {
        let next = PNext::from(StructureChain::new(chain![
            vk::PipelineRasterizationStateCreateInfo::default()
        ]));
        let expected = next.value();
        let builder = builder()
            .depth_attachment_format(Format::D32_SFLOAT)
            .next(next);

        builder
            .with_create_info(PipelineLayout::from_raw(5), |create_info| {
                assert_eq!(create_info.s_type, StructureType::GRAPHICS_PIPELINE_CREATE_INFO);
                assert_eq!(create_info.layout, PipelineLayout::from_raw(5));
                assert_eq!(create_info.render_pass, vk::RenderPass::null());

                let rendering = unsafe { &*create_info.p_next.cast::<PipelineRenderingCreateInfo>() };
                assert_eq!(rendering.s_type, StructureType::PIPELINE_RENDERING_CREATE_INFO);
                assert_eq!(rendering.p_next, expected as *const c_void);
                assert_eq!(rendering.color_attachment_count, 1);
                assert_eq!(
                    unsafe { *rendering.p_color_attachment_formats },
                    Format::B8G8R8A8_SRGB
                );
                assert_eq!(rendering.depth_attachment_format, Format::D32_SFLOAT);
            })
            .unwrap();
    }

    #[test]
    fn stages_keep_their_entry_points() {
        builder()
            .with_create_info(PipelineLayout::null(), |create_info| {
                assert_eq!(create_info.stage_count, 2);
                let stages = unsafe { std::slice::from_raw_parts(create_info.p_stages, 2) };
                assert_eq!(stages[1].stage, ShaderStageFlags::FRAGMENT);
                assert_eq!(stages[1].module, ShaderModule::from_raw(2));
                let name = unsafe { CStr::from_ptr(stages[1].p_name) };
                assert_eq!(name.to_str().unwrap(), "frag_main");

                let dynamic_state = unsafe { &*create_info.p_dynamic_state };
                assert_eq!(dynamic_state.dynamic_state_count, 2);
                let color_blend = unsafe { &*create_info.p_color_blend_state };
                assert_eq!(color_blend.attachment_count, 1);
            })
            .unwrap();
    }

    #[test]
    fn a_pipeline_without_stages_is_an_error() {
        let result = GraphicsPipelineBuilder::default().with_create_info(PipelineLayout::null(), |_| ());
        assert!(result.is_err());
    }
}
