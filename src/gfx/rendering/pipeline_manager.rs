//! Render pipeline creation for the built-in shader programs
//!
//! Shader modules are compiled once per program label and cached. Module and
//! pipeline creation run inside a wgpu validation error scope, so a broken
//! shader is reported through `log` and flagged instead of aborting.

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::*;

use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::scene::vertex::Vertex3D;

/// Configuration for creating a render pipeline
///
/// Defines the render state a program draws with. Shader entry points are
/// always `vs_main` and `fs_main`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub cull_mode: Option<Face>,
    pub depth_format: Option<TextureFormat>,
    pub depth_bias: DepthBiasState,
    pub sample_count: u32,
    pub color_targets: Vec<Option<ColorTargetState>>,
    /// For the shadow pass
    pub vertex_only: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "Default Pipeline".to_string(),
            // the procedural plane is wound clockwise, so nothing is culled
            cull_mode: None,
            depth_format: Some(TextureResource::DEPTH_FORMAT),
            depth_bias: DepthBiasState::default(),
            sample_count: 1,
            color_targets: vec![Some(ColorTargetState {
                format: TextureFormat::Bgra8Unorm,
                blend: Some(BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
            vertex_only: false,
        }
    }
}

impl PipelineConfig {
    /// Colour pipeline writing into `format` with `sample_count` samples
    pub fn color(label: &str, format: TextureFormat, sample_count: u32) -> Self {
        Self {
            label: label.to_string(),
            sample_count,
            color_targets: vec![Some(ColorTargetState {
                format,
                blend: Some(BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
            ..Default::default()
        }
    }

    /// Depth-only pipeline rendering into the shadow map
    pub fn shadow(label: &str) -> Self {
        Self {
            label: label.to_string(),
            depth_format: Some(TextureResource::SHADOW_FORMAT),
            // slope-scaled bias against shadow acne
            depth_bias: DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
            color_targets: Vec::new(),
            vertex_only: true,
            ..Default::default()
        }
    }

}

/// Compiles shader modules and builds render pipelines
///
/// Provides:
/// - Shader module caching by name
/// - Validation error capture for modules and pipelines
/// - Per-shader compile status for the advisory `is_compiled` flag
pub struct PipelineManager {
    device: Arc<Device>,
    shader_modules: HashMap<String, ShaderModule>,
    compile_status: HashMap<String, bool>,
}

impl PipelineManager {
    /// Creates a new pipeline manager
    ///
    /// # Arguments
    /// * `device` - Shared wgpu device for creating resources
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            shader_modules: HashMap::new(),
            compile_status: HashMap::new(),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Compiles a WGSL shader module, reusing a cached one with the same name
    ///
    /// # Returns
    /// True when the module passed validation
    pub fn load_shader(&mut self, name: &str, source: &str) -> bool {
        if let Some(&compiled) = self.compile_status.get(name) {
            return compiled;
        }

        self.device.push_error_scope(ErrorFilter::Validation);
        let shader_module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        let compiled = match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => {
                log::error!("Shader '{}' failed to compile: {}", name, error);
                false
            }
            None => {
                log::debug!("Compiled shader '{}'", name);
                true
            }
        };

        self.shader_modules.insert(name.to_string(), shader_module);
        self.compile_status.insert(name.to_string(), compiled);
        compiled
    }

    pub fn is_compiled(&self, shader: &str) -> bool {
        self.compile_status.get(shader).copied().unwrap_or(false)
    }

    /// Creates a render pipeline for a loaded shader
    ///
    /// # Returns
    /// The pipeline and whether it passed validation, or `None` when the
    /// shader was never loaded
    pub fn create_pipeline(
        &self,
        shader: &str,
        config: &PipelineConfig,
        bind_group_layouts: &[&BindGroupLayout],
    ) -> Option<(RenderPipeline, bool)> {
        let Some(module) = self.shader_modules.get(shader) else {
            log::error!("Shader '{}' not found for pipeline '{}'", shader, config.label);
            return None;
        };

        self.device.push_error_scope(ErrorFilter::Validation);

        let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", config.label)),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        let fragment_state = if config.vertex_only {
            None
        } else {
            Some(FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &config.color_targets,
                compilation_options: PipelineCompilationOptions::default(),
            })
        };

        let depth_stencil = config.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: config.depth_bias,
        });

        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&config.label),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[Vertex3D::desc()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: fragment_state,
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: config.cull_mode,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: MultisampleState {
                count: config.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let valid = match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => {
                log::error!("Failed to create pipeline '{}': {}", config.label, error);
                false
            }
            None => true,
        };

        Some((pipeline, valid && self.is_compiled(shader)))
    }

    pub fn shader_count(&self) -> usize {
        self.shader_modules.len()
    }
}
