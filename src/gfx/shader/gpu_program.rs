//! Replays recorded draws into a wgpu render pass

use std::collections::HashMap;

use cgmath::{Matrix3, Matrix4, Vector3};

use super::program::UniformProgram;
use super::{ProgramDescriptor, SamplerKind, ShaderProgram};
use crate::gfx::rendering::pipeline_manager::{PipelineConfig, PipelineManager};
use crate::gfx::resources::texture_store::{TextureId, TextureStore};
use crate::gfx::scene::mesh::GeometryHandle;
use crate::wgpu_utils::{
    binding_types, BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc, DynamicUniformBuffer,
};

/// A shader program backed by a wgpu pipeline
///
/// Uniform setters and draws go to the inner [`UniformProgram`]. After the
/// scene traversal, [`GpuProgram::prepare`] uploads the recorded uniform
/// snapshots and builds missing texture bind groups; [`GpuProgram::encode`]
/// then issues the draws into a render pass.
///
/// Bind group 0 holds the uniform block at a per-draw dynamic offset. Bind
/// group 1 holds the samplers, texture at binding `2i` and sampler at `2i + 1`.
pub struct GpuProgram {
    recorder: UniformProgram,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: BindGroupLayoutWithDesc,
    texture_layout: Option<BindGroupLayoutWithDesc>,
    uniforms: DynamicUniformBuffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_groups: HashMap<Vec<Option<TextureId>>, wgpu::BindGroup>,
    block_size: u64,
    compiled: bool,
}

impl GpuProgram {
    /// Compiles the program's shader and builds its pipeline
    ///
    /// Compilation failures are logged and leave `is_compiled()` false; the
    /// program still exists and can be driven, but draws nothing.
    pub fn new(
        manager: &mut PipelineManager,
        descriptor: &ProgramDescriptor,
        config: &PipelineConfig,
    ) -> Option<Self> {
        let device = manager.device().clone();
        let mut recorder = UniformProgram::new(descriptor);
        let block_size = descriptor.layout.size() as u64;

        let visibility = if descriptor.vertex_only {
            wgpu::ShaderStages::VERTEX
        } else {
            wgpu::ShaderStages::VERTEX_FRAGMENT
        };
        let uniform_layout = BindGroupLayoutBuilder::new()
            .next_binding(visibility, binding_types::uniform_dynamic(block_size))
            .create(&device, &format!("{} Uniform Layout", descriptor.label));

        let texture_layout = (!descriptor.samplers.is_empty()).then(|| {
            descriptor
                .samplers
                .iter()
                .fold(BindGroupLayoutBuilder::new(), |builder, sampler| match sampler.kind {
                    SamplerKind::Color2d => builder
                        .next_binding_fragment(binding_types::texture_2d())
                        .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering)),
                    SamplerKind::Cube => builder
                        .next_binding_fragment(binding_types::texture_cube())
                        .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering)),
                    SamplerKind::Depth => builder
                        .next_binding_fragment(binding_types::texture_depth_2d())
                        .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Comparison)),
                })
                .create(&device, &format!("{} Texture Layout", descriptor.label))
        });

        let shader_compiled = manager.load_shader(&descriptor.label, descriptor.shader_source);

        let mut layouts = vec![&uniform_layout.layout];
        if let Some(texture_layout) = &texture_layout {
            layouts.push(&texture_layout.layout);
        }
        let (pipeline, compiled) = manager.create_pipeline(&descriptor.label, config, &layouts)?;

        let uniforms = DynamicUniformBuffer::new(
            &device,
            &descriptor.label,
            recorder.stride() as u64 * 64,
        );
        let uniform_bind_group = BindGroupBuilder::new(&uniform_layout)
            .resource(uniforms.binding_resource(block_size))
            .create(&device, &format!("{} Uniform Bind Group", descriptor.label));

        recorder.set_compiled(shader_compiled && compiled);
        log::debug!(
            "Created program '{}' ({} byte uniform block, {} samplers)",
            descriptor.label,
            block_size,
            descriptor.samplers.len()
        );

        Some(Self {
            recorder,
            pipeline,
            uniform_layout,
            texture_layout,
            uniforms,
            uniform_bind_group,
            texture_bind_groups: HashMap::new(),
            block_size,
            compiled: shader_compiled && compiled,
        })
    }

    pub fn recorder(&self) -> &UniformProgram {
        &self.recorder
    }

    pub fn label(&self) -> &str {
        self.recorder.label()
    }

    /// Uploads this frame's uniform snapshots and creates missing texture bind groups
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, textures: &TextureStore) {
        if self.uniforms.upload(device, queue, self.recorder.arena()) {
            self.uniform_bind_group = BindGroupBuilder::new(&self.uniform_layout)
                .resource(self.uniforms.binding_resource(self.block_size))
                .create(device, &format!("{} Uniform Bind Group", self.recorder.label()));
        }

        let Some(texture_layout) = &self.texture_layout else {
            return;
        };
        for command in self.recorder.commands() {
            if self.texture_bind_groups.contains_key(&command.textures) {
                continue;
            }

            let resources: Option<Vec<_>> = self
                .recorder
                .samplers()
                .iter()
                .zip(&command.textures)
                .map(|(sampler, texture)| textures.resolve(*texture, sampler.kind))
                .collect();
            let Some(resources) = resources else {
                log::warn!("{}: no texture or fallback to bind, skipping", self.recorder.label());
                continue;
            };

            let bind_group = resources
                .into_iter()
                .fold(BindGroupBuilder::new(texture_layout), |builder, resource| {
                    builder.texture(&resource.view).sampler(&resource.sampler)
                })
                .create(device, &format!("{} Texture Bind Group", self.recorder.label()));
            self.texture_bind_groups.insert(command.textures.clone(), bind_group);
        }
    }

    /// Issues every recorded draw into `pass`
    ///
    /// Draws without GPU buffers or without a prepared texture bind group are
    /// skipped.
    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        if !self.compiled {
            return;
        }

        pass.set_pipeline(&self.pipeline);
        for command in self.recorder.commands() {
            let Some(buffers) = &command.buffers else {
                continue;
            };
            if self.texture_layout.is_some() {
                let Some(bind_group) = self.texture_bind_groups.get(&command.textures) else {
                    continue;
                };
                pass.set_bind_group(1, bind_group, &[]);
            }

            pass.set_bind_group(0, &self.uniform_bind_group, &[command.uniform_offset as u32]);
            pass.set_vertex_buffer(0, buffers.vertex_buffer.slice(..));
            pass.set_index_buffer(buffers.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..command.index_count, 0, 0..1);
        }
    }
}

impl ShaderProgram for GpuProgram {
    fn activate(&mut self) {
        self.recorder.activate();
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.recorder.set_float(name, value);
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.recorder.set_int(name, value);
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.recorder.set_bool(name, value);
    }

    fn set_vec3(&mut self, name: &str, value: Vector3<f32>) {
        self.recorder.set_vec3(name, value);
    }

    fn set_mat3(&mut self, name: &str, value: &Matrix3<f32>) {
        self.recorder.set_mat3(name, value);
    }

    fn set_mat4(&mut self, name: &str, value: &Matrix4<f32>) {
        self.recorder.set_mat4(name, value);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.recorder.bind_texture(unit, texture);
    }

    fn draw_indexed(&mut self, geometry: &GeometryHandle, index_count: u32) {
        self.recorder.draw_indexed(geometry, index_count);
    }

    fn is_compiled(&self) -> bool {
        self.compiled
    }
}
