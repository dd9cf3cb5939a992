//! Depth-only render of the scene from the directional light

use cgmath::Matrix4;

use crate::gfx::resources::light::{light_space_matrix, DirectionalLight};
use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::resources::texture_store::{TextureId, TextureStore};
use crate::gfx::shader::{programs, GpuProgram, SamplerKind, ShaderProgram};

use super::frame::FrameStage;
use super::pipeline_manager::{PipelineConfig, PipelineManager};

/// Orthographic volume the shadow map covers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowVolume {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl ShadowVolume {
    /// Orthographic view-projection of `light` over this volume
    pub fn light_space(&self, light: &DirectionalLight) -> Matrix4<f32> {
        light_space_matrix(light.direction, self.half_extent, self.near, self.far)
    }
}

impl Default for ShadowVolume {
    fn default() -> Self {
        Self {
            half_extent: 15.0,
            near: 0.1,
            far: 30.0,
        }
    }
}

/// Owns the fixed-resolution shadow map and the depth program that fills it
///
/// The map is registered in the scene's texture store so the main pass can
/// bind it by id. Target creation runs in an error scope; a failure is
/// logged once and `is_complete()` stays false for the rest of the run while
/// frames keep rendering.
pub struct ShadowPass {
    map: TextureId,
    view: wgpu::TextureView,
    program: Option<GpuProgram>,
    volume: ShadowVolume,
    complete: bool,
}

impl ShadowPass {
    pub const DEFAULT_SIZE: u32 = 2048;

    pub fn new(
        manager: &mut PipelineManager,
        textures: &mut TextureStore,
        size: u32,
        volume: ShadowVolume,
    ) -> Self {
        let device = manager.device().clone();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let resource = TextureResource::create_shadow_map(&device, size);
        let mut complete = match pollster::block_on(device.pop_error_scope()) {
            Some(error) => {
                log::error!("Shadow map ({}x{}) is incomplete: {}", size, size, error);
                false
            }
            None => true,
        };

        let view = resource.view.clone();
        let map = textures.insert_resource("Shadow Map", SamplerKind::Depth, resource);

        let program = GpuProgram::new(manager, &programs::depth_program(), &PipelineConfig::shadow("Shadow Pass"));
        if !program.as_ref().is_some_and(|p| p.is_compiled()) {
            log::error!("Depth program unavailable; shadows disabled");
            complete = false;
        }

        log::info!("Shadow pass ready ({}x{})", size, size);
        Self {
            map,
            view,
            program,
            volume,
            complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Shadow map texture, bindable as a depth sampler
    pub fn texture(&self) -> TextureId {
        self.map
    }

    /// Light-space transform of `light` over this pass's volume
    pub fn light_space(&self, light: &DirectionalLight) -> Matrix4<f32> {
        self.volume.light_space(light)
    }

    /// Depth program the frame records into; `None` when it failed to build
    pub fn program_mut(&mut self) -> Option<&mut GpuProgram> {
        self.program.as_mut()
    }

    /// Uploads the recorded draws and encodes the depth pass
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        textures: &TextureStore,
    ) {
        let Some(program) = self.program.as_mut() else {
            return;
        };
        program.prepare(device, queue, textures);

        let stage = FrameStage::ShadowDepth;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(stage.label()),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.view,
                depth_ops: Some(wgpu::Operations {
                    load: if stage.clears_depth() {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        program.encode(&mut pass);
    }
}
