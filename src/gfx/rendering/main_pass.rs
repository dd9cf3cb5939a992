//! Colour passes: Phong for every Phong node, then the PBR overlay
//!
//! Per-frame uniforms are written by free functions over [`ShaderProgram`],
//! so what each pass feeds its program can be checked without a GPU.

use cgmath::{Matrix4, Vector3};

use crate::gfx::camera::Camera;
use crate::gfx::resources::light::{
    upload_pbr_lights, upload_point_lights, DirectionalLight, PointLight, SpotLight,
};
use crate::gfx::resources::texture_store::{TextureId, TextureStore};
use crate::gfx::shader::programs::{self, POINT_LIGHT_COUNT};
use crate::gfx::shader::{GpuProgram, ShaderProgram};

use super::frame::FrameStage;
use super::ibl::IblMaps;
use super::msaa::MsaaCompositor;
use super::pipeline_manager::{PipelineConfig, PipelineManager};
use super::settings::RenderSettings;

/// Texture unit the shadow map is bound to in the Phong pass
///
/// Meshes bind their own textures to units `0..n` in list order, so a mesh
/// carrying every [`TextureKind`](crate::gfx::scene::mesh::TextureKind)
/// reaches unit 4. A low unit such as 3 would be rebound by the fourth mesh
/// texture mid-pass. Unit 8 sits above any mesh texture and below the IBL
/// units (10 to 12).
pub const SHADOW_MAP_UNIT: u32 = 8;

/// Camera state for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub camera_position: Vector3<f32>,
    pub camera_front: Vector3<f32>,
}

impl FrameUniforms {
    pub fn from_camera(camera: &dyn Camera) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            camera_position: camera.position(),
            camera_front: camera.front(),
        }
    }
}

/// Lights outside the scene graph; the directional light is derived from
/// the current brightness each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub point_lights: [PointLight; POINT_LIGHT_COUNT],
    pub spot: SpotLight,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            point_lights: PointLight::scene_defaults(),
            spot: SpotLight::default(),
        }
    }
}

/// Shadow inputs of the Phong pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowInputs {
    pub map: TextureId,
    pub light_space: Matrix4<f32>,
}

fn upload_camera(shader: &mut dyn ShaderProgram, frame: &FrameUniforms) {
    shader.set_mat4("projection", &frame.projection);
    shader.set_mat4("view", &frame.view);
    shader.set_vec3("viewPos", frame.camera_position);
}

/// Writes the camera, shadow, light and settings uniforms of the Phong pass
pub fn upload_phong_frame(
    shader: &mut dyn ShaderProgram,
    frame: &FrameUniforms,
    lights: &LightRig,
    shadow: &ShadowInputs,
    settings: &RenderSettings,
) {
    upload_camera(shader, frame);

    shader.set_mat4("lightSpaceMatrix", &shadow.light_space);
    shader.set_int("shadowMap", SHADOW_MAP_UNIT as i32);
    shader.bind_texture(SHADOW_MAP_UNIT, shadow.map);
    shader.set_bool("enableSoftShadows", settings.soft_shadows);
    shader.set_float("brightness", settings.brightness);

    DirectionalLight::with_brightness(settings.brightness).upload(shader);
    upload_point_lights(shader, &lights.point_lights);
    lights.spot.upload(shader);
}

/// Writes the camera, IBL, light and settings uniforms of the PBR overlay
pub fn upload_pbr_frame(
    shader: &mut dyn ShaderProgram,
    frame: &FrameUniforms,
    lights: &LightRig,
    ibl: Option<&IblMaps>,
    settings: &RenderSettings,
) {
    upload_camera(shader, frame);

    if let Some(ibl) = ibl {
        shader.set_int("irradianceMap", IblMaps::IRRADIANCE_UNIT as i32);
        shader.set_int("prefilterMap", IblMaps::PREFILTER_UNIT as i32);
        shader.set_int("brdfLUT", IblMaps::BRDF_LUT_UNIT as i32);
        shader.bind_texture(IblMaps::IRRADIANCE_UNIT, ibl.irradiance);
        shader.bind_texture(IblMaps::PREFILTER_UNIT, ibl.prefilter);
        shader.bind_texture(IblMaps::BRDF_LUT_UNIT, ibl.brdf_lut);
    }

    upload_pbr_lights(shader, &lights.point_lights);
    shader.set_float("brightness", settings.brightness);
    shader.set_float("u_NormalStrength", settings.normal_strength);
    shader.set_float("u_AOStrength", settings.ao_strength);
}

/// Owns the Phong and PBR programs and drives both colour passes
pub struct MainPass {
    phong: Option<GpuProgram>,
    pbr: Option<GpuProgram>,
    ibl: Option<IblMaps>,
}

impl MainPass {
    pub fn new(
        manager: &mut PipelineManager,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        ibl: Option<IblMaps>,
    ) -> Self {
        let phong = GpuProgram::new(
            manager,
            &programs::phong_program(),
            &PipelineConfig::color("Phong Pass", color_format, sample_count),
        );
        let pbr = GpuProgram::new(
            manager,
            &programs::pbr_program(),
            &PipelineConfig::color("PBR Pass", color_format, sample_count),
        );

        for program in [&phong, &pbr].into_iter().flatten() {
            if !program.is_compiled() {
                log::error!("Program '{}' failed to compile; its nodes will not draw", program.label());
            }
        }
        if ibl.is_none() {
            log::warn!("PBR pass running without IBL maps");
        }

        Self { phong, pbr, ibl }
    }

    pub fn is_compiled(&self) -> bool {
        [&self.phong, &self.pbr]
            .iter()
            .all(|p| p.as_ref().is_some_and(|p| p.is_compiled()))
    }

    /// Phong program, PBR program and IBL maps, borrowed for recording
    pub fn programs_mut(&mut self) -> (Option<&mut GpuProgram>, Option<&mut GpuProgram>, Option<&IblMaps>) {
        (self.phong.as_mut(), self.pbr.as_mut(), self.ibl.as_ref())
    }

    /// Uploads the recorded draws and encodes both passes into the
    /// multisampled target
    ///
    /// The Phong pass clears colour and depth; the PBR overlay loads them so
    /// its nodes depth-test against everything Phong drew.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        textures: &TextureStore,
        target: &MsaaCompositor,
        clear_color: wgpu::Color,
    ) {
        for (stage, program) in [
            (FrameStage::Phong, self.phong.as_mut()),
            (FrameStage::PbrOverlay, self.pbr.as_mut()),
        ] {
            let program = program.map(|program| {
                program.prepare(device, queue, textures);
                &*program
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(stage.label()),
                color_attachments: &[Some(target.color_attachment(stage.clears_color().then_some(clear_color)))],
                depth_stencil_attachment: Some(target.depth_attachment(stage.clears_depth())),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if let Some(program) = program {
                program.encode(&mut pass);
            }
        }
    }
}
