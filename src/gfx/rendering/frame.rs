//! CPU half of a frame
//!
//! Every pass records its draws into a [`ShaderProgram`] before any GPU pass
//! is encoded. [`record_frame`] does that recording for all passes in
//! [`FRAME_STAGES`] order, and the encoders read their labels and
//! clear/load operations from the same stages.

use crate::gfx::camera::Camera;
use crate::gfx::resources::material::{MaterialFilter, MaterialType};
use crate::gfx::scene::Scene;
use crate::gfx::shader::ShaderProgram;

use super::ibl::IblMaps;
use super::main_pass::{upload_pbr_frame, upload_phong_frame, FrameUniforms, LightRig, ShadowInputs};
use super::settings::RenderSettings;

/// One step of the frame, in submission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    ShadowDepth,
    Phong,
    PbrOverlay,
    Resolve,
}

pub const FRAME_STAGES: [FrameStage; 4] = [
    FrameStage::ShadowDepth,
    FrameStage::Phong,
    FrameStage::PbrOverlay,
    FrameStage::Resolve,
];

impl FrameStage {
    pub fn label(self) -> &'static str {
        match self {
            FrameStage::ShadowDepth => "Shadow Depth Pass",
            FrameStage::Phong => "Phong Pass",
            FrameStage::PbrOverlay => "PBR Overlay Pass",
            FrameStage::Resolve => "MSAA Resolve Pass",
        }
    }

    /// Nodes the stage draws; `None` for stages that draw no geometry
    pub fn filter(self) -> Option<MaterialFilter> {
        match self {
            FrameStage::ShadowDepth => Some(MaterialFilter::All),
            FrameStage::Phong => Some(MaterialFilter::Only(MaterialType::Phong)),
            FrameStage::PbrOverlay => Some(MaterialFilter::Only(MaterialType::Pbr)),
            FrameStage::Resolve => None,
        }
    }

    /// Whether the stage clears its colour attachment instead of loading it
    pub fn clears_color(self) -> bool {
        matches!(self, FrameStage::Phong)
    }

    /// Whether the stage clears its depth attachment instead of loading it
    pub fn clears_depth(self) -> bool {
        matches!(self, FrameStage::ShadowDepth | FrameStage::Phong)
    }
}

/// Programs a frame records into; a missing program skips its stage
#[derive(Default)]
pub struct FramePrograms<'a> {
    pub shadow: Option<&'a mut dyn ShaderProgram>,
    pub phong: Option<&'a mut dyn ShaderProgram>,
    pub pbr: Option<&'a mut dyn ShaderProgram>,
}

/// Per-frame inputs that do not come from the camera
pub struct FrameInputs<'a> {
    pub shadow: ShadowInputs,
    pub ibl: Option<&'a IblMaps>,
    pub settings: &'a RenderSettings,
}

/// Records the draws of every geometry stage and returns the stages recorded
///
/// The spot light is moved onto the camera before anything is uploaded.
pub fn record_frame(
    scene: &mut Scene,
    programs: FramePrograms<'_>,
    camera: &dyn Camera,
    lights: &mut LightRig,
    inputs: &FrameInputs<'_>,
) -> Vec<FrameStage> {
    lights.spot.follow(camera.position(), camera.front());
    let frame = FrameUniforms::from_camera(camera);

    let FramePrograms {
        mut shadow,
        mut phong,
        mut pbr,
    } = programs;

    let mut recorded = Vec::with_capacity(FRAME_STAGES.len());
    for stage in FRAME_STAGES {
        let Some(filter) = stage.filter() else {
            continue;
        };
        let shader = match stage {
            FrameStage::ShadowDepth => shadow.as_deref_mut(),
            FrameStage::Phong => phong.as_deref_mut(),
            FrameStage::PbrOverlay => pbr.as_deref_mut(),
            FrameStage::Resolve => None,
        };
        let Some(shader) = shader else {
            continue;
        };

        shader.activate();
        match stage {
            FrameStage::ShadowDepth => shader.set_mat4("lightSpaceMatrix", &inputs.shadow.light_space),
            FrameStage::Phong => upload_phong_frame(shader, &frame, lights, &inputs.shadow, inputs.settings),
            FrameStage::PbrOverlay => upload_pbr_frame(shader, &frame, lights, inputs.ibl, inputs.settings),
            FrameStage::Resolve => {}
        }
        scene.render_scene(shader, filter);
        recorded.push(stage);
    }
    recorded
}
