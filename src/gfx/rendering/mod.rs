//! Core rendering functionality
//!
//! Frame passes, their render targets, image based lighting and the runtime
//! render controls.

pub mod frame;
pub mod ibl;
pub mod main_pass;
pub mod msaa;
pub mod pipeline_manager;
pub mod render_engine;
pub mod settings;
pub mod shadow_pass;

// Re-export main types
pub use frame::{record_frame, FrameStage, FRAME_STAGES};
pub use main_pass::{FrameUniforms, LightRig, MainPass};
pub use msaa::MsaaCompositor;
pub use pipeline_manager::{PipelineConfig, PipelineManager};
pub use render_engine::RenderEngine;
pub use settings::{RenderSettings, SettingsDelta, SettingsInput};
pub use shadow_pass::ShadowPass;
