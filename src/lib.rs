//! Prism scene renderer
//!
//! A scene-graph renderer built on wgpu and winit. Nodes carry transforms,
//! meshes or models and a material block; each frame renders a shadow map,
//! a Phong pass, a PBR overlay lit by image based lighting, and resolves the
//! multisampled result onto the window.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::PrismApp;
pub use config::RendererConfig;
pub use error::{AssetError, ConfigError, SceneError};
