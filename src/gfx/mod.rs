//! # Graphics Module
//!
//! All graphics functionality of the renderer: camera, procedural geometry,
//! the scene graph, GPU resources, shader programs and the frame passes.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - First-person fly camera and its input controller
//! - **Geometry** ([`geometry`]) - Procedural primitives (plane, cube)
//! - **Scene Management** ([`scene`]) - Node arena, meshes, model loading
//! - **Resource Management** ([`resources`]) - Textures, lights and material blocks
//! - **Shader Programs** ([`shader`]) - Name-addressed uniforms and draw recording
//! - **Rendering Pipeline** ([`rendering`]) - Shadow, Phong, PBR/IBL and MSAA passes
//!
//! ## Usage
//!
//! ```no_run
//! use prism::gfx::{geometry::PrimitiveType, scene::Scene};
//!
//! // headless scenes work without a GPU context
//! let mut scene = Scene::new(None);
//! let floor = scene.create_primitive_node("Floor", PrimitiveType::Plane);
//! # let _ = floor;
//! ```

pub mod camera;
pub mod geometry;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod shader;

// Re-export commonly used types
pub use camera::FlyCamera;
pub use rendering::render_engine::RenderEngine;
pub use scene::Scene;
