//! # Shader programs
//!
//! The scene graph talks to shaders through the [`ShaderProgram`] trait:
//! typed uniform setters addressed by dotted names, texture units, and an
//! indexed draw. Names are a fixed contract with the WGSL sources in
//! `gfx/rendering/shaders/`; renaming one side means renaming the other.
//!
//! [`UniformProgram`] records draws on the CPU and [`GpuProgram`] replays
//! them into a `wgpu::RenderPass`, so the traversal itself never touches the
//! GPU and can be tested without a device.

use cgmath::{Matrix3, Matrix4, Vector3};

use crate::gfx::resources::texture_store::TextureId;
use crate::gfx::scene::mesh::GeometryHandle;

pub mod gpu_program;
pub mod program;
pub mod programs;
pub mod uniform_layout;

pub use gpu_program::GpuProgram;
pub use program::{DrawCommand, UniformProgram};
pub use uniform_layout::{UniformKind, UniformLayout, UniformValue};

/// Dimension and sampling mode of a sampler binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Filterable 2D colour texture
    Color2d,
    /// Filterable cube map
    Cube,
    /// Depth texture read through a comparison sampler
    Depth,
}

/// A named sampler uniform in declaration order
///
/// Sampler `i` occupies bindings `2i` (texture) and `2i + 1` (sampler) of
/// bind group 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub kind: SamplerKind,
}

impl SamplerBinding {
    pub fn new(name: &str, kind: SamplerKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Everything needed to build a program: its name, uniform block and samplers
#[derive(Debug, Clone)]
pub struct ProgramDescriptor {
    pub label: String,
    pub shader_source: &'static str,
    pub layout: UniformLayout,
    pub samplers: Vec<SamplerBinding>,
    /// Depth-only programs have no fragment stage
    pub vertex_only: bool,
}

/// The uniform/draw contract the scene graph renders through
///
/// Setters with a name the program does not declare are ignored, as are
/// type mismatches. The caller must `activate` the program before a
/// traversal; uniform values persist from one activation to the next.
pub trait ShaderProgram {
    fn activate(&mut self);

    fn set_float(&mut self, name: &str, value: f32);
    fn set_int(&mut self, name: &str, value: i32);
    fn set_bool(&mut self, name: &str, value: bool);
    fn set_vec3(&mut self, name: &str, value: Vector3<f32>);
    fn set_mat3(&mut self, name: &str, value: &Matrix3<f32>);
    fn set_mat4(&mut self, name: &str, value: &Matrix4<f32>);

    /// Binds `texture` to texture `unit`; sampler uniforms select units via `set_int`
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Issues an indexed triangle-list draw with the current uniform state
    fn draw_indexed(&mut self, geometry: &GeometryHandle, index_count: u32);

    /// Advisory flag; false when the shader failed validation
    fn is_compiled(&self) -> bool;
}
