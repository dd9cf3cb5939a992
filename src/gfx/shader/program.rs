//! CPU-side recording of shader draws

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::{Matrix3, Matrix4, Vector3};

use super::uniform_layout::{UniformLayout, UniformValue};
use super::{ProgramDescriptor, SamplerBinding, ShaderProgram};
use crate::gfx::resources::texture_store::TextureId;
use crate::gfx::scene::mesh::{GeometryHandle, GeometryId, GpuGeometry};

/// Minimum dynamic uniform offset alignment guaranteed by wgpu's default limits
pub const UNIFORM_ALIGNMENT: usize = 256;

/// One recorded `draw_indexed` call
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub geometry: GeometryId,
    pub buffers: Option<Arc<GpuGeometry>>,
    pub index_count: u32,
    /// Byte offset of this draw's uniform snapshot in the program arena
    pub uniform_offset: usize,
    /// Texture feeding each sampler binding, in sampler declaration order
    pub textures: Vec<Option<TextureId>>,
}

/// Records uniform state and draws for a single shader program
///
/// Every `draw_indexed` copies the staging uniform block into an arena with a
/// 256 byte stride, ready to be uploaded as one dynamic-offset buffer.
pub struct UniformProgram {
    label: String,
    layout: UniformLayout,
    samplers: Vec<SamplerBinding>,
    sampler_lookup: HashMap<String, usize>,
    sampler_units: Vec<Option<u32>>,
    units: HashMap<u32, TextureId>,
    staging: Vec<u8>,
    arena: Vec<u8>,
    stride: usize,
    commands: Vec<DrawCommand>,
    compiled: bool,
}

impl UniformProgram {
    pub fn new(descriptor: &ProgramDescriptor) -> Self {
        let stride = descriptor.layout.size().div_ceil(UNIFORM_ALIGNMENT) * UNIFORM_ALIGNMENT;
        let sampler_lookup = descriptor
            .samplers
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        Self {
            label: descriptor.label.clone(),
            staging: vec![0; descriptor.layout.size()],
            layout: descriptor.layout.clone(),
            sampler_units: vec![None; descriptor.samplers.len()],
            samplers: descriptor.samplers.clone(),
            sampler_lookup,
            units: HashMap::new(),
            arena: Vec::new(),
            stride,
            commands: Vec::new(),
            compiled: true,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn samplers(&self) -> &[SamplerBinding] {
        &self.samplers
    }

    pub fn set_compiled(&mut self, compiled: bool) {
        self.compiled = compiled;
    }

    /// Draws recorded since the last `activate`
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// All uniform snapshots back to back, `stride()` bytes apart
    pub fn arena(&self) -> &[u8] {
        &self.arena
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The uniform block as it was when `command` was recorded
    pub fn snapshot(&self, command: &DrawCommand) -> &[u8] {
        let start = command.uniform_offset;
        &self.arena[start..start + self.layout.size()]
    }

    /// Reads a uniform value from the snapshot of a recorded draw
    pub fn recorded_value(&self, command: &DrawCommand, name: &str) -> Option<UniformValue> {
        self.layout.read(self.snapshot(command), name)
    }

    /// Reads a uniform value from the current staging block
    pub fn value(&self, name: &str) -> Option<UniformValue> {
        self.layout.read(&self.staging, name)
    }

    /// Texture unit currently selected for a sampler uniform
    pub fn sampler_unit(&self, name: &str) -> Option<u32> {
        self.sampler_lookup
            .get(name)
            .and_then(|&index| self.sampler_units[index])
    }

    fn write(&mut self, name: &str, value: UniformValue) {
        if !self.layout.write(&mut self.staging, name, value) {
            log::trace!("{}: ignoring uniform '{}'", self.label, name);
        }
    }
}

impl ShaderProgram for UniformProgram {
    fn activate(&mut self) {
        self.commands.clear();
        self.arena.clear();
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.write(name, UniformValue::Float(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        if let Some(&index) = self.sampler_lookup.get(name) {
            self.sampler_units[index] = u32::try_from(value).ok();
            return;
        }
        self.write(name, UniformValue::Int(value));
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.write(name, UniformValue::Bool(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vector3<f32>) {
        self.write(name, UniformValue::Vec3(value));
    }

    fn set_mat3(&mut self, name: &str, value: &Matrix3<f32>) {
        self.write(name, UniformValue::Mat3(*value));
    }

    fn set_mat4(&mut self, name: &str, value: &Matrix4<f32>) {
        self.write(name, UniformValue::Mat4(*value));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.units.insert(unit, texture);
    }

    fn draw_indexed(&mut self, geometry: &GeometryHandle, index_count: u32) {
        let uniform_offset = self.arena.len();
        self.arena.extend_from_slice(&self.staging);
        self.arena.resize(uniform_offset + self.stride, 0);

        let textures = self
            .sampler_units
            .iter()
            .map(|unit| unit.and_then(|u| self.units.get(&u).copied()))
            .collect();

        self.commands.push(DrawCommand {
            geometry: geometry.id(),
            buffers: geometry.buffers().cloned(),
            index_count,
            uniform_offset,
            textures,
        });
    }

    fn is_compiled(&self) -> bool {
        self.compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::shader::{SamplerKind, UniformKind};

    fn descriptor() -> ProgramDescriptor {
        ProgramDescriptor {
            label: "test".to_string(),
            shader_source: "",
            layout: UniformLayout::builder()
                .field("model", UniformKind::Mat4)
                .field("brightness", UniformKind::Float)
                .build(),
            samplers: vec![
                SamplerBinding::new("material.texture_diffuse", SamplerKind::Color2d),
                SamplerBinding::new("shadowMap", SamplerKind::Depth),
            ],
            vertex_only: false,
        }
    }

    #[test]
    fn test_draw_snapshots_uniforms() {
        let mut program = UniformProgram::new(&descriptor());
        let geometry = GeometryHandle::cpu_only();

        program.activate();
        program.set_float("brightness", 1.0);
        program.draw_indexed(&geometry, 6);
        program.set_float("brightness", 2.0);
        program.draw_indexed(&geometry, 3);

        let commands = program.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].uniform_offset, UNIFORM_ALIGNMENT);
        assert_eq!(
            program.recorded_value(&commands[0], "brightness"),
            Some(UniformValue::Float(1.0))
        );
        assert_eq!(
            program.recorded_value(&commands[1], "brightness"),
            Some(UniformValue::Float(2.0))
        );
        assert_eq!(commands[1].index_count, 3);
    }

    #[test]
    fn test_sampler_units_resolve_textures() {
        let mut program = UniformProgram::new(&descriptor());
        let geometry = GeometryHandle::cpu_only();
        let diffuse = TextureId::from_raw(4);
        let shadow = TextureId::from_raw(9);

        program.activate();
        program.set_int("material.texture_diffuse", 0);
        program.set_int("shadowMap", 8);
        program.bind_texture(0, diffuse);
        program.bind_texture(8, shadow);
        program.draw_indexed(&geometry, 6);

        assert_eq!(program.sampler_unit("shadowMap"), Some(8));
        assert_eq!(program.commands()[0].textures, vec![Some(diffuse), Some(shadow)]);
    }

    #[test]
    fn test_activate_clears_commands_but_keeps_values() {
        let mut program = UniformProgram::new(&descriptor());
        let geometry = GeometryHandle::cpu_only();

        program.activate();
        program.set_float("brightness", 1.5);
        program.draw_indexed(&geometry, 6);
        program.activate();

        assert!(program.commands().is_empty());
        assert!(program.arena().is_empty());
        assert_eq!(program.value("brightness"), Some(UniformValue::Float(1.5)));
    }

    #[test]
    fn test_unknown_uniforms_are_ignored() {
        let mut program = UniformProgram::new(&descriptor());
        program.set_float("material.metallic", 0.5);
        program.set_bool("useVelvet", true);

        assert_eq!(program.value("material.metallic"), None);
        assert_eq!(program.value("brightness"), Some(UniformValue::Float(0.0)));
    }
}
