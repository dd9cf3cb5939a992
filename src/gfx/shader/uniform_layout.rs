//! Name-addressed uniform block layout
//!
//! Shaders are fed through dotted uniform names such as
//! `"pointLights[0].position"` or `"material.shininess"`. A [`UniformLayout`]
//! resolves every such name to a byte offset once, when the program is built,
//! so per-frame setters only do a hash lookup and a byte copy.
//!
//! Offsets follow the WGSL uniform address space rules: scalars align to 4,
//! `vec3`/`mat3x3`/`mat4x4` align to 16, and nested structs and arrays start on
//! a 16 byte boundary and occupy a multiple of 16 bytes. The WGSL struct
//! declaring the block must list its members in the same order as the builder
//! calls.

use std::collections::HashMap;

use cgmath::{Matrix3, Matrix4, Vector3};

/// Type of a single uniform member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    /// Stored as a `u32` (0 or 1); WGSL has no host-shareable bool
    Bool,
    Vec3,
    Mat3,
    Mat4,
}

impl UniformKind {
    pub const fn align(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Bool => 4,
            UniformKind::Vec3 | UniformKind::Mat3 | UniformKind::Mat4 => 16,
        }
    }

    pub const fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Bool => 4,
            UniformKind::Vec3 => 12,
            // three vec3 columns padded to 16 bytes each
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }

    /// Int and Bool share a representation, mirroring `glUniform1i`
    fn accepts(self, written: UniformKind) -> bool {
        self == written
            || matches!(
                (self, written),
                (UniformKind::Int, UniformKind::Bool) | (UniformKind::Bool, UniformKind::Int)
            )
    }
}

/// Resolved location of a uniform member inside the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: usize,
    pub kind: UniformKind,
}

/// A typed uniform value, used for writing and for reading snapshots back
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3(Vector3<f32>),
    Mat3(Matrix3<f32>),
    Mat4(Matrix4<f32>),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

/// Maps uniform names to byte offsets in a uniform block
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    slots: HashMap<String, UniformSlot>,
    size: usize,
}

impl UniformLayout {
    pub fn builder() -> UniformLayoutBuilder {
        UniformLayoutBuilder::default()
    }

    pub fn slot(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    /// Size of the whole block in bytes, rounded up to 16
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Writes `value` into `block` at the slot for `name`.
    ///
    /// Returns false when the name is unknown or the type does not match;
    /// the block is left untouched in that case.
    pub fn write(&self, block: &mut [u8], name: &str, value: UniformValue) -> bool {
        let Some(slot) = self.slot(name) else {
            return false;
        };
        if !slot.kind.accepts(value.kind()) {
            return false;
        }

        let o = slot.offset;
        match value {
            UniformValue::Float(v) => block[o..o + 4].copy_from_slice(&v.to_le_bytes()),
            UniformValue::Int(v) => block[o..o + 4].copy_from_slice(&v.to_le_bytes()),
            UniformValue::Bool(v) => block[o..o + 4].copy_from_slice(&(v as u32).to_le_bytes()),
            UniformValue::Vec3(v) => {
                let data: &[f32; 3] = v.as_ref();
                block[o..o + 12].copy_from_slice(bytemuck::cast_slice(data));
            }
            UniformValue::Mat3(m) => {
                for (column, c) in [m.x, m.y, m.z].iter().enumerate() {
                    let start = o + column * 16;
                    let data: &[f32; 3] = c.as_ref();
                    block[start..start + 12].copy_from_slice(bytemuck::cast_slice(data));
                }
            }
            UniformValue::Mat4(m) => {
                let data: &[f32; 16] = m.as_ref();
                block[o..o + 64].copy_from_slice(bytemuck::cast_slice(data));
            }
        }
        true
    }

    /// Reads the value stored for `name` from a block laid out by this layout
    pub fn read(&self, block: &[u8], name: &str) -> Option<UniformValue> {
        let slot = self.slot(name)?;
        let o = slot.offset;
        let f = |at: usize| f32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]]);
        let v3 = |at: usize| Vector3::new(f(at), f(at + 4), f(at + 8));

        let value = match slot.kind {
            UniformKind::Float => UniformValue::Float(f(o)),
            UniformKind::Int => {
                UniformValue::Int(i32::from_le_bytes([block[o], block[o + 1], block[o + 2], block[o + 3]]))
            }
            UniformKind::Bool => {
                UniformValue::Bool(u32::from_le_bytes([block[o], block[o + 1], block[o + 2], block[o + 3]]) != 0)
            }
            UniformKind::Vec3 => UniformValue::Vec3(v3(o)),
            UniformKind::Mat3 => UniformValue::Mat3(Matrix3::from_cols(v3(o), v3(o + 16), v3(o + 32))),
            UniformKind::Mat4 => {
                let mut data = [0.0f32; 16];
                for (i, slot) in data.iter_mut().enumerate() {
                    *slot = f(o + i * 4);
                }
                UniformValue::Mat4(*<&Matrix4<f32>>::from(&data))
            }
        };
        Some(value)
    }
}

fn round_up(align: usize, value: usize) -> usize {
    value.div_ceil(align) * align
}

/// Builder that assigns offsets in declaration order
#[derive(Debug, Default)]
pub struct UniformLayoutBuilder {
    slots: HashMap<String, UniformSlot>,
    offset: usize,
}

impl UniformLayoutBuilder {
    /// Adds a top-level member
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = round_up(kind.align(), self.offset);
        self.slots.insert(name.to_string(), UniformSlot { offset, kind });
        self.offset = offset + kind.size();
        self
    }

    /// Adds a nested struct member; members are addressed as `"name.member"`
    pub fn structure(mut self, name: &str, members: &[(&str, UniformKind)]) -> Self {
        let start = round_up(16, self.offset);
        let size = self.place_struct(start, name, members);
        self.offset = start + round_up(16, size);
        self
    }

    /// Adds an array of structs; members are addressed as `"name[i].member"`
    pub fn struct_array(mut self, name: &str, count: usize, members: &[(&str, UniformKind)]) -> Self {
        let start = round_up(16, self.offset);
        let stride = round_up(16, struct_size(members));
        for i in 0..count {
            self.place_struct(start + i * stride, &format!("{name}[{i}]"), members);
        }
        self.offset = start + stride * count;
        self
    }

    /// Adds an array of plain members addressed as `"name[i]"`.
    ///
    /// Uniform arrays need a 16 byte element stride, so scalar element types
    /// are padded to a full 16 bytes each (WGSL needs a wrapper struct for those).
    pub fn array(mut self, name: &str, count: usize, kind: UniformKind) -> Self {
        let start = round_up(16, self.offset);
        let stride = round_up(16, kind.size());
        for i in 0..count {
            self.slots.insert(
                format!("{name}[{i}]"),
                UniformSlot {
                    offset: start + i * stride,
                    kind,
                },
            );
        }
        self.offset = start + stride * count;
        self
    }

    pub fn build(self) -> UniformLayout {
        UniformLayout {
            slots: self.slots,
            size: round_up(16, self.offset.max(16)),
        }
    }

    fn place_struct(&mut self, start: usize, prefix: &str, members: &[(&str, UniformKind)]) -> usize {
        let mut offset = 0;
        for (member, kind) in members {
            offset = round_up(kind.align(), offset);
            self.slots.insert(
                format!("{prefix}.{member}"),
                UniformSlot {
                    offset: start + offset,
                    kind: *kind,
                },
            );
            offset += kind.size();
        }
        offset
    }
}

fn struct_size(members: &[(&str, UniformKind)]) -> usize {
    let mut offset = 0;
    let mut align = 4;
    for (_, kind) in members {
        offset = round_up(kind.align(), offset);
        offset += kind.size();
        align = align.max(kind.align());
    }
    round_up(align, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::SquareMatrix;

    const POINT_LIGHT: &[(&str, UniformKind)] = &[
        ("position", UniformKind::Vec3),
        ("ambient", UniformKind::Vec3),
        ("diffuse", UniformKind::Vec3),
        ("specular", UniformKind::Vec3),
        ("constant", UniformKind::Float),
        ("linear", UniformKind::Float),
        ("quadratic", UniformKind::Float),
    ];

    #[test]
    fn test_scalar_packing_after_vec3() {
        let layout = UniformLayout::builder()
            .field("viewPos", UniformKind::Vec3)
            .field("brightness", UniformKind::Float)
            .field("projection", UniformKind::Mat4)
            .build();

        // a scalar fills the padding behind a vec3, like WGSL
        assert_eq!(layout.slot("viewPos").unwrap().offset, 0);
        assert_eq!(layout.slot("brightness").unwrap().offset, 12);
        assert_eq!(layout.slot("projection").unwrap().offset, 16);
        assert_eq!(layout.size(), 80);
    }

    #[test]
    fn test_struct_array_offsets() {
        let layout = UniformLayout::builder()
            .field("brightness", UniformKind::Float)
            .struct_array("pointLights", 2, POINT_LIGHT)
            .build();

        // PointLight is 72 bytes of members, padded to an 80 byte stride
        assert_eq!(layout.slot("pointLights[0].position").unwrap().offset, 16);
        assert_eq!(layout.slot("pointLights[0].specular").unwrap().offset, 64);
        assert_eq!(layout.slot("pointLights[0].constant").unwrap().offset, 76);
        assert_eq!(layout.slot("pointLights[0].quadratic").unwrap().offset, 84);
        assert_eq!(layout.slot("pointLights[1].position").unwrap().offset, 96);
        assert_eq!(layout.size(), 176);
    }

    #[test]
    fn test_small_struct_occupies_sixteen_bytes() {
        let layout = UniformLayout::builder()
            .structure(
                "material",
                &[("shininess", UniformKind::Float), ("opacity", UniformKind::Float)],
            )
            .field("hasDiffuseTexture", UniformKind::Bool)
            .build();

        assert_eq!(layout.slot("material.opacity").unwrap().offset, 4);
        assert_eq!(layout.slot("hasDiffuseTexture").unwrap().offset, 16);
    }

    #[test]
    fn test_write_and_read_back() {
        let layout = UniformLayout::builder()
            .field("model", UniformKind::Mat4)
            .field("normalMatrix", UniformKind::Mat3)
            .field("enableSoftShadows", UniformKind::Bool)
            .array("lightColors", 2, UniformKind::Vec3)
            .build();
        let mut block = vec![0u8; layout.size()];

        let model = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let normal = Matrix3::from_value(2.0);
        assert!(layout.write(&mut block, "model", UniformValue::Mat4(model)));
        assert!(layout.write(&mut block, "normalMatrix", UniformValue::Mat3(normal)));
        assert!(layout.write(&mut block, "enableSoftShadows", UniformValue::Int(1)));
        assert!(layout.write(&mut block, "lightColors[1]", UniformValue::Vec3(Vector3::new(0.5, 0.25, 1.0))));

        assert_eq!(layout.read(&block, "model"), Some(UniformValue::Mat4(model)));
        assert_eq!(layout.read(&block, "normalMatrix"), Some(UniformValue::Mat3(normal)));
        assert_eq!(layout.read(&block, "enableSoftShadows"), Some(UniformValue::Bool(true)));
        assert_eq!(
            layout.read(&block, "lightColors[1]"),
            Some(UniformValue::Vec3(Vector3::new(0.5, 0.25, 1.0)))
        );
    }

    #[test]
    fn test_unknown_and_mismatched_writes_are_ignored() {
        let layout = UniformLayout::builder().field("brightness", UniformKind::Float).build();
        let mut block = vec![0u8; layout.size()];

        assert!(!layout.write(&mut block, "material.shininess", UniformValue::Float(32.0)));
        assert!(!layout.write(&mut block, "brightness", UniformValue::Mat4(Matrix4::identity())));
        assert!(block.iter().all(|b| *b == 0));
    }
}
