//! Meshes and the mesh draw protocol

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::gfx::resources::material::MaterialBlock;
use crate::gfx::resources::texture_store::TextureId;
use crate::gfx::shader::ShaderProgram;
use crate::wgpu_utils::GpuContext;

use super::vertex::Vertex3D;

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies one uploaded vertex/index buffer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(u64);

/// Vertex and index buffers of a mesh
#[derive(Debug)]
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
}

/// What a shader program needs to draw a mesh: an id, plus the buffers once uploaded
#[derive(Debug, Clone)]
pub struct GeometryHandle {
    id: GeometryId,
    buffers: Option<Arc<GpuGeometry>>,
}

impl GeometryHandle {
    /// A handle with no GPU buffers, for meshes built without a device
    pub fn cpu_only() -> Self {
        Self {
            id: GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed)),
            buffers: None,
        }
    }

    /// Uploads vertices and indices into immutable GPU buffers
    pub fn upload(context: &GpuContext, label: &str, vertices: &[Vertex3D], indices: &[u32]) -> Self {
        let vertex_buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            buffers: Some(Arc::new(GpuGeometry {
                vertex_buffer,
                index_buffer,
            })),
            ..Self::cpu_only()
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn buffers(&self) -> Option<&Arc<GpuGeometry>> {
        self.buffers.as_ref()
    }
}

/// Semantic role of a texture bound to a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    MetallicRoughness,
    Occlusion,
}

impl TextureKind {
    pub const ALL: [TextureKind; 5] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::MetallicRoughness,
        TextureKind::Occlusion,
    ];

    /// Sampler uniform the first texture of this kind is routed to
    pub fn sampler_name(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "material.texture_diffuse",
            TextureKind::Specular => "material.texture_specular",
            TextureKind::Normal => "material.texture_normal",
            TextureKind::MetallicRoughness => "material.texture_metallic_roughness",
            TextureKind::Occlusion => "material.texture_occlusion",
        }
    }

    /// Boolean uniform telling the shader whether such a texture exists
    pub fn flag_name(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "hasDiffuseTexture",
            TextureKind::Specular => "hasSpecularTexture",
            TextureKind::Normal => "hasNormalTexture",
            TextureKind::MetallicRoughness => "hasMetallicRoughnessTexture",
            TextureKind::Occlusion => "hasOcclusionTexture",
        }
    }

    /// Colour data is sRGB encoded; everything else is linear
    pub fn is_srgb(self) -> bool {
        matches!(self, TextureKind::Diffuse)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A texture attached to a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    pub id: TextureId,
    pub kind: TextureKind,
    pub path: String,
}

/// Immutable indexed triangle mesh with its textures
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
    textures: Vec<TextureBinding>,
    geometry: GeometryHandle,
}

impl Mesh {
    /// Builds a mesh, uploading its buffers when a GPU context is given
    pub fn new(
        vertices: Vec<Vertex3D>,
        indices: Vec<u32>,
        textures: Vec<TextureBinding>,
        context: Option<&GpuContext>,
    ) -> Self {
        let geometry = match context {
            Some(context) => GeometryHandle::upload(context, "Mesh", &vertices, &indices),
            None => GeometryHandle::cpu_only(),
        };

        Self {
            vertices,
            indices,
            textures,
            geometry,
        }
    }

    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Binds textures and issues the indexed draw
    ///
    /// Textures go to units `0..n` in list order. The first texture of each
    /// kind is routed to that kind's sampler uniform, and every kind gets a
    /// presence flag so the shader can fall back to a flat colour.
    pub fn draw(&self, shader: &mut dyn ShaderProgram, material: &MaterialBlock) {
        let mut found = [false; TextureKind::ALL.len()];

        for (unit, binding) in self.textures.iter().enumerate() {
            shader.bind_texture(unit as u32, binding.id);
            let slot = &mut found[binding.kind.index()];
            if !*slot {
                shader.set_int(binding.kind.sampler_name(), unit as i32);
                *slot = true;
            }
        }

        for kind in TextureKind::ALL {
            shader.set_bool(kind.flag_name(), found[kind.index()]);
        }

        shader.set_float("material.shininess", material.shininess);
        shader.draw_indexed(&self.geometry, self.index_count());
    }
}
