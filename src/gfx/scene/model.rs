//! External models loaded from OBJ and glTF files
//!
//! A model is shared between nodes through `Arc<dyn Model>`; the node supplies
//! its own material when asking the model to draw.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::error::AssetError;
use crate::gfx::resources::material::MaterialBlock;
use crate::gfx::resources::texture_store::{TexelImage, TextureId, TextureStore};
use crate::gfx::shader::ShaderProgram;

use super::mesh::{Mesh, TextureBinding, TextureKind};
use super::vertex::{compute_tangents, Vertex3D};

/// Something that can draw itself with a node's material
pub trait Model {
    fn draw(&self, shader: &mut dyn ShaderProgram, material: &MaterialBlock);

    fn meshes(&self) -> &[Mesh];
}

/// Meshes read from a model file
#[derive(Debug)]
pub struct LoadedModel {
    path: PathBuf,
    meshes: Vec<Mesh>,
}

impl LoadedModel {
    /// Loads an `.obj`, `.gltf` or `.glb` file
    ///
    /// Textures referenced by the file are registered in `textures` and
    /// uploaded right away when the store has a GPU attached. A texture that
    /// fails to load is skipped with a warning; the mesh then draws with the
    /// flat fallback colour for that slot.
    pub fn load(path: &Path, textures: &mut TextureStore) -> Result<Self, AssetError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let meshes = match extension.as_deref() {
            Some("obj") => load_obj(path, textures)?,
            Some("gltf") | Some("glb") => load_gltf(path, textures)?,
            _ => return Err(AssetError::UnsupportedFormat(path.to_path_buf())),
        };

        if meshes.is_empty() {
            return Err(AssetError::EmptyModel(path.to_path_buf()));
        }

        log::info!(
            "Loaded model '{}' ({} meshes, {} triangles)",
            path.display(),
            meshes.len(),
            meshes.iter().map(|m| m.indices().len() / 3).sum::<usize>()
        );

        Ok(Self {
            path: path.to_path_buf(),
            meshes,
        })
    }

    pub fn from_meshes(path: impl Into<PathBuf>, meshes: Vec<Mesh>) -> Self {
        Self {
            path: path.into(),
            meshes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Model for LoadedModel {
    fn draw(&self, shader: &mut dyn ShaderProgram, material: &MaterialBlock) {
        for mesh in &self.meshes {
            mesh.draw(shader, material);
        }
    }

    fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }
}

fn load_obj(path: &Path, textures: &mut TextureStore) -> Result<Vec<Mesh>, AssetError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| AssetError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let materials = materials.unwrap_or_else(|e| {
        log::warn!("No usable MTL for '{}': {}", path.display(), e);
        Vec::new()
    });
    let directory = path.parent().unwrap_or_else(|| Path::new("."));

    let mut meshes = Vec::with_capacity(models.len());
    for model in &models {
        let mesh = &model.mesh;
        let vertex_count = mesh.positions.len() / 3;

        let normals = if mesh.normals.len() == mesh.positions.len() {
            mesh.normals.clone()
        } else {
            smooth_normals(&mesh.positions, &mesh.indices)
        };

        let mut vertices: Vec<Vertex3D> = (0..vertex_count)
            .map(|i| Vertex3D {
                position: [mesh.positions[i * 3], mesh.positions[i * 3 + 1], mesh.positions[i * 3 + 2]],
                normal: [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]],
                // OBJ puts v = 0 at the bottom of the image
                tex_coords: mesh
                    .texcoords
                    .get(i * 2..i * 2 + 2)
                    .map(|uv| [uv[0], 1.0 - uv[1]])
                    .unwrap_or([0.0, 0.0]),
                tangent: [0.0; 3],
            })
            .collect();
        compute_tangents(&mut vertices, &mesh.indices);

        let mut bindings = Vec::new();
        if let Some(material) = mesh.material_id.and_then(|id| materials.get(id)) {
            let maps = [
                (&material.diffuse_texture, TextureKind::Diffuse),
                (&material.specular_texture, TextureKind::Specular),
                (&material.normal_texture, TextureKind::Normal),
            ];
            for (file, kind) in maps {
                let Some(file) = file else { continue };
                let texture_path = directory.join(file);
                match textures.load(&texture_path, kind.is_srgb()) {
                    Ok(id) => bindings.push(TextureBinding {
                        id,
                        kind,
                        path: texture_path.to_string_lossy().into_owned(),
                    }),
                    Err(e) => log::warn!("{}", e),
                }
            }
        }

        let context = textures.context().cloned();
        meshes.push(Mesh::new(vertices, mesh.indices.clone(), bindings, context.as_ref()));
    }

    Ok(meshes)
}

fn load_gltf(path: &Path, textures: &mut TextureStore) -> Result<Vec<Mesh>, AssetError> {
    let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;

    let mut loader = GltfLoader {
        path,
        buffers: &buffers,
        images: &images,
        textures,
        uploaded: HashMap::new(),
        meshes: Vec::new(),
    };

    let scene = document.default_scene().or_else(|| document.scenes().next());
    match scene {
        Some(scene) => {
            for node in scene.nodes() {
                loader.visit(&node, Matrix4::identity());
            }
        }
        // no scene: take every mesh as-is
        None => {
            for mesh in document.meshes() {
                loader.add_mesh(&mesh, Matrix4::identity());
            }
        }
    }

    Ok(loader.meshes)
}

struct GltfLoader<'a> {
    path: &'a Path,
    buffers: &'a [gltf::buffer::Data],
    images: &'a [gltf::image::Data],
    textures: &'a mut TextureStore,
    uploaded: HashMap<(usize, bool), TextureId>,
    meshes: Vec<Mesh>,
}

impl GltfLoader<'_> {
    fn visit(&mut self, node: &gltf::Node, parent: Matrix4<f32>) {
        let world = parent * Matrix4::from(node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            self.add_mesh(&mesh, world);
        }
        for child in node.children() {
            self.visit(&child, world);
        }
    }

    fn add_mesh(&mut self, mesh: &gltf::Mesh, transform: Matrix4<f32>) {
        let upper = Matrix3::from_cols(transform.x.truncate(), transform.y.truncate(), transform.z.truncate());
        let normal_matrix = upper.invert().map(|m| m.transpose()).unwrap_or(upper);

        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&self.buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader.read_positions().map(|iter| iter.collect()).unwrap_or_default();
            if positions.is_empty() {
                continue;
            }
            let normals: Vec<[f32; 3]> = reader.read_normals().map(|iter| iter.collect()).unwrap_or_default();
            let tex_coords: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_default();
            let tangents: Vec<[f32; 4]> = reader.read_tangents().map(|iter| iter.collect()).unwrap_or_default();
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|iter| iter.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let mut vertices: Vec<Vertex3D> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let position = transform * Vector4::new(p[0], p[1], p[2], 1.0);
                    let normal = normals
                        .get(i)
                        .map(|n| (normal_matrix * Vector3::from(*n)).normalize())
                        .unwrap_or(Vector3::unit_y());
                    let tangent = tangents
                        .get(i)
                        .map(|t| (upper * Vector3::new(t[0], t[1], t[2])).normalize())
                        .unwrap_or(Vector3::unit_x());
                    Vertex3D {
                        position: position.truncate().into(),
                        normal: normal.into(),
                        tex_coords: tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
                        tangent: tangent.into(),
                    }
                })
                .collect();
            if normals.is_empty() {
                let flat: Vec<f32> = vertices.iter().flat_map(|v| v.position).collect();
                let smoothed = smooth_normals(&flat, &indices);
                for (i, vertex) in vertices.iter_mut().enumerate() {
                    vertex.normal = [smoothed[i * 3], smoothed[i * 3 + 1], smoothed[i * 3 + 2]];
                }
            }
            if tangents.is_empty() {
                compute_tangents(&mut vertices, &indices);
            }

            let bindings = self.material_bindings(&primitive.material());
            let context = self.textures.context().cloned();
            self.meshes.push(Mesh::new(vertices, indices, bindings, context.as_ref()));
        }
    }

    fn material_bindings(&mut self, material: &gltf::Material) -> Vec<TextureBinding> {
        let pbr = material.pbr_metallic_roughness();
        let maps = [
            (pbr.base_color_texture().map(|t| t.texture()), TextureKind::Diffuse),
            (material.normal_texture().map(|t| t.texture()), TextureKind::Normal),
            (
                pbr.metallic_roughness_texture().map(|t| t.texture()),
                TextureKind::MetallicRoughness,
            ),
            (material.occlusion_texture().map(|t| t.texture()), TextureKind::Occlusion),
        ];

        let mut bindings = Vec::new();
        for (texture, kind) in maps {
            let Some(texture) = texture else { continue };
            let image_index = texture.source().index();
            if let Some(id) = self.texture_for_image(image_index, kind.is_srgb()) {
                bindings.push(TextureBinding {
                    id,
                    kind,
                    path: format!("{}#image{}", self.path.display(), image_index),
                });
            }
        }
        bindings
    }

    fn texture_for_image(&mut self, index: usize, srgb: bool) -> Option<TextureId> {
        if let Some(&id) = self.uploaded.get(&(index, srgb)) {
            return Some(id);
        }

        let data = self.images.get(index)?;
        let Some(image) = gltf_image_to_rgba(data) else {
            log::warn!(
                "Skipping image {} of '{}': unsupported pixel format {:?}",
                index,
                self.path.display(),
                data.format
            );
            return None;
        };

        let label = format!("{}#image{}", self.path.display(), index);
        let id = self.textures.insert_image(&label, image, srgb);
        self.uploaded.insert((index, srgb), id);
        Some(id)
    }
}

fn gltf_image_to_rgba(data: &gltf::image::Data) -> Option<TexelImage> {
    use gltf::image::Format;

    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|c| [c[0], c[1], 0, 255])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        _ => return None,
    };
    TexelImage::new(data.width, data.height, pixels)
}

/// Area-weighted vertex normals for meshes that ship without them
fn smooth_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let mut normals = vec![Vector3::new(0.0f32, 0.0, 0.0); vertex_count];
    let at = |i: usize| Vector3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]);

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        if a >= vertex_count || b >= vertex_count || c >= vertex_count {
            continue;
        }
        let face = (at(b) - at(a)).cross(at(c) - at(a));
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals
        .into_iter()
        .flat_map(|n| {
            let n = if n.magnitude2() > 0.0 { n.normalize() } else { Vector3::unit_y() };
            [n.x, n.y, n.z]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        let mut store = TextureStore::new();
        let result = LoadedModel::load(Path::new("scene.fbx"), &mut store);
        assert!(matches!(result, Err(AssetError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_obj_is_an_error() {
        let mut store = TextureStore::new();
        let result = LoadedModel::load(Path::new("missing/model.obj"), &mut store);
        assert!(matches!(result, Err(AssetError::Obj { .. })));
    }

    #[test]
    fn test_smooth_normals_of_flat_quad_point_up() {
        let positions = [
            -1.0, 0.0, -1.0, //
            1.0, 0.0, -1.0, //
            1.0, 0.0, 1.0, //
            -1.0, 0.0, 1.0,
        ];
        // counter-clockwise seen from +Y
        let normals = smooth_normals(&positions, &[0, 2, 1, 0, 3, 2]);
        for n in normals.chunks_exact(3) {
            assert!((n[1] - 1.0).abs() < 1e-6, "{:?}", n);
        }
    }

    #[test]
    fn test_model_draws_every_mesh() {
        use crate::gfx::shader::{programs, ShaderProgram, UniformProgram};

        let mesh = Mesh::new(Vec::new(), vec![0, 1, 2], Vec::new(), None);
        let model = LoadedModel::from_meshes("inline", vec![mesh.clone(), mesh]);
        let mut program = UniformProgram::new(&programs::depth_program());

        program.activate();
        model.draw(&mut program, &MaterialBlock::default());
        assert_eq!(program.commands().len(), 2);
    }
}
