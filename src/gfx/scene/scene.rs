//! Scene factory and owner
//!
//! A [`Scene`] holds the graph together with the texture store and the model
//! cache its nodes draw with. Nodes are created here from built-in primitives
//! or model files; loading the same path twice reuses the cached model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AssetError;
use crate::gfx::geometry::{self, PrimitiveType};
use crate::gfx::resources::material::MaterialFilter;
use crate::gfx::resources::texture_store::TextureStore;
use crate::gfx::shader::ShaderProgram;
use crate::wgpu_utils::GpuContext;

use super::graph::{NodeId, SceneGraph};
use super::mesh::{Mesh, TextureBinding, TextureKind};
use super::model::{LoadedModel, Model};

/// Scene graph plus the assets its nodes draw
///
/// Nodes are built through the factory methods here; transforms and
/// materials are then edited through [`SceneGraph::node_mut`].
pub struct Scene {
    pub graph: SceneGraph,
    pub textures: TextureStore,
    models: HashMap<PathBuf, Arc<LoadedModel>>,
}

impl Scene {
    /// Creates an empty scene; with a context, meshes and textures go
    /// straight to the GPU as they are created
    pub fn new(context: Option<GpuContext>) -> Self {
        let mut textures = TextureStore::new();
        if let Some(context) = context {
            textures.attach_gpu(context);
        }

        Self {
            graph: SceneGraph::new(),
            textures,
            models: HashMap::new(),
        }
    }

    /// Creates an empty node under the root
    pub fn create_node(&mut self, name: &str) -> NodeId {
        self.graph.create_node(name)
    }

    /// Creates a node drawing the model at `path`
    ///
    /// Models are cached by path, so nodes created from the same file share
    /// one copy of the geometry.
    pub fn create_model_node(&mut self, name: &str, path: impl AsRef<Path>) -> Result<NodeId, AssetError> {
        let path = path.as_ref();
        let model = match self.models.get(path) {
            Some(model) => Arc::clone(model),
            None => {
                let model = Arc::new(LoadedModel::load(path, &mut self.textures)?);
                self.models.insert(path.to_path_buf(), Arc::clone(&model));
                model
            }
        };

        let id = self.graph.create_node(name);
        log::debug!("Node '{}' draws '{}'", name, model.path().display());
        if let Some(node) = self.graph.node_mut(id) {
            node.attach_model(model as Arc<dyn Model>);
        }
        Ok(id)
    }

    /// Creates a node owning a procedurally generated mesh
    ///
    /// The mesh gets a freshly generated 1x1 white diffuse texture.
    pub fn create_primitive_node(&mut self, name: &str, primitive: PrimitiveType) -> NodeId {
        let (vertices, indices) = geometry::generate(primitive).to_scene_format();
        let white = self.textures.generate_white();
        let textures = vec![TextureBinding {
            id: white,
            kind: TextureKind::Diffuse,
            path: String::new(),
        }];
        let mesh = Mesh::new(vertices, indices, textures, self.textures.context());

        let id = self.graph.create_node(name);
        if let Some(node) = self.graph.node_mut(id) {
            node.add_mesh(mesh);
        }
        log::debug!("Created {:?} primitive node '{}'", primitive, name);
        id
    }

    /// Draws every node accepted by `filter` with `shader`
    pub fn render_scene(&mut self, shader: &mut dyn ShaderProgram, filter: MaterialFilter) {
        self.graph.render(shader, filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::graph::Drawable;
    use crate::gfx::shader::{programs, UniformProgram, UniformValue};

    #[test]
    fn test_plane_node() {
        let mut scene = Scene::new(None);
        let plane = scene.create_primitive_node("floor", PrimitiveType::Plane);

        let node = scene.graph.node(plane).unwrap();
        let Drawable::Meshes(meshes) = node.drawable() else {
            panic!("plane should own its mesh");
        };
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].vertices().len(), 4);
        assert_eq!(meshes[0].indices().len(), 6);

        let texture = meshes[0].textures()[0].id;
        let image = scene.textures.image(texture).unwrap();
        for (u, v) in [(0.0, 0.0), (0.3, 0.9), (1.0, 1.0), (7.5, -2.25)] {
            assert_eq!(image.sample(u, v), [255, 255, 255, 255]);
        }
    }

    #[test]
    fn test_plane_draws_with_diffuse_flag() {
        let mut scene = Scene::new(None);
        scene.create_primitive_node("floor", PrimitiveType::Plane);

        let mut program = UniformProgram::new(&programs::phong_program());
        program.activate();
        scene.render_scene(&mut program, MaterialFilter::All);

        let command = &program.commands()[0];
        assert_eq!(command.index_count, 6);
        assert_eq!(
            program.recorded_value(command, "hasDiffuseTexture"),
            Some(UniformValue::Bool(true))
        );
        assert_eq!(program.sampler_unit("material.texture_diffuse"), Some(0));
    }

    #[test]
    fn test_each_primitive_gets_its_own_white_texture() {
        let mut scene = Scene::new(None);
        scene.create_primitive_node("a", PrimitiveType::Plane);
        scene.create_primitive_node("b", PrimitiveType::Cube);
        assert_eq!(scene.textures.len(), 2);
        assert_eq!(scene.graph.len(), 3);
    }

    #[test]
    fn test_model_node_failure_leaves_graph_untouched() {
        let mut scene = Scene::new(None);
        let result = scene.create_model_node("missing", "assets/missing.obj");

        assert!(result.is_err());
        assert_eq!(scene.graph.len(), 1);
    }
}
