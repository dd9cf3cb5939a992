//! Arena-backed scene graph
//!
//! Nodes live in a flat arena addressed by [`NodeId`] (slot index plus a
//! generation counter, so a handle to a destroyed node never aliases its
//! replacement). Slot 0 is the root. Parents own their children: destroying a
//! node frees its whole subtree.
//!
//! World matrices are a pure function of the local transforms along the
//! chain. [`SceneGraph::update_transforms`] recomputes them top-down and
//! [`SceneGraph::render`] does so before every traversal, so calling it once
//! per pass always sees the same, bit-identical matrices.

use std::fmt;
use std::sync::Arc;

use cgmath::{
    Deg, InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, Rotation3, SquareMatrix, Vector3,
};

use crate::error::SceneError;
use crate::gfx::resources::material::{MaterialBlock, MaterialFilter};
use crate::gfx::shader::ShaderProgram;

use super::mesh::Mesh;
use super::model::Model;

/// Handle to a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// What a node draws
#[derive(Clone, Default)]
pub enum Drawable {
    #[default]
    Empty,
    /// An external model, possibly shared with other nodes
    Model(Arc<dyn Model>),
    /// Meshes owned by this node alone
    Meshes(Vec<Mesh>),
}

impl Drawable {
    pub fn is_empty(&self) -> bool {
        match self {
            Drawable::Empty => true,
            Drawable::Model(_) => false,
            Drawable::Meshes(meshes) => meshes.is_empty(),
        }
    }
}

impl fmt::Debug for Drawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drawable::Empty => f.write_str("Empty"),
            Drawable::Model(model) => write!(f, "Model({} meshes)", model.meshes().len()),
            Drawable::Meshes(meshes) => write!(f, "Meshes({})", meshes.len()),
        }
    }
}

/// A transform, a material and something to draw
#[derive(Debug)]
pub struct Node {
    pub name: String,
    position: Vector3<f32>,
    rotation: Quaternion<f32>,
    scale: Vector3<f32>,
    material: MaterialBlock,
    drawable: Drawable,
    local: Matrix4<f32>,
    world: Matrix4<f32>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
    alive: bool,
}

impl Node {
    fn new(name: &str, generation: u32) -> Self {
        Self {
            name: name.to_string(),
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            material: MaterialBlock::default(),
            drawable: Drawable::Empty,
            local: Matrix4::identity(),
            world: Matrix4::identity(),
            parent: None,
            children: Vec::new(),
            generation,
            alive: true,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn rotation(&self) -> Quaternion<f32> {
        self.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    /// Sets the rotation; the quaternion is normalised on the way in
    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        self.rotation = if rotation.magnitude2() > 0.0 {
            rotation.normalize()
        } else {
            Quaternion::one()
        };
    }

    /// Sets the rotation to `angle` about `axis`
    pub fn set_rotation_axis_angle(&mut self, angle: Deg<f32>, axis: Vector3<f32>) {
        if axis.magnitude2() == 0.0 {
            self.rotation = Quaternion::one();
            return;
        }
        self.rotation = Quaternion::from_axis_angle(axis.normalize(), angle);
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vector3::new(scale, scale, scale);
    }

    pub fn material(&self) -> &MaterialBlock {
        &self.material
    }

    pub fn set_material(&mut self, material: MaterialBlock) {
        self.material = material;
    }

    pub fn drawable(&self) -> &Drawable {
        &self.drawable
    }

    /// Attaches a shared model, replacing whatever the node drew before
    pub fn attach_model(&mut self, model: Arc<dyn Model>) {
        self.drawable = Drawable::Model(model);
    }

    /// Adds an owned mesh; an attached model is dropped first
    pub fn add_mesh(&mut self, mesh: Mesh) {
        match &mut self.drawable {
            Drawable::Meshes(meshes) => meshes.push(mesh),
            other => *other = Drawable::Meshes(vec![mesh]),
        }
    }

    /// Translate · rotate · scale, as of the last transform update
    pub fn local_transform(&self) -> Matrix4<f32> {
        self.local
    }

    /// Parent world · local, as of the last transform update
    pub fn world_transform(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    fn compose_local(&self) -> Matrix4<f32> {
        compose(self.position, self.rotation, self.scale)
    }
}

/// Builds `T · R · S`
pub fn compose(position: Vector3<f32>, rotation: Quaternion<f32>, scale: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_translation(position)
        * Matrix4::from(rotation)
        * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
}

/// Inverse-transpose of the upper 3x3, identity when it is singular
pub fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let upper = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
    upper
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or_else(Matrix3::identity)
}

/// Tree of [`Node`]s rooted at a fixed root node
#[derive(Debug)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    free_list: Vec<u32>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("root", 0)],
            free_list: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId {
            index: 0,
            generation: 0,
        }
    }

    /// Allocates a node under the root
    pub fn create_node(&mut self, name: &str) -> NodeId {
        let id = self.alloc(name);
        self.link(self.root(), id);
        id
    }

    /// Allocates a node under `parent`
    pub fn create_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SceneError> {
        self.check(parent)?;
        let id = self.alloc(name);
        self.link(parent, id);
        Ok(id)
    }

    /// Appends a detached node to `parent`'s children
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.check(parent)?;
        self.check(child)?;
        if child == self.root() {
            return Err(SceneError::RootImmutable);
        }
        if self.nodes[child.index()].parent.is_some() {
            return Err(SceneError::AlreadyParented { child });
        }
        if self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.link(parent, child);
        Ok(())
    }

    /// Detaches `child` from `parent`
    ///
    /// The child stays alive with its subtree; it is not drawn or updated
    /// until it is added somewhere again.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.check(parent)?;
        self.check(child)?;
        let children = &mut self.nodes[parent.index()].children;
        let Some(position) = children.iter().position(|&c| c == child) else {
            return Err(SceneError::NotAChild { parent, child });
        };

        children.remove(position);
        self.nodes[child.index()].parent = None;
        Ok(())
    }

    /// Frees `id` and its whole subtree; their handles go stale
    pub fn destroy(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.check(id)?;
        if id == self.root() {
            return Err(SceneError::RootImmutable);
        }

        if let Some(parent) = self.nodes[id.index()].parent {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.index()];
            stack.append(&mut node.children);
            node.alive = false;
            node.parent = None;
            node.drawable = Drawable::Empty;
            self.free_list.push(current.index);
        }
        Ok(())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.check(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.contains(id).then(|| &self.nodes[id.index()])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.contains(id) {
            Some(&mut self.nodes[id.index()])
        } else {
            None
        }
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        self.check(id)?;
        Ok(&self.nodes[id.index()].children)
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Recomputes local and world matrices of every node reachable from the root
    pub fn update_transforms(&mut self) {
        let mut stack = vec![(0usize, Matrix4::identity())];
        while let Some((index, parent_world)) = stack.pop() {
            let node = &mut self.nodes[index];
            node.local = node.compose_local();
            node.world = parent_world * node.local;

            let world = node.world;
            stack.extend(node.children.iter().rev().map(|c| (c.index(), world)));
        }
    }

    /// Updates transforms, then draws the whole tree with `shader`
    ///
    /// The caller activates `shader` and sets its per-pass uniforms first.
    pub fn render(&mut self, shader: &mut dyn ShaderProgram, filter: MaterialFilter) {
        self.update_transforms();
        self.draw_from(0, shader, filter);
    }

    fn draw_from(&self, index: usize, shader: &mut dyn ShaderProgram, filter: MaterialFilter) {
        let node = &self.nodes[index];

        if !node.drawable.is_empty() && filter.accepts(node.material.material_type) {
            node.material.apply(shader);
            shader.set_mat4("model", &node.world);
            shader.set_mat3("normalMatrix", &normal_matrix(&node.world));

            match &node.drawable {
                Drawable::Model(model) => model.draw(shader, &node.material),
                Drawable::Meshes(meshes) => {
                    for mesh in meshes {
                        mesh.draw(shader, &node.material);
                    }
                }
                Drawable::Empty => {}
            }
        }

        for child in &node.children {
            self.draw_from(child.index(), shader, filter);
        }
    }

    fn alloc(&mut self, name: &str) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            let generation = self.nodes[index as usize].generation + 1;
            self.nodes[index as usize] = Node::new(name, generation);
            NodeId { index, generation }
        } else {
            let index = self.nodes.len() as u32;
            self.nodes.push(Node::new(name, 0));
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].children.push(child);
        self.nodes[child.index()].parent = Some(parent);
    }

    fn check(&self, id: NodeId) -> Result<(), SceneError> {
        match self.nodes.get(id.index()) {
            Some(node) if node.alive && node.generation == id.generation => Ok(()),
            _ => Err(SceneError::StaleNode(id)),
        }
    }

    /// True when `ancestor` is `node` or lies on its parent chain
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.index()].parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::material::MaterialType;
    use crate::gfx::scene::model::LoadedModel;
    use crate::gfx::scene::vertex::Vertex3D;
    use crate::gfx::shader::{programs, UniformProgram, UniformValue};
    use cgmath::{Rad, Vector4};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn quad_mesh() -> Mesh {
        let vertex = |x: f32, z: f32, u: f32, v: f32| Vertex3D {
            position: [x, 0.0, z],
            normal: [0.0, 1.0, 0.0],
            tex_coords: [u, v],
            tangent: [1.0, 0.0, 0.0],
        };
        Mesh::new(
            vec![
                vertex(-1.0, -1.0, 0.0, 0.0),
                vertex(1.0, -1.0, 1.0, 0.0),
                vertex(1.0, 1.0, 1.0, 1.0),
                vertex(-1.0, 1.0, 0.0, 1.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
            Vec::new(),
            None,
        )
    }

    fn random_transform(rng: &mut StdRng) -> (Vector3<f32>, Quaternion<f32>, Vector3<f32>) {
        let mut component = |lo: f32, hi: f32| rng.random_range(lo..hi);
        let position = Vector3::new(component(-10.0, 10.0), component(-10.0, 10.0), component(-10.0, 10.0));
        let axis = Vector3::new(component(-1.0, 1.0), component(-1.0, 1.0), component(0.1, 1.0)).normalize();
        let rotation = Quaternion::from_axis_angle(axis, Rad(component(-3.0, 3.0)));
        let scale = Vector3::new(component(0.1, 3.0), component(0.1, 3.0), component(0.1, 3.0));
        (position, rotation, scale)
    }

    fn assert_matrix_close(a: &Matrix4<f32>, b: &Matrix4<f32>) {
        let a: &[[f32; 4]; 4] = a.as_ref();
        let b: &[[f32; 4]; 4] = b.as_ref();
        for col in 0..4 {
            for row in 0..4 {
                let tolerance = 1e-3 * (1.0 + a[col][row].abs());
                assert!(
                    (a[col][row] - b[col][row]).abs() <= tolerance,
                    "{:?} != {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_world_is_parent_world_times_local() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..50 {
            let mut graph = SceneGraph::new();
            let a = graph.create_node("a");
            let b = graph.create_child(a, "b").unwrap();
            let c = graph.create_child(b, "c").unwrap();

            for id in [a, b, c] {
                let (position, rotation, scale) = random_transform(&mut rng);
                let node = graph.node_mut(id).unwrap();
                node.set_position(position);
                node.set_rotation(rotation);
                node.set_scale(scale);
            }
            graph.update_transforms();

            for (parent, child) in [(graph.root(), a), (a, b), (b, c)] {
                let expected = graph.node(parent).unwrap().world_transform()
                    * graph.node(child).unwrap().local_transform();
                assert_matrix_close(&graph.node(child).unwrap().world_transform(), &expected);
            }
        }
    }

    #[test]
    fn test_local_transform_decomposes_back() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let (position, rotation, scale) = random_transform(&mut rng);
            let mut graph = SceneGraph::new();
            let id = graph.create_node("n");
            let node = graph.node_mut(id).unwrap();
            node.set_position(position);
            node.set_rotation(rotation);
            node.set_scale(scale);
            graph.update_transforms();

            let local = graph.node(id).unwrap().local_transform();
            let translation = local.w.truncate();
            let columns = [local.x.truncate(), local.y.truncate(), local.z.truncate()];
            let recovered_scale = Vector3::new(
                columns[0].magnitude(),
                columns[1].magnitude(),
                columns[2].magnitude(),
            );
            let recovered_rotation = Quaternion::from(Matrix3::from_cols(
                columns[0] / recovered_scale.x,
                columns[1] / recovered_scale.y,
                columns[2] / recovered_scale.z,
            ));

            assert!((translation - position).magnitude() < 1e-4);
            assert!((recovered_scale - scale).magnitude() < 1e-4);
            // q and -q are the same rotation
            assert!((recovered_rotation.dot(rotation).abs() - 1.0).abs() < 1e-4);
            assert!((graph.node(id).unwrap().rotation().dot(rotation) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_add_then_remove_restores_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let first = graph.create_child(parent, "first").unwrap();
        let second = graph.create_child(parent, "second").unwrap();
        let loose = graph.create_node("loose");
        graph.remove_child(graph.root(), loose).unwrap();

        let before = graph.children(parent).unwrap().to_vec();
        graph.add_child(parent, loose).unwrap();
        assert_eq!(graph.children(parent).unwrap(), &[first, second, loose]);
        graph.remove_child(parent, loose).unwrap();

        assert_eq!(graph.children(parent).unwrap(), before.as_slice());
        assert_eq!(graph.node(loose).unwrap().parent(), None);
    }

    #[test]
    fn test_structural_errors() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = graph.create_node("a");
        let b = graph.create_child(a, "b").unwrap();

        assert_eq!(graph.add_child(a, b), Err(SceneError::AlreadyParented { child: b }));
        assert_eq!(graph.add_child(a, root), Err(SceneError::RootImmutable));
        assert_eq!(graph.destroy(root), Err(SceneError::RootImmutable));
        assert_eq!(graph.remove_child(b, a), Err(SceneError::NotAChild { parent: b, child: a }));

        graph.remove_child(root, a).unwrap();
        assert_eq!(graph.add_child(b, a), Err(SceneError::Cycle { parent: b, child: a }));
        assert_eq!(graph.add_child(a, a), Err(SceneError::Cycle { parent: a, child: a }));
    }

    #[test]
    fn test_destroy_frees_subtree_and_stales_handles() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node("a");
        let b = graph.create_child(a, "b").unwrap();
        assert_eq!(graph.len(), 3);

        graph.destroy(a).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(!graph.contains(a));
        assert!(!graph.contains(b));
        assert!(graph.children(graph.root()).unwrap().is_empty());

        let reused = graph.create_node("reused");
        assert_ne!(reused, a);
        assert_ne!(reused, b);
        assert_eq!(graph.create_child(b, "x"), Err(SceneError::StaleNode(b)));
    }

    #[test]
    fn test_render_twice_records_identical_draws() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node("a");
        let b = graph.create_child(a, "b").unwrap();
        graph.node_mut(a).unwrap().add_mesh(quad_mesh());
        graph.node_mut(a).unwrap().set_position(Vector3::new(1.0, 2.0, 3.0));
        graph.node_mut(b).unwrap().add_mesh(quad_mesh());
        graph
            .node_mut(b)
            .unwrap()
            .set_rotation_axis_angle(Deg(30.0), Vector3::unit_y());

        let mut program = UniformProgram::new(&programs::phong_program());
        program.activate();
        graph.render(&mut program, MaterialFilter::All);
        let first_arena = program.arena().to_vec();
        let first: Vec<_> = program
            .commands()
            .iter()
            .map(|c| (c.geometry, c.index_count, c.uniform_offset, c.textures.clone()))
            .collect();

        program.activate();
        graph.render(&mut program, MaterialFilter::All);
        let second: Vec<_> = program
            .commands()
            .iter()
            .map(|c| (c.geometry, c.index_count, c.uniform_offset, c.textures.clone()))
            .collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first_arena, program.arena());
    }

    #[test]
    fn test_untextured_quad_scenario() {
        let mut graph = SceneGraph::new();
        let quad = graph.create_node("quad");
        graph.node_mut(quad).unwrap().add_mesh(quad_mesh());

        let mut program = UniformProgram::new(&programs::phong_program());
        program.activate();
        graph.render(&mut program, MaterialFilter::All);

        let commands = program.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].index_count, 6);
        for flag in ["hasDiffuseTexture", "hasSpecularTexture"] {
            assert_eq!(
                program.recorded_value(&commands[0], flag),
                Some(UniformValue::Bool(false))
            );
        }
    }

    #[test]
    fn test_filter_skips_payload_but_visits_children() {
        let mut graph = SceneGraph::new();
        let pbr = graph.create_node("pbr");
        let phong = graph.create_child(pbr, "phong").unwrap();
        {
            let node = graph.node_mut(pbr).unwrap();
            node.add_mesh(quad_mesh());
            node.set_material(MaterialBlock::pbr(0.7, 0.3, 1.0));
        }
        graph.node_mut(phong).unwrap().add_mesh(quad_mesh());

        let mut program = UniformProgram::new(&programs::phong_program());
        program.activate();
        graph.render(&mut program, MaterialFilter::Only(MaterialType::Phong));
        assert_eq!(program.commands().len(), 1);

        let mut pbr_program = UniformProgram::new(&programs::pbr_program());
        pbr_program.activate();
        graph.render(&mut pbr_program, MaterialFilter::Only(MaterialType::Pbr));
        let commands = pbr_program.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            pbr_program.recorded_value(&commands[0], "material.metallic"),
            Some(UniformValue::Float(0.7))
        );
    }

    #[test]
    fn test_model_matrix_is_world_transform() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let child = graph.create_child(parent, "child").unwrap();
        graph.node_mut(parent).unwrap().set_position(Vector3::new(0.0, -1.5, 0.0));
        {
            let node = graph.node_mut(child).unwrap();
            node.set_uniform_scale(2.0);
            node.attach_model(Arc::new(LoadedModel::from_meshes("quad", vec![quad_mesh()])));
        }

        let mut program = UniformProgram::new(&programs::depth_program());
        program.activate();
        graph.render(&mut program, MaterialFilter::All);

        let Some(UniformValue::Mat4(model)) = program.recorded_value(&program.commands()[0], "model") else {
            panic!("model matrix not recorded");
        };
        let corner = model * Vector4::new(1.0, 0.0, 1.0, 1.0);
        assert_eq!(corner, Vector4::new(2.0, -1.5, 2.0, 1.0));
    }

    #[test]
    fn test_normal_matrix_of_singular_transform_is_identity() {
        let flat = Matrix4::from_nonuniform_scale(1.0, 0.0, 1.0);
        assert_eq!(normal_matrix(&flat), Matrix3::identity());
    }
}
