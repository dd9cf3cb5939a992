//! # Scene Management Module
//!
//! The scene graph, the things its nodes draw, and the factory that builds
//! them.
//!
//! ## Key Components
//!
//! - [`SceneGraph`] - arena of [`Node`]s with transform propagation and draw traversal
//! - [`Scene`] - the graph plus its textures and shared models; builds nodes
//! - [`Mesh`] - immutable indexed triangle mesh with texture bindings
//! - [`Model`] - shared external model loaded from OBJ or glTF
//! - [`Vertex3D`] - vertex format shared by every pipeline
//!
//! ## Usage
//!
//! ```no_run
//! use prism::gfx::geometry::PrimitiveType;
//! use prism::gfx::scene::Scene;
//! use cgmath::Vector3;
//!
//! let mut scene = Scene::new(None);
//! let floor = scene.create_primitive_node("floor", PrimitiveType::Plane);
//! if let Some(node) = scene.graph.node_mut(floor) {
//!     node.set_position(Vector3::new(0.0, -1.5, 0.0));
//!     node.set_scale(Vector3::new(5.0, 1.0, 5.0));
//! }
//! ```

pub mod graph;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod vertex;

pub use graph::{Drawable, Node, NodeId, SceneGraph};
pub use mesh::{Mesh, TextureBinding, TextureKind};
pub use model::{LoadedModel, Model};
pub use scene::Scene;
pub use vertex::Vertex3D;
