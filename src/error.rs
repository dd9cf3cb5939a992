//! Error types shared across the renderer
//!
//! Construction-time failures are the only failures that travel as values.
//! Per-frame rendering never returns errors; GPU faults in the hot path show
//! up as visual corruption only.

use std::path::PathBuf;

use crate::gfx::scene::graph::NodeId;

/// Structural errors raised by the scene graph arena
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist or was destroyed")]
    StaleNode(NodeId),
    #[error("node {child:?} already has a parent")]
    AlreadyParented { child: NodeId },
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the root node cannot be detached or destroyed")]
    RootImmutable,
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Failures while loading external assets (models, textures, environment maps)
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load OBJ model '{path}': {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed to load glTF model '{path}': {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to decode image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported model format '{0}'")]
    UnsupportedFormat(PathBuf),
    #[error("model '{0}' contains no drawable meshes")]
    EmptyModel(PathBuf),
}

/// Failures while reading the renderer configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
