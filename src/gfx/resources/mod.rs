//! GPU resource management
//!
//! Textures, lights and material parameters consumed by the shader programs.

pub mod light;
pub mod material;
pub mod texture_resource;
pub mod texture_store;

// Re-export main types
pub use material::{MaterialBlock, MaterialFilter, MaterialType};
pub use texture_resource::TextureResource;
pub use texture_store::{TexelImage, TextureId, TextureStore};
