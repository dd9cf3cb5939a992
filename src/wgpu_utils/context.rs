use std::sync::Arc;

/// Shared handles to the wgpu device and queue
///
/// Handed to everything that creates GPU resources outside the render engine
/// (meshes, textures, IBL maps).
#[derive(Clone, Debug)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }
}
