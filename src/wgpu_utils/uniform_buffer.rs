/// Uniform buffer holding many fixed-stride blocks, bound with dynamic offsets
///
/// The buffer grows (to the next power of two) when a frame records more
/// blocks than fit; growing replaces the `wgpu::Buffer`, so bind groups that
/// reference it must be rebuilt when [`DynamicUniformBuffer::upload`] reports
/// a reallocation.
pub struct DynamicUniformBuffer {
    label: String,
    buffer: wgpu::Buffer,
    previous_content: Vec<u8>,
}

impl DynamicUniformBuffer {
    pub fn new(device: &wgpu::Device, label: &str, initial_size: u64) -> Self {
        Self {
            label: label.to_string(),
            buffer: Self::create(device, label, initial_size.max(256)),
            previous_content: Vec::new(),
        }
    }

    fn create(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("DynamicUniformBuffer: {}", label)),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Writes `content`, skipping the write when nothing changed
    ///
    /// Returns true when the buffer had to be reallocated.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, content: &[u8]) -> bool {
        let mut reallocated = false;
        if content.len() as u64 > self.buffer.size() {
            let size = (content.len() as u64).next_power_of_two();
            log::debug!("Growing uniform buffer '{}' to {} bytes", self.label, size);
            self.buffer = Self::create(device, &self.label, size);
            self.previous_content.clear();
            reallocated = true;
        }

        if content.is_empty() || self.previous_content == content {
            return reallocated;
        }
        queue.write_buffer(&self.buffer, 0, content);
        self.previous_content = content.to_vec();
        reallocated
    }

    /// Binding of one block of `block_size` bytes; the offset is supplied at draw time
    pub fn binding_resource(&self, block_size: u64) -> wgpu::BindingResource {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: wgpu::BufferSize::new(block_size),
        })
    }

}
