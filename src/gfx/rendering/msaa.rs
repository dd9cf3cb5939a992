//! Multisampled offscreen target resolved onto the surface once per frame

use crate::gfx::resources::texture_resource::TextureResource;

use super::frame::FrameStage;

/// Sample counts every wgpu backend supports for renderable formats
pub const GUARANTEED_SAMPLE_COUNTS: [u32; 2] = [1, 4];

/// Picks the sample count to render with
///
/// Counts the adapter cannot render with fall back to 4; a single sample is
/// promoted to 4 too, since the compositor always resolves.
pub fn choose_sample_count(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    if requested > 1 && requested.is_power_of_two() && supported(requested) {
        requested
    } else {
        if requested != 4 {
            log::warn!("MSAA sample count {} unavailable, using 4", requested);
        }
        4
    }
}

/// Owns the multisampled colour and depth/stencil attachments of the main pass
///
/// All colour rendering targets these attachments; [`MsaaCompositor::resolve`]
/// then downsamples the colour samples into the presentable surface. An
/// incomplete target is reported once and rendering carries on.
pub struct MsaaCompositor {
    color: TextureResource,
    depth: TextureResource,
    format: wgpu::TextureFormat,
    sample_count: u32,
    complete: bool,
}

impl MsaaCompositor {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32, sample_count: u32) -> Self {
        let (color, depth, complete) = Self::create_targets(device, format, width, height, sample_count);
        log::info!("MSAA target {}x{} with {} samples", width, height, sample_count);
        Self {
            color,
            depth,
            format,
            sample_count,
            complete,
        }
    }

    fn create_targets(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> (TextureResource, TextureResource, bool) {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let color = TextureResource::create_msaa_color_target(device, format, width, height, sample_count);
        let depth = TextureResource::create_depth_stencil_target(device, width, height, sample_count);
        let complete = match pollster::block_on(device.pop_error_scope()) {
            Some(error) => {
                log::error!("MSAA framebuffer is incomplete: {}", error);
                false
            }
            None => true,
        };
        (color, depth, complete)
    }

    /// Recreates both attachments at the new surface size
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (color, depth, complete) = Self::create_targets(device, self.format, width, height, self.sample_count);
        self.color = color;
        self.depth = depth;
        self.complete = complete;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Colour attachment; cleared to `clear` or loaded when `None`
    pub fn color_attachment(&self, clear: Option<wgpu::Color>) -> wgpu::RenderPassColorAttachment<'_> {
        wgpu::RenderPassColorAttachment {
            view: &self.color.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                store: wgpu::StoreOp::Store,
            },
        }
    }

    /// Depth/stencil attachment; cleared or loaded
    pub fn depth_attachment(&self, clear: bool) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        let (depth_load, stencil_load) = if clear {
            (wgpu::LoadOp::Clear(1.0), wgpu::LoadOp::Clear(0))
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations {
                load: depth_load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: Some(wgpu::Operations {
                load: stencil_load,
                store: wgpu::StoreOp::Store,
            }),
        }
    }

    /// Resolves the multisampled colour into `target`
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(FrameStage::Resolve.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color.view,
                resolve_target: Some(target),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Discard,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_count_is_kept() {
        assert_eq!(choose_sample_count(8, |n| n <= 8), 8);
        assert_eq!(choose_sample_count(4, |_| true), 4);
    }

    #[test]
    fn test_unsupported_counts_fall_back_to_four() {
        assert_eq!(choose_sample_count(8, |n| n == 4), 4);
        assert_eq!(choose_sample_count(1, |_| true), 4);
        assert_eq!(choose_sample_count(3, |_| true), 4);
        assert!(GUARANTEED_SAMPLE_COUNTS.contains(&choose_sample_count(16, |_| false)));
    }
}
