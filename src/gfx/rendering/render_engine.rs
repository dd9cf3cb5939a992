//! WGPU-based frame orchestrator
//!
//! Owns the surface, device and every render target, and sequences one frame:
//! shadow pass, Phong pass, PBR overlay, MSAA resolve, present. Commands for
//! all passes go into a single encoder, so submission order is pass order.

use std::sync::Arc;

use anyhow::Context;
use wgpu::TextureFormat;

use crate::config::RendererConfig;
use crate::gfx::camera::Camera;
use crate::gfx::resources::light::DirectionalLight;
use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::resources::texture_store::TextureStore;
use crate::gfx::scene::Scene;
use crate::gfx::shader::ShaderProgram;
use crate::wgpu_utils::GpuContext;

use super::frame::{record_frame, FrameInputs, FramePrograms};
use super::ibl::IblMaps;
use super::main_pass::{LightRig, MainPass, ShadowInputs};
use super::msaa::{choose_sample_count, MsaaCompositor};
use super::pipeline_manager::PipelineManager;
use super::settings::RenderSettings;
use super::shadow_pass::ShadowPass;

/// Passes that depend on the scene's texture store
struct ScenePasses {
    shadow: ShadowPass,
    main: MainPass,
}

/// Core rendering engine managing GPU resources and draw calls
///
/// The RenderEngine handles:
/// - Surface and device management
/// - The multisampled main target and its per-frame resolve
/// - Shadow and colour passes over the scene graph
/// - Surface reconfiguration on resize
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    pipeline_manager: PipelineManager,
    msaa: MsaaCompositor,
    passes: Option<ScenePasses>,
    clear_color: wgpu::Color,
}

impl RenderEngine {
    /// Creates the device, surface and multisampled target for `window`
    ///
    /// The scene passes are built later by [`RenderEngine::prepare_scene`],
    /// once the scene's texture store is attached to [`RenderEngine::context`].
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        renderer_config: &RendererConfig,
    ) -> anyhow::Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request adapter")?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to request a device")?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("Surface reports no formats")?;
        let alpha_mode = surface_capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: present_mode(renderer_config.vsync),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let color_features = adapter.get_texture_format_features(format);
        let depth_features = adapter.get_texture_format_features(TextureResource::DEPTH_FORMAT);
        let sample_count = choose_sample_count(renderer_config.msaa_samples, |count| {
            color_features.flags.sample_count_supported(count)
                && depth_features.flags.sample_count_supported(count)
        });
        let msaa = MsaaCompositor::new(&device, format, config.width, config.height, sample_count);

        let device: Arc<wgpu::Device> = Arc::new(device);
        let queue: Arc<wgpu::Queue> = Arc::new(queue);

        Ok(RenderEngine {
            surface,
            pipeline_manager: PipelineManager::new(device.clone()),
            device,
            queue,
            config,
            format,
            msaa,
            passes: None,
            clear_color: renderer_config.clear_color(),
        })
    }

    /// Handles for creating meshes and textures on this engine's device
    pub fn context(&self) -> GpuContext {
        GpuContext::new(self.device.clone(), self.queue.clone())
    }

    /// Builds the shadow and colour passes against the scene's textures
    ///
    /// The shadow map is registered in `textures`; `ibl` feeds the PBR overlay.
    pub fn prepare_scene(
        &mut self,
        textures: &mut TextureStore,
        ibl: Option<IblMaps>,
        renderer_config: &RendererConfig,
    ) {
        let shadow = ShadowPass::new(
            &mut self.pipeline_manager,
            textures,
            renderer_config.shadow_map_size,
            renderer_config.shadow_volume(),
        );
        let main = MainPass::new(
            &mut self.pipeline_manager,
            self.format,
            self.msaa.sample_count(),
            ibl,
        );
        log::debug!("Compiled {} shaders", self.pipeline_manager.shader_count());
        log::info!(
            "Scene passes ready (shadow map complete: {}, MSAA target complete: {}, colour programs compiled: {})",
            shadow.is_complete(),
            self.msaa.is_complete(),
            main.is_compiled()
        );
        self.passes = Some(ScenePasses { shadow, main });
    }

    /// Renders and presents one frame
    ///
    /// All draws are recorded first (see [`record_frame`]), then the passes
    /// are encoded in the same order into one encoder. Surface loss
    /// reconfigures the surface and skips the frame; nothing is propagated.
    pub fn render_frame(
        &mut self,
        scene: &mut Scene,
        camera: &dyn Camera,
        lights: &mut LightRig,
        settings: &RenderSettings,
    ) {
        let Some(passes) = self.passes.as_mut() else {
            log::warn!("render_frame called before prepare_scene");
            return;
        };

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(error) => {
                log::warn!("Skipping frame: {}", error);
                return;
            }
        };
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let sun = DirectionalLight::with_brightness(settings.brightness);
        let shadow = ShadowInputs {
            map: passes.shadow.texture(),
            light_space: passes.shadow.light_space(&sun),
        };

        let (phong, pbr, ibl) = passes.main.programs_mut();
        let programs = FramePrograms {
            shadow: passes
                .shadow
                .program_mut()
                .map(|p| p as &mut dyn ShaderProgram),
            phong: phong.map(|p| p as &mut dyn ShaderProgram),
            pbr: pbr.map(|p| p as &mut dyn ShaderProgram),
        };
        let inputs = FrameInputs {
            shadow,
            ibl,
            settings,
        };
        record_frame(scene, programs, camera, lights, &inputs);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // PASS 1: shadow depth
        passes
            .shadow
            .encode(&self.device, &self.queue, &mut encoder, &scene.textures);

        // PASS 2 + 3: Phong, then the PBR overlay
        passes.main.encode(
            &self.device,
            &self.queue,
            &mut encoder,
            &scene.textures,
            &self.msaa,
            self.clear_color,
        );

        // PASS 4: resolve onto the surface
        self.msaa.resolve(&mut encoder, &surface_view);

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
    }

    /// Resizes the surface and recreates the multisampled targets
    ///
    /// Zero sizes (minimised windows) are ignored. The shadow map keeps its
    /// fixed resolution.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.msaa.resize(&self.device, width, height);
        log::debug!("Resized to {}x{}", width, height);
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::Fifo
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_follows_vsync() {
        assert_eq!(present_mode(true), wgpu::PresentMode::Fifo);
        assert_eq!(present_mode(false), wgpu::PresentMode::AutoNoVsync);
    }
}
