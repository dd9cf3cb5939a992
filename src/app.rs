use std::sync::Arc;
use std::time::Instant;

use cgmath::{Deg, Vector3};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowAttributes},
};

use crate::config::{AssetPaths, RendererConfig};
use crate::error::AssetError;
use crate::gfx::{
    camera::{CameraController, CameraManager, FlyCamera},
    geometry::PrimitiveType,
    rendering::{
        ibl::{Environment, IblMaps},
        main_pass::LightRig,
        settings::{RenderSettings, SettingsInput},
        RenderEngine,
    },
    resources::material::MaterialBlock,
    scene::{NodeId, Scene},
};

/// Ambient colour of the environment used when the HDR map cannot be read
const FALLBACK_ENVIRONMENT: [f32; 3] = [0.1, 0.1, 0.1];

/// Fly camera five units back from the origin, looking down -Z
///
/// Mouse look is always on; the window grabs and hides the cursor.
fn start_camera(width: u32, height: u32) -> CameraManager {
    let aspect = width as f32 / height.max(1) as f32;
    let camera = FlyCamera::new(Vector3::new(0.0, 0.0, 5.0), aspect);
    CameraManager::new(camera, CameraController::new(true))
}

/// Nodes of the demo scene the app keeps handles to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoScene {
    pub floor: NodeId,
    pub model: NodeId,
    pub pbr_model: NodeId,
}

/// Populates `scene` with the floor, the Phong model and the PBR model
///
/// A model that fails to load aborts the build; the floor may already have
/// been added by then.
pub fn build_demo_scene(scene: &mut Scene, assets: &AssetPaths) -> Result<DemoScene, AssetError> {
    let floor = scene.create_primitive_node("Floor", PrimitiveType::Plane);
    if let Some(node) = scene.graph.node_mut(floor) {
        node.set_position(Vector3::new(0.0, -1.5, 0.0));
        node.set_scale(Vector3::new(5.0, 1.0, 5.0));
    }

    let model = scene.create_model_node("Model", &assets.model)?;
    if let Some(node) = scene.graph.node_mut(model) {
        node.set_position(Vector3::new(0.0, -1.0, 0.0));
        node.set_uniform_scale(0.4);
    }

    let pbr_model = scene.create_model_node("PBR Model", &assets.pbr_model)?;
    if let Some(node) = scene.graph.node_mut(pbr_model) {
        node.set_position(Vector3::new(3.0, 0.0, 0.0));
        node.set_rotation_axis_angle(Deg(90.0), Vector3::unit_x());
        node.set_uniform_scale(0.01);
        node.set_material(
            MaterialBlock::pbr(0.7, 0.3, 1.0)
                .with_material_mask(true)
                .with_velvet(Vector3::new(0.9, 0.1, 0.1)),
        );
    }

    log::info!("Demo scene built with {} nodes", scene.graph.len());
    Ok(DemoScene {
        floor,
        model,
        pbr_model,
    })
}

pub struct PrismApp {
    event_loop: EventLoop<()>,
    app_state: AppState,
}

struct AppState {
    config: RendererConfig,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    scene: Option<Scene>,
    camera_manager: CameraManager,
    lights: LightRig,
    settings: RenderSettings,
    settings_input: SettingsInput,
    last_frame: Instant,
    startup_error: Option<anyhow::Error>,
}

impl PrismApp {
    pub fn new(config: RendererConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;

        let camera_manager = start_camera(config.width, config.height);

        Ok(Self {
            event_loop,
            app_state: AppState {
                settings: config.settings,
                config,
                window: None,
                render_engine: None,
                scene: None,
                camera_manager,
                lights: LightRig::default(),
                settings_input: SettingsInput::new(),
                last_frame: Instant::now(),
                startup_error: None,
            },
        })
    }

    /// Runs the event loop until the window closes
    ///
    /// Startup failures (no adapter, missing model) end the loop and are
    /// returned here.
    pub fn run(mut self) -> anyhow::Result<()> {
        self.event_loop.set_control_flow(ControlFlow::Poll);
        self.event_loop.run_app(&mut self.app_state)?;

        match self.app_state.startup_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = event_loop.create_window(
            WindowAttributes::default()
                .with_title("Prism")
                .with_inner_size(PhysicalSize::new(self.config.width, self.config.height)),
        )?;
        let window = Arc::new(window);
        let (width, height) = window.inner_size().into();
        capture_cursor(&window);

        let mut renderer = pollster::block_on(RenderEngine::new(window.clone(), width, height, &self.config))?;

        let mut scene = Scene::new(Some(renderer.context()));
        build_demo_scene(&mut scene, &self.config.assets)?;

        let environment = Environment::load(&self.config.assets.environment).unwrap_or_else(|error| {
            log::error!("{}; lighting PBR with a uniform environment", error);
            Environment::uniform(FALLBACK_ENVIRONMENT)
        });
        let ibl = IblMaps::create(&environment, &mut scene.textures);
        renderer.prepare_scene(&mut scene.textures, ibl, &self.config);

        self.camera_manager.resize(width, height);
        self.last_frame = Instant::now();
        self.window = Some(window);
        self.render_engine = Some(renderer);
        self.scene = Some(scene);
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.physical_key == PhysicalKey::Code(KeyCode::Escape) && event.state == ElementState::Pressed {
            event_loop.exit();
            return;
        }
        self.camera_manager.process_keyboard_event(event);
        self.settings_input.process_keyboard_event(event);
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.camera_manager.update(dt);
        self.settings.apply(self.settings_input.frame_delta());

        if let (Some(render_engine), Some(scene)) = (self.render_engine.as_mut(), self.scene.as_mut()) {
            render_engine.render_frame(scene, &self.camera_manager.camera, &mut self.lights, &self.settings);
        }
    }
}

/// Confines and hides the cursor so mouse motion always steers the camera
fn capture_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    match grabbed {
        Ok(()) => window.set_cursor_visible(false),
        Err(error) => log::warn!("Cursor capture unavailable: {}", error),
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.startup_error.is_some() {
            return;
        }

        if let Err(error) = self.start(event_loop) {
            log::error!("Startup failed: {:#}", error);
            self.startup_error = Some(error);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::KeyboardInput { event: key_event, .. } => self.handle_key(event_loop, key_event),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.camera_manager.resize(*width, *height);
                if let Some(render_engine) = self.render_engine.as_mut() {
                    render_engine.resize(*width, *height);
                }
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => self.camera_manager.process_window_event(&event),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: winit::event::DeviceEvent,
    ) {
        self.camera_manager.process_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_camera_starts_behind_origin_with_captured_look() {
        let manager = start_camera(1280, 720);
        assert_eq!(manager.camera.position, Vector3::new(0.0, 0.0, 5.0));
        assert!(manager.controller.always_look);
        assert_eq!(manager.camera.pitch(), 0.0);
    }

    #[test]
    fn test_missing_model_aborts_demo_scene() {
        let mut scene = Scene::new(None);
        let assets = AssetPaths {
            model: PathBuf::from("does/not/exist.obj"),
            ..AssetPaths::default()
        };

        let result = build_demo_scene(&mut scene, &assets);
        assert!(matches!(result, Err(AssetError::Obj { .. })));
    }

    #[test]
    fn test_floor_is_placed_before_models_load() {
        let mut scene = Scene::new(None);
        let assets = AssetPaths {
            model: PathBuf::from("does/not/exist.obj"),
            ..AssetPaths::default()
        };
        let _ = build_demo_scene(&mut scene, &assets);

        let root = scene.graph.root();
        let children = scene.graph.children(root).unwrap();
        assert_eq!(children.len(), 1);
        let floor = scene.graph.node(children[0]).unwrap();
        assert_eq!(floor.name, "Floor");
        assert_eq!(floor.position(), Vector3::new(0.0, -1.5, 0.0));
        assert_eq!(floor.scale(), Vector3::new(5.0, 1.0, 5.0));
    }
}
