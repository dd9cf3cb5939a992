use cgmath::{Matrix4, Vector3};
use winit::event::{DeviceEvent, KeyEvent, WindowEvent};

use super::{camera_controller::CameraController, fly_camera::FlyCamera};

/// Remaps OpenGL clip-space depth (-1..1) to wgpu's 0..1
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// What the frame loop needs from a camera
pub trait Camera {
    fn view_matrix(&self) -> Matrix4<f32>;
    fn projection_matrix(&self) -> Matrix4<f32>;
    fn position(&self) -> Vector3<f32>;
    fn front(&self) -> Vector3<f32>;
}

/// Camera plus the controller that drives it from window input
pub struct CameraManager {
    pub camera: FlyCamera,
    pub controller: CameraController,
}

impl CameraManager {
    pub fn new(camera: FlyCamera, controller: CameraController) -> Self {
        Self { camera, controller }
    }

    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        self.controller.process_device_event(event, &mut self.camera);
    }

    pub fn process_window_event(&mut self, event: &WindowEvent) {
        self.controller.process_window_event(event, &mut self.camera);
    }

    pub fn process_keyboard_event(&mut self, event: &KeyEvent) {
        self.controller.process_keyboard_event(event);
    }

    /// Applies held-key movement for a frame lasting `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.controller.update_camera(&mut self.camera, dt);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize_projection(width, height);
    }
}
