use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::fly_camera::{FlyCamera, Movement};

/// Maps held keys and mouse input onto a [`FlyCamera`]
///
/// Mouse look is active while the right button is held, or always when
/// `always_look` is set (cursor grabbed).
#[derive(Debug, Default)]
pub struct CameraController {
    pub always_look: bool,
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    is_look_pressed: bool,
}

impl CameraController {
    pub fn new(always_look: bool) -> Self {
        Self {
            always_look,
            ..Default::default()
        }
    }

    pub fn process_device_event(&mut self, event: &DeviceEvent, camera: &mut FlyCamera) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.always_look || self.is_look_pressed {
                // screen y grows downwards
                camera.process_mouse(delta.0 as f32, -delta.1 as f32);
            }
        }
    }

    pub fn process_window_event(&mut self, event: &WindowEvent, camera: &mut FlyCamera) {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state,
                ..
            } => {
                self.is_look_pressed = *state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => *lines,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 20.0,
                };
                camera.process_scroll(scroll);
            }
            _ => (),
        }
    }

    /// Tracks movement keys; returns true when the key was one of them
    pub fn process_keyboard_event(&mut self, event: &KeyEvent) -> bool {
        let pressed = event.state == ElementState::Pressed;
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };

        let slot = match code {
            KeyCode::KeyW => &mut self.forward,
            KeyCode::KeyS => &mut self.backward,
            KeyCode::KeyA => &mut self.left,
            KeyCode::KeyD => &mut self.right,
            KeyCode::KeyE => &mut self.up,
            KeyCode::KeyQ => &mut self.down,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Moves the camera for every held key
    pub fn update_camera(&self, camera: &mut FlyCamera, dt: f32) {
        let held = [
            (self.forward, Movement::Forward),
            (self.backward, Movement::Backward),
            (self.left, Movement::Left),
            (self.right, Movement::Right),
            (self.up, Movement::Up),
            (self.down, Movement::Down),
        ];
        for (_, movement) in held.iter().filter(|(is_held, _)| *is_held) {
            camera.process_movement(*movement, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn test_idle_controller_keeps_camera_still() {
        let controller = CameraController::new(false);
        let mut camera = FlyCamera::new(Vector3::new(1.0, 2.0, 3.0), 1.0);
        controller.update_camera(&mut camera, 0.5);
        assert_eq!(camera.position, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_look_requires_button_unless_grabbed() {
        let mut controller = CameraController::new(false);
        let mut camera = FlyCamera::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let motion = DeviceEvent::MouseMotion { delta: (0.0, -100.0) };

        controller.process_device_event(&motion, &mut camera);
        assert_eq!(camera.pitch(), 0.0);

        controller.always_look = true;
        controller.process_device_event(&motion, &mut camera);
        assert!((camera.pitch() - 10.0).abs() < 1e-5);
    }
}
