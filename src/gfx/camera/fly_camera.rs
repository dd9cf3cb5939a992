use cgmath::*;

use super::camera_utils::{Camera, OPENGL_TO_WGPU_MATRIX};

/// Units per second for WASD movement
pub const MOVEMENT_SPEED: f32 = 2.5;
/// Units per second for Q/E movement
pub const VERTICAL_SPEED: f32 = 3.0;
/// Degrees per pixel of mouse motion
pub const MOUSE_SENSITIVITY: f32 = 0.1;
pub const PITCH_LIMIT: f32 = 89.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 90.0;

/// Direction of a held movement key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// First-person camera steered by yaw and pitch in degrees
#[derive(Debug, Clone, Copy)]
pub struct FlyCamera {
    pub position: Vector3<f32>,
    front: Vector3<f32>,
    pub world_up: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    /// Vertical field of view in degrees
    zoom: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera for FlyCamera {
    fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.position);
        Matrix4::look_at_rh(eye, eye + self.front, self.world_up)
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(Deg(self.zoom), self.aspect, self.znear, self.zfar)
    }

    fn position(&self) -> Vector3<f32> {
        self.position
    }

    fn front(&self) -> Vector3<f32> {
        self.front
    }
}

impl FlyCamera {
    /// Camera at `position` looking down -Z
    pub fn new(position: Vector3<f32>, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            front: -Vector3::unit_z(),
            world_up: Vector3::unit_y(),
            yaw: -90.0,
            pitch: 0.0,
            zoom: 45.0,
            aspect,
            znear: 0.1,
            zfar: 100.0,
        };
        camera.update_vectors();
        camera
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn process_movement(&mut self, movement: Movement, dt: f32) {
        let velocity = MOVEMENT_SPEED * dt;
        let vertical = VERTICAL_SPEED * dt;
        let right = self.front.cross(self.world_up).normalize();

        match movement {
            Movement::Forward => self.position += self.front * velocity,
            Movement::Backward => self.position -= self.front * velocity,
            Movement::Left => self.position -= right * velocity,
            Movement::Right => self.position += right * velocity,
            Movement::Up => self.position += self.world_up * vertical,
            Movement::Down => self.position -= self.world_up * vertical,
        }
    }

    /// Turns by mouse offsets in pixels; positive `dy` looks up
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch + dy * MOUSE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Narrows the field of view for positive scroll
    pub fn process_scroll(&mut self, dy: f32) {
        self.zoom = (self.zoom - dy).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn resize_projection(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (Deg(self.yaw), Deg(self.pitch));
        self.front = Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_front_is_minus_z() {
        let camera = FlyCamera::new(Vector3::new(0.0, 0.0, 5.0), 16.0 / 9.0);
        assert!((camera.front() - -Vector3::unit_z()).magnitude() < 1e-6);
        assert_eq!(camera.yaw(), -90.0);
        assert_eq!(camera.pitch(), 0.0);
    }

    #[test]
    fn test_pitch_clamped_under_large_input() {
        let mut camera = FlyCamera::new(Vector3::new(0.0, 0.0, 5.0), 1.0);
        for _ in 0..1000 {
            camera.process_mouse(13.0, 5_000.0);
        }
        assert_eq!(camera.pitch(), 89.0);

        for _ in 0..1000 {
            camera.process_mouse(-7.0, -1.0e7);
        }
        assert_eq!(camera.pitch(), -89.0);
        assert!(camera.front().y > -1.0);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut camera = FlyCamera::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        camera.process_scroll(500.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);
        camera.process_scroll(-500.0);
        assert_eq!(camera.zoom(), MAX_ZOOM);
    }

    #[test]
    fn test_movement_speeds() {
        let mut camera = FlyCamera::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        camera.process_movement(Movement::Forward, 2.0);
        assert!((camera.position - Vector3::new(0.0, 0.0, -5.0)).magnitude() < 1e-5);

        camera.process_movement(Movement::Up, 1.0);
        assert!((camera.position.y - 3.0).abs() < 1e-6);

        camera.process_movement(Movement::Right, 1.0);
        assert!((camera.position.x - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_projection_maps_near_plane_to_zero_depth() {
        let camera = FlyCamera::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let clip = camera.projection_matrix() * Vector4::new(0.0, 0.0, -camera.znear, 1.0);
        assert!((clip.z / clip.w).abs() < 1e-5);
    }
}
