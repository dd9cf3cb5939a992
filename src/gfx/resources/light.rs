//! Light descriptors and their uniform upload
//!
//! Lights are plain data outside the scene graph. Once per frame the main
//! pass writes them into the active program under fixed uniform names.

use cgmath::{ortho, Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};

use crate::gfx::camera::camera_utils::OPENGL_TO_WGPU_MATRIX;
use crate::gfx::shader::programs::POINT_LIGHT_COUNT;
use crate::gfx::shader::ShaderProgram;

const POINT_LIGHT_UNIFORMS: [[&str; 7]; POINT_LIGHT_COUNT] = [
    [
        "pointLights[0].position",
        "pointLights[0].ambient",
        "pointLights[0].diffuse",
        "pointLights[0].specular",
        "pointLights[0].constant",
        "pointLights[0].linear",
        "pointLights[0].quadratic",
    ],
    [
        "pointLights[1].position",
        "pointLights[1].ambient",
        "pointLights[1].diffuse",
        "pointLights[1].specular",
        "pointLights[1].constant",
        "pointLights[1].linear",
        "pointLights[1].quadratic",
    ],
];

const PBR_LIGHT_UNIFORMS: [[&str; 2]; POINT_LIGHT_COUNT] = [
    ["lightPositions[0]", "lightColors[0]"],
    ["lightPositions[1]", "lightColors[1]"],
];

/// Share of a point light's diffuse/specular the Phong path uses
const PHONG_POINT_SCALE: f32 = 0.7;
/// Share of a point light's diffuse used as PBR radiance
const PBR_POINT_SCALE: f32 = 0.8;

/// Sun-like light; also the shadow caster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::with_brightness(1.0)
    }
}

impl DirectionalLight {
    /// The scene light with ambient and diffuse scaled by `brightness`
    pub fn with_brightness(brightness: f32) -> Self {
        Self {
            direction: Vector3::new(-0.5, -1.0, -0.5).normalize(),
            ambient: Vector3::new(1.0, 1.0, 1.0) * (0.3 * brightness),
            diffuse: Vector3::new(1.0, 1.0, 1.0) * (0.7 * brightness),
            specular: Vector3::new(0.5, 0.5, 0.5),
        }
    }

    pub fn upload(&self, shader: &mut dyn ShaderProgram) {
        shader.set_vec3("dirLight.direction", self.direction);
        shader.set_vec3("dirLight.ambient", self.ambient);
        shader.set_vec3("dirLight.diffuse", self.diffuse);
        shader.set_vec3("dirLight.specular", self.specular);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    /// A light with the scene's usual 0.1 ambient, white specular and ~50 unit falloff
    pub fn new(position: Vector3<f32>, diffuse: Vector3<f32>) -> Self {
        Self {
            position,
            ambient: Vector3::new(0.1, 0.1, 0.1),
            diffuse,
            specular: Vector3::new(1.0, 1.0, 1.0),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }

    /// The warm and cool pair lighting the demo scene
    pub fn scene_defaults() -> [PointLight; POINT_LIGHT_COUNT] {
        [
            PointLight::new(Vector3::new(2.0, 1.5, 1.0), Vector3::new(0.8, 0.8, 0.6)),
            PointLight::new(Vector3::new(-3.0, 1.5, -2.0), Vector3::new(0.6, 0.8, 0.8)),
        ]
    }
}

/// Writes the point light array into a Phong program
pub fn upload_point_lights(shader: &mut dyn ShaderProgram, lights: &[PointLight; POINT_LIGHT_COUNT]) {
    for (light, names) in lights.iter().zip(POINT_LIGHT_UNIFORMS.iter()) {
        shader.set_vec3(names[0], light.position);
        shader.set_vec3(names[1], light.ambient);
        shader.set_vec3(names[2], light.diffuse * PHONG_POINT_SCALE);
        shader.set_vec3(names[3], light.specular * PHONG_POINT_SCALE);
        shader.set_float(names[4], light.constant);
        shader.set_float(names[5], light.linear);
        shader.set_float(names[6], light.quadratic);
    }
}

/// Writes light positions and colours into a PBR program
pub fn upload_pbr_lights(shader: &mut dyn ShaderProgram, lights: &[PointLight; POINT_LIGHT_COUNT]) {
    for (light, names) in lights.iter().zip(PBR_LIGHT_UNIFORMS.iter()) {
        shader.set_vec3(names[0], light.position);
        shader.set_vec3(names[1], light.diffuse * PBR_POINT_SCALE);
    }
}

/// Flashlight cone; the frame loop keeps it on the camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    /// Cosine of the inner cone angle
    pub cut_off: f32,
    /// Cosine of the outer cone angle
    pub outer_cut_off: f32,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            direction: Vector3::new(0.0, 0.0, -1.0),
            ambient: Vector3::new(0.1, 0.1, 0.1),
            diffuse: Vector3::new(0.8, 0.8, 0.8),
            specular: Vector3::new(1.0, 1.0, 1.0),
            cut_off: cos_deg(12.5),
            outer_cut_off: cos_deg(17.5),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

impl SpotLight {
    pub fn follow(&mut self, position: Vector3<f32>, direction: Vector3<f32>) {
        self.position = position;
        self.direction = direction;
    }

    pub fn upload(&self, shader: &mut dyn ShaderProgram) {
        shader.set_vec3("spotLight.position", self.position);
        shader.set_vec3("spotLight.direction", self.direction);
        shader.set_vec3("spotLight.ambient", self.ambient);
        shader.set_vec3("spotLight.diffuse", self.diffuse);
        shader.set_vec3("spotLight.specular", self.specular);
        shader.set_float("spotLight.cutOff", self.cut_off);
        shader.set_float("spotLight.outerCutOff", self.outer_cut_off);
        shader.set_float("spotLight.constant", self.constant);
        shader.set_float("spotLight.linear", self.linear);
        shader.set_float("spotLight.quadratic", self.quadratic);
    }
}

fn cos_deg(degrees: f32) -> f32 {
    cgmath::Angle::cos(Deg(degrees))
}

/// Orthographic light-space transform for a directional shadow caster
///
/// The light sits 10 units back along `-direction` looking at the origin and
/// covers `±half_extent` horizontally and `near..far` in depth. Depth comes
/// out in wgpu's 0..1 range.
pub fn light_space_matrix(direction: Vector3<f32>, half_extent: f32, near: f32, far: f32) -> Matrix4<f32> {
    let eye = Point3::from_vec(-direction.normalize() * 10.0);
    // looking straight down the Y axis needs a different up vector
    let up = if direction.normalize().y.abs() > 0.999 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    let view = Matrix4::look_at_rh(eye, Point3::origin(), up);
    let projection = ortho(-half_extent, half_extent, -half_extent, half_extent, near, far);
    OPENGL_TO_WGPU_MATRIX * projection * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::shader::{programs, UniformProgram, UniformValue};
    use cgmath::Vector4;

    #[test]
    fn test_light_space_keeps_origin_centered() {
        let direction = DirectionalLight::default().direction;
        let matrix = light_space_matrix(direction, 15.0, 0.1, 30.0);

        let origin = matrix * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(origin.x.abs() < 1e-5);
        assert!(origin.y.abs() < 1e-5);
        // origin is 10 units from the light: depth (10 - 0.1) / (30 - 0.1)
        assert!((origin.z - 9.9 / 29.9).abs() < 1e-5);
        assert!((origin.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_light_space_depth_range() {
        let direction = Vector3::new(0.0, 0.0, -1.0);
        let matrix = light_space_matrix(direction, 15.0, 0.1, 30.0);

        // eye at z = 10 looking down -z
        let near = matrix * Vector4::new(0.0, 0.0, 9.9, 1.0);
        let far = matrix * Vector4::new(0.0, 0.0, -20.0, 1.0);
        let edge = matrix * Vector4::new(15.0, 0.0, 0.0, 1.0);
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
        assert!((edge.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_vertical_light_direction_is_finite() {
        let matrix = light_space_matrix(Vector3::new(0.0, -1.0, 0.0), 15.0, 0.1, 30.0);
        let p = matrix * Vector4::new(1.0, 0.0, 1.0, 1.0);
        assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
    }

    #[test]
    fn test_point_lights_scale_per_path() {
        let lights = PointLight::scene_defaults();
        let mut phong = UniformProgram::new(&programs::phong_program());
        let mut pbr = UniformProgram::new(&programs::pbr_program());
        upload_point_lights(&mut phong, &lights);
        upload_pbr_lights(&mut pbr, &lights);

        assert_eq!(
            phong.value("pointLights[1].position"),
            Some(UniformValue::Vec3(Vector3::new(-3.0, 1.5, -2.0)))
        );
        assert_eq!(
            phong.value("pointLights[0].quadratic"),
            Some(UniformValue::Float(0.032))
        );
        assert_eq!(
            phong.value("pointLights[0].diffuse"),
            Some(UniformValue::Vec3(Vector3::new(0.8, 0.8, 0.6) * 0.7))
        );
        assert_eq!(
            pbr.value("lightColors[1]"),
            Some(UniformValue::Vec3(Vector3::new(0.6, 0.8, 0.8) * 0.8))
        );
    }

    #[test]
    fn test_directional_light_tracks_brightness() {
        let light = DirectionalLight::with_brightness(2.0);
        assert!((light.ambient.x - 0.6).abs() < 1e-6);
        assert!((light.diffuse.x - 1.4).abs() < 1e-6);
        assert_eq!(light.specular, Vector3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_spot_cone() {
        let spot = SpotLight::default();
        assert!(spot.cut_off > spot.outer_cut_off);
        assert!((spot.cut_off - 12.5f32.to_radians().cos()).abs() < 1e-6);
    }
}
