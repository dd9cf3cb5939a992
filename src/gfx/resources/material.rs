//! Material parameters for the Phong and PBR paths
//!
//! One [`MaterialBlock`] per scene node covers both shading models at once.
//! The traversal pushes the whole block before drawing a node; each program
//! picks up the names it declares and ignores the rest.

use cgmath::Vector3;

use crate::gfx::shader::ShaderProgram;

/// Which pipeline a node is meant to be drawn by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialType {
    #[default]
    Phong,
    Pbr,
}

/// CPU-side shading parameters of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialBlock {
    pub material_type: MaterialType,
    pub shininess: f32,
    pub opacity: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    pub use_velvet: bool,
    pub velvet_color: Vector3<f32>,
    pub velvet_strength: f32,
    pub velvet_roughness: f32,
    pub velvet_metallic: f32,
    pub use_material_mask: bool,
}

impl Default for MaterialBlock {
    fn default() -> Self {
        Self {
            material_type: MaterialType::Phong,
            shininess: 32.0,
            opacity: 1.0,
            metallic: 0.5,
            roughness: 0.5,
            ao: 1.0,
            use_velvet: false,
            velvet_color: Vector3::new(0.8, 0.1, 0.1),
            velvet_strength: 0.7,
            velvet_roughness: 0.85,
            velvet_metallic: 0.05,
            use_material_mask: false,
        }
    }
}

impl MaterialBlock {
    /// A PBR material with the given metallic/roughness/AO response
    pub fn pbr(metallic: f32, roughness: f32, ao: f32) -> Self {
        Self {
            material_type: MaterialType::Pbr,
            metallic,
            roughness,
            ao,
            ..Default::default()
        }
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    /// Enables the velvet sheen lobe with the given tint
    pub fn with_velvet(mut self, color: Vector3<f32>) -> Self {
        self.use_velvet = true;
        self.velvet_color = color;
        self
    }

    pub fn with_material_mask(mut self, enabled: bool) -> Self {
        self.use_material_mask = enabled;
        self
    }

    /// Writes every parameter to `shader` under its uniform name
    pub fn apply(&self, shader: &mut dyn ShaderProgram) {
        shader.set_float("material.shininess", self.shininess);
        shader.set_float("material.opacity", self.opacity);
        shader.set_float("material.metallic", self.metallic);
        shader.set_float("material.roughness", self.roughness);
        shader.set_float("material.ao", self.ao);

        shader.set_bool("useVelvet", self.use_velvet);
        shader.set_vec3("velvetColor", self.velvet_color);
        shader.set_float("velvetStrength", self.velvet_strength);
        shader.set_float("velvetRoughness", self.velvet_roughness);
        shader.set_float("velvetMetallic", self.velvet_metallic);
        shader.set_bool("useMaterialMask", self.use_material_mask);
    }
}

/// Selects which nodes a traversal draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialFilter {
    #[default]
    All,
    Only(MaterialType),
}

impl MaterialFilter {
    pub fn accepts(self, material_type: MaterialType) -> bool {
        match self {
            MaterialFilter::All => true,
            MaterialFilter::Only(wanted) => wanted == material_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::shader::{programs, ShaderProgram, UniformProgram, UniformValue};

    #[test]
    fn test_defaults() {
        let material = MaterialBlock::default();
        assert_eq!(material.material_type, MaterialType::Phong);
        assert_eq!(material.shininess, 32.0);
        assert_eq!(material.velvet_roughness, 0.85);
        assert!(!material.use_velvet);
        assert!(!material.use_material_mask);
    }

    #[test]
    fn test_apply_reaches_both_programs() {
        let material = MaterialBlock::pbr(0.7, 0.3, 1.0)
            .with_velvet(Vector3::new(0.9, 0.1, 0.1))
            .with_material_mask(true);

        let mut phong = UniformProgram::new(&programs::phong_program());
        let mut pbr = UniformProgram::new(&programs::pbr_program());
        phong.activate();
        pbr.activate();
        material.apply(&mut phong);
        material.apply(&mut pbr);

        assert_eq!(phong.value("material.shininess"), Some(UniformValue::Float(32.0)));
        assert_eq!(phong.value("useVelvet"), None);
        assert_eq!(pbr.value("material.metallic"), Some(UniformValue::Float(0.7)));
        assert_eq!(pbr.value("material.roughness"), Some(UniformValue::Float(0.3)));
        assert_eq!(pbr.value("useVelvet"), Some(UniformValue::Bool(true)));
        assert_eq!(pbr.value("useMaterialMask"), Some(UniformValue::Bool(true)));
        assert_eq!(
            pbr.value("velvetColor"),
            Some(UniformValue::Vec3(Vector3::new(0.9, 0.1, 0.1)))
        );
    }

    #[test]
    fn test_filter() {
        assert!(MaterialFilter::All.accepts(MaterialType::Pbr));
        assert!(MaterialFilter::Only(MaterialType::Phong).accepts(MaterialType::Phong));
        assert!(!MaterialFilter::Only(MaterialType::Phong).accepts(MaterialType::Pbr));
    }
}
