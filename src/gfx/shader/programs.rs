//! Uniform blocks and samplers of the built-in shaders
//!
//! Each descriptor mirrors the `Uniforms` struct and group 1 bindings of its
//! WGSL source member by member.

use super::uniform_layout::{UniformKind, UniformLayout};
use super::{ProgramDescriptor, SamplerBinding, SamplerKind};

/// Number of point lights in the fixed light array
pub const POINT_LIGHT_COUNT: usize = 2;

const DIR_LIGHT: &[(&str, UniformKind)] = &[
    ("direction", UniformKind::Vec3),
    ("ambient", UniformKind::Vec3),
    ("diffuse", UniformKind::Vec3),
    ("specular", UniformKind::Vec3),
];

const POINT_LIGHT: &[(&str, UniformKind)] = &[
    ("position", UniformKind::Vec3),
    ("ambient", UniformKind::Vec3),
    ("diffuse", UniformKind::Vec3),
    ("specular", UniformKind::Vec3),
    ("constant", UniformKind::Float),
    ("linear", UniformKind::Float),
    ("quadratic", UniformKind::Float),
];

const SPOT_LIGHT: &[(&str, UniformKind)] = &[
    ("position", UniformKind::Vec3),
    ("direction", UniformKind::Vec3),
    ("ambient", UniformKind::Vec3),
    ("diffuse", UniformKind::Vec3),
    ("specular", UniformKind::Vec3),
    ("cutOff", UniformKind::Float),
    ("outerCutOff", UniformKind::Float),
    ("constant", UniformKind::Float),
    ("linear", UniformKind::Float),
    ("quadratic", UniformKind::Float),
];

pub fn phong_program() -> ProgramDescriptor {
    let layout = UniformLayout::builder()
        .field("projection", UniformKind::Mat4)
        .field("view", UniformKind::Mat4)
        .field("model", UniformKind::Mat4)
        .field("normalMatrix", UniformKind::Mat3)
        .field("lightSpaceMatrix", UniformKind::Mat4)
        .field("viewPos", UniformKind::Vec3)
        .field("enableSoftShadows", UniformKind::Bool)
        .field("brightness", UniformKind::Float)
        .field("hasDiffuseTexture", UniformKind::Bool)
        .field("hasSpecularTexture", UniformKind::Bool)
        .structure("dirLight", DIR_LIGHT)
        .struct_array("pointLights", POINT_LIGHT_COUNT, POINT_LIGHT)
        .structure("spotLight", SPOT_LIGHT)
        .structure(
            "material",
            &[("shininess", UniformKind::Float), ("opacity", UniformKind::Float)],
        )
        .build();

    ProgramDescriptor {
        label: "Phong".to_string(),
        shader_source: include_str!("../rendering/shaders/phong.wgsl"),
        layout,
        samplers: vec![
            SamplerBinding::new("material.texture_diffuse", SamplerKind::Color2d),
            SamplerBinding::new("material.texture_specular", SamplerKind::Color2d),
            SamplerBinding::new("shadowMap", SamplerKind::Depth),
        ],
        vertex_only: false,
    }
}

pub fn pbr_program() -> ProgramDescriptor {
    let layout = UniformLayout::builder()
        .field("projection", UniformKind::Mat4)
        .field("view", UniformKind::Mat4)
        .field("model", UniformKind::Mat4)
        .field("normalMatrix", UniformKind::Mat3)
        .field("viewPos", UniformKind::Vec3)
        .field("brightness", UniformKind::Float)
        .array("lightPositions", POINT_LIGHT_COUNT, UniformKind::Vec3)
        .array("lightColors", POINT_LIGHT_COUNT, UniformKind::Vec3)
        .field("velvetColor", UniformKind::Vec3)
        .field("velvetStrength", UniformKind::Float)
        .field("useVelvet", UniformKind::Bool)
        .field("velvetRoughness", UniformKind::Float)
        .field("velvetMetallic", UniformKind::Float)
        .field("useMaterialMask", UniformKind::Bool)
        .field("u_NormalStrength", UniformKind::Float)
        .field("u_AOStrength", UniformKind::Float)
        .field("hasDiffuseTexture", UniformKind::Bool)
        .field("hasNormalTexture", UniformKind::Bool)
        .field("hasMetallicRoughnessTexture", UniformKind::Bool)
        .field("hasOcclusionTexture", UniformKind::Bool)
        .structure(
            "material",
            &[
                ("metallic", UniformKind::Float),
                ("roughness", UniformKind::Float),
                ("ao", UniformKind::Float),
                ("opacity", UniformKind::Float),
            ],
        )
        .build();

    ProgramDescriptor {
        label: "PBR".to_string(),
        shader_source: include_str!("../rendering/shaders/pbr.wgsl"),
        layout,
        samplers: vec![
            SamplerBinding::new("material.texture_diffuse", SamplerKind::Color2d),
            SamplerBinding::new("material.texture_normal", SamplerKind::Color2d),
            SamplerBinding::new("material.texture_metallic_roughness", SamplerKind::Color2d),
            SamplerBinding::new("material.texture_occlusion", SamplerKind::Color2d),
            SamplerBinding::new("irradianceMap", SamplerKind::Cube),
            SamplerBinding::new("prefilterMap", SamplerKind::Cube),
            SamplerBinding::new("brdfLUT", SamplerKind::Color2d),
        ],
        vertex_only: false,
    }
}

pub fn depth_program() -> ProgramDescriptor {
    let layout = UniformLayout::builder()
        .field("lightSpaceMatrix", UniformKind::Mat4)
        .field("model", UniformKind::Mat4)
        .build();

    ProgramDescriptor {
        label: "Depth".to_string(),
        shader_source: include_str!("../rendering/shaders/depth.wgsl"),
        layout,
        samplers: Vec::new(),
        vertex_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phong_block_matches_wgsl_offsets() {
        let layout = phong_program().layout;

        assert_eq!(layout.slot("normalMatrix").unwrap().offset, 192);
        assert_eq!(layout.slot("lightSpaceMatrix").unwrap().offset, 240);
        assert_eq!(layout.slot("viewPos").unwrap().offset, 304);
        assert_eq!(layout.slot("enableSoftShadows").unwrap().offset, 316);
        assert_eq!(layout.slot("hasSpecularTexture").unwrap().offset, 328);
        assert_eq!(layout.slot("dirLight.direction").unwrap().offset, 336);
        assert_eq!(layout.slot("pointLights[0].position").unwrap().offset, 400);
        assert_eq!(layout.slot("pointLights[1].quadratic").unwrap().offset, 548);
        assert_eq!(layout.slot("spotLight.position").unwrap().offset, 560);
        assert_eq!(layout.slot("spotLight.quadratic").unwrap().offset, 652);
        assert_eq!(layout.slot("material.shininess").unwrap().offset, 656);
        assert_eq!(layout.size(), 672);
    }

    #[test]
    fn test_pbr_block_matches_wgsl_offsets() {
        let layout = pbr_program().layout;

        assert_eq!(layout.slot("brightness").unwrap().offset, 252);
        assert_eq!(layout.slot("lightPositions[0]").unwrap().offset, 256);
        assert_eq!(layout.slot("lightColors[1]").unwrap().offset, 304);
        assert_eq!(layout.slot("velvetColor").unwrap().offset, 320);
        assert_eq!(layout.slot("velvetStrength").unwrap().offset, 332);
        assert_eq!(layout.slot("hasOcclusionTexture").unwrap().offset, 372);
        assert_eq!(layout.slot("material.metallic").unwrap().offset, 384);
        assert_eq!(layout.size(), 400);
    }

    #[test]
    fn test_depth_block() {
        let program = depth_program();
        assert!(program.vertex_only);
        assert!(program.samplers.is_empty());
        assert_eq!(program.layout.size(), 128);
    }
}
