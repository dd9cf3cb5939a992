//! Renderer configuration, optionally read from `prism.json`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gfx::rendering::settings::RenderSettings;
use crate::gfx::rendering::shadow_pass::ShadowVolume;

/// Asset files the demo scene loads at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Phong-shaded model
    pub model: PathBuf,
    /// PBR-shaded model
    pub pbr_model: PathBuf,
    /// Equirectangular HDR environment for image based lighting
    pub environment: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/nanosuit/nanosuit.obj"),
            pbr_model: PathBuf::from("models/ToyCar/glTF/ToyCar.gltf"),
            environment: PathBuf::from("textures/industrial_workshop_foundry_4k.hdr"),
        }
    }
}

/// Everything the app and render engine read at startup
///
/// Missing fields take their defaults, so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub msaa_samples: u32,
    pub shadow_map_size: u32,
    pub shadow_half_extent: f32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    pub clear_color: [f32; 3],
    pub vsync: bool,
    pub assets: AssetPaths,
    pub settings: RenderSettings,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let volume = ShadowVolume::default();
        Self {
            width: 1280,
            height: 720,
            msaa_samples: 4,
            shadow_map_size: 2048,
            shadow_half_extent: volume.half_extent,
            shadow_near: volume.near,
            shadow_far: volume.far,
            clear_color: [0.05, 0.05, 0.05],
            vsync: true,
            assets: AssetPaths::default(),
            settings: RenderSettings::default(),
        }
    }
}

impl RendererConfig {
    pub const FILE_NAME: &'static str = "prism.json";

    /// Reads and parses a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(text)?;
        Ok(Self {
            settings: config.settings.clamped(),
            ..config
        })
    }

    /// Reads `path` if it exists; a missing file gives the defaults and a
    /// broken one is logged and ignored
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No config at '{}', using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from '{}'", path.display());
                config
            }
            Err(error) => {
                log::error!("{}; using defaults", error);
                Self::default()
            }
        }
    }

    pub fn shadow_volume(&self) -> ShadowVolume {
        ShadowVolume {
            half_extent: self.shadow_half_extent,
            near: self.shadow_near,
            far: self.shadow_far,
        }
    }

    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b] = self.clear_color;
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.msaa_samples, 4);
        assert_eq!(config.shadow_map_size, 2048);
        assert_eq!(config.shadow_volume(), ShadowVolume::default());
        assert_eq!(config.settings, RenderSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = RendererConfig::from_json(
            r#"{ "width": 800, "assets": { "model": "box.obj" }, "settings": { "brightness": 2.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.width, 800);
        assert_eq!(config.height, 720);
        assert_eq!(config.assets.model, PathBuf::from("box.obj"));
        assert_eq!(config.assets.pbr_model, AssetPaths::default().pbr_model);
        assert_eq!(config.settings.brightness, 2.0);
        assert!(config.settings.soft_shadows);
    }

    #[test]
    fn test_out_of_range_settings_are_clamped() {
        let config = RendererConfig::from_json(r#"{ "settings": { "brightness": 10.0 } }"#).unwrap();
        assert_eq!(config.settings.brightness, 3.0);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!("prism-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        let result = RendererConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        assert_eq!(RendererConfig::load_or_default(&path), RendererConfig::default());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = Path::new("does/not/exist/prism.json");
        assert!(matches!(RendererConfig::load(path), Err(ConfigError::Io { .. })));
        assert_eq!(RendererConfig::load_or_default(path), RendererConfig::default());
    }
}
