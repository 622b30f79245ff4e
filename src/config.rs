//! Render configuration
//!
//! Stored as RON. Every field has a default, so a config file only needs
//! the values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::lighting::Lighting;
use crate::rasterizer::{Camera, ModelPlacement, RenderOptions, HEIGHT, WIDTH};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Largest light vector component or ambient a config may set
const MAX_LIGHT: i32 = 32767;

/// Everything needed to render a mesh besides the mesh itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    /// `0xAARRGGBB`
    pub background: u32,
    pub camera: Camera,
    pub placement: ModelPlacement,
    pub lighting: Lighting,
    pub options: RenderOptions,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            background: 0xFF00_0000,
            camera: Camera::default(),
            placement: ModelPlacement {
                z: 1200,
                ..ModelPlacement::default()
            },
            lighting: Lighting::default(),
            options: RenderOptions::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.camera.fov <= 0 || self.camera.fov >= 2048 {
            return Err(ConfigError::Invalid(format!(
                "fov {} is outside 1..2048",
                self.camera.fov
            )));
        }
        if self.lighting.light.iter().any(|c| !(-MAX_LIGHT..=MAX_LIGHT).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "light {:?} has a component outside -{max}..={max}",
                self.lighting.light,
                max = MAX_LIGHT
            )));
        }
        if !(-MAX_LIGHT..=MAX_LIGHT).contains(&self.lighting.ambient) {
            return Err(ConfigError::Invalid(format!(
                "ambient {} is outside -{max}..={max}",
                self.lighting.ambient,
                max = MAX_LIGHT
            )));
        }
        Ok(())
    }
}

/// Load a render config from a RON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RenderConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    load_config_from_str(&contents)
}

/// Save a render config to a RON file
pub fn save_config<P: AsRef<Path>>(config: &RenderConfig, path: P) -> Result<(), ConfigError> {
    let pretty = ron::ser::PrettyConfig::new()
        .depth_limit(4)
        .indentor("  ".to_string());

    let contents = ron::ser::to_string_pretty(config, pretty)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Parse a render config from a RON string
pub fn load_config_from_str(s: &str) -> Result<RenderConfig, ConfigError> {
    let config: RenderConfig = ron::from_str(s)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::PriorityMode;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = load_config_from_str("(width: 64, options: (use_zbuffer: true))").unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, HEIGHT);
        assert!(config.options.use_zbuffer);
        assert_eq!(config.options.near_plane_z, 50);
        assert_eq!(config.camera.fov, 512);
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut config = RenderConfig::default();
        config.options.priority_mode = PriorityMode::Flexible;
        config.lighting.contrast = 12;
        config.camera.yaw = 100;

        let path = std::env::temp_dir().join(format!("mesh-raster-config-{}.ron", std::process::id()));
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            load_config_from_str("(width: 0)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            load_config_from_str("(width: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_light_out_of_range() {
        assert!(matches!(
            load_config_from_str("(lighting: (light: (-50, 2000000000, -50)))"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            load_config_from_str("(lighting: (ambient: -40000))"),
            Err(ConfigError::Invalid(_))
        ));
        let config = load_config_from_str("(lighting: (light: (-32767, 32767, 0), ambient: 100))").unwrap();
        assert_eq!(config.lighting.light, [-32767, 32767, 0]);
    }
}
