use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::animation::MotionMode;
use crate::camera_rig::CameraSelection;
use crate::error::ConfigError;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/orrery.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfigData,
    pub animation: AnimationConfigData,
    pub cameras: CameraRigConfigData,
    pub sphere: SphereConfigData,
    /// Body name -> image path. Bodies listed here are drawn textured.
    pub textures: BTreeMap<String, String>,
    pub render: RenderConfigData,
}

impl AppConfig {
    /// Load configuration from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file with pretty formatting
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Config {} unusable ({}), using defaults", path.display(), e);
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    tracing::debug!("Could not write default config: {}", e);
                }
                config
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfigData {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfigData {
    fn default() -> Self {
        Self {
            title: "Orrery".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfigData {
    pub mode: MotionMode,
    /// Multiplier applied in time-scaled mode
    pub time_scale: f32,
    /// Display rate the per-tick rates were authored for
    pub reference_hz: f32,
}

impl Default for AnimationConfigData {
    fn default() -> Self {
        Self {
            mode: MotionMode::PerTick,
            time_scale: 1.0,
            reference_hz: 60.0,
        }
    }
}

/// Fixed camera placement
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraPlacementData {
    #[serde(with = "vec3_serde")]
    pub position: Vec3,

    #[serde(with = "vec3_serde")]
    pub target: Vec3,

    #[serde(with = "vec3_serde")]
    pub up: Vec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRigConfigData {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub above: CameraPlacementData,
    pub front: CameraPlacementData,

    /// Offset from a tracked body to the follow camera
    #[serde(with = "vec3_serde")]
    pub follow_offset: Vec3,

    pub initial: CameraSelection,
}

impl Default for CameraRigConfigData {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 1.0,
            far: 2000.0,
            above: CameraPlacementData {
                position: Vec3::new(0.0, 700.0, 0.0),
                target: Vec3::ZERO,
                up: Vec3::Z,
            },
            front: CameraPlacementData {
                position: Vec3::new(0.0, 400.0, 1000.0),
                target: Vec3::ZERO,
                up: Vec3::Y,
            },
            follow_offset: Vec3::new(0.0, 30.0, 80.0),
            initial: CameraSelection::Front,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereConfigData {
    pub radius: f32,
    pub subdivisions_axis: u32,
    pub subdivisions_height: u32,
}

impl Default for SphereConfigData {
    fn default() -> Self {
        Self {
            radius: 10.0,
            subdivisions_axis: 50,
            subdivisions_height: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfigData {
    /// Directory holding body.vert.spv and body.frag.spv
    pub shader_dir: String,

    #[serde(with = "vec4_serde")]
    pub clear_color: Vec4,

    pub frames_in_flight: usize,
}

impl Default for RenderConfigData {
    fn default() -> Self {
        Self {
            shader_dir: "shaders".to_string(),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            frames_in_flight: 2,
        }
    }
}

/// Custom serialization for Vec3
mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec3Data {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S>(vec: &Vec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec3Data {
            x: vec.x,
            y: vec.y,
            z: vec.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = Vec3Data::deserialize(deserializer)?;
        Ok(Vec3::new(data.x, data.y, data.z))
    }
}

mod vec4_serde {
    use glam::Vec4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec4Data {
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    }

    pub fn serialize<S>(vec: &Vec4, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec4Data {
            x: vec.x,
            y: vec.y,
            z: vec.z,
            w: vec.w,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = Vec4Data::deserialize(deserializer)?;
        Ok(Vec4::new(data.x, data.y, data.z, data.w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cameras.fov, 60.0);
        assert_eq!(config.sphere.subdivisions_axis, 50);
        assert_eq!(config.animation.mode, MotionMode::PerTick);
        assert_eq!(config.cameras.initial, CameraSelection::Front);
        assert!(config.textures.is_empty());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("orrery.json");

        let mut config = AppConfig::default();
        config.animation.mode = MotionMode::TimeScaled;
        config.textures.insert("Earth".to_string(), "assets/earth.jpg".to_string());
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.animation.mode, MotionMode::TimeScaled);
        assert_eq!(loaded.textures.get("Earth").map(String::as_str), Some("assets/earth.jpg"));
        assert_eq!(loaded.cameras.above.up, Vec3::Z);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{ "cameras": { "initial": "Earth" }, "render": { "clear_color": { "x": 0.1, "y": 0.0, "z": 0.0, "w": 1.0 } } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cameras.initial, CameraSelection::Earth);
        assert_eq!(config.cameras.fov, 60.0);
        assert_eq!(config.render.clear_color.x, 0.1);
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn test_load_or_default_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orrery.json");

        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.window.title, "Orrery");
        assert!(path.exists());
    }
}
