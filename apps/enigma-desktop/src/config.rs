use enigma_assets::AssetKind;
use enigma_common::{Color, QualityTier};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// An asset loaded during startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub kind: AssetKind,
    pub name: String,
    pub locator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub enabled: bool,
    pub cache_dir: PathBuf,
    pub cache_name: String,
    /// Locators stored on install, relative to the asset root.
    pub precache: Vec<String>,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from("./.enigma-cache"),
            cache_name: enigma_offline::DEFAULT_CACHE_NAME.to_string(),
            precache: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// `0xRRGGBB`.
    pub background: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: 0x0a0a14,
        }
    }
}

/// Application configuration, read from YAML. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identity of the render surface; used as the window title.
    pub canvas_id: String,
    pub width: u32,
    pub height: u32,
    pub quality: QualityTier,
    /// Replaced by the window scale factor once a window exists.
    pub device_pixel_ratio: f32,
    pub gravity: [f32; 3],
    pub asset_root: PathBuf,
    pub assets: Vec<AssetSpec>,
    pub offline: OfflineConfig,
    pub scene: SceneConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            canvas_id: "c".into(),
            width: 1280,
            height: 720,
            quality: QualityTier::Medium,
            device_pixel_ratio: 1.0,
            gravity: [0.0, -9.81, 0.0],
            asset_root: PathBuf::from("./assets"),
            assets: Vec::new(),
            offline: OfflineConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as null, not as an empty mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    pub fn background(&self) -> Color {
        Color::from_hex(self.scene.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("enigma.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.canvas_id, "c");
        assert_eq!(config.quality, QualityTier::Medium);
        assert_eq!(config.gravity(), Vec3::new(0.0, -9.81, 0.0));
        assert_eq!(config.background().to_hex(), 0x0a0a14);
        assert_eq!(config.offline.cache_name, "enigma-webgl-cache-v1");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = AppConfig::from_yaml(
            "quality: ultra\nwidth: 800\noffline:\n  enabled: false\nassets:\n  - kind: model\n    name: ship\n    locator: models/ship.glb\n",
        )
        .unwrap();
        assert_eq!(config.quality, QualityTier::Ultra);
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 720);
        assert!(!config.offline.enabled);
        assert_eq!(config.offline.cache_dir, PathBuf::from("./.enigma-cache"));
        assert_eq!(config.assets.len(), 1);
        assert_eq!(config.assets[0].kind, AssetKind::Model);
        assert_eq!(config.assets[0].locator, "models/ship.glb");
    }

    #[test]
    fn empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enigma.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enigma.yaml");
        std::fs::write(&path, "quality: [not, a, tier\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn unknown_quality_is_an_error() {
        assert!(AppConfig::from_yaml("quality: cinematic\n").is_err());
    }
}
