use anyhow::Context;
use canopy_overlay::OverlayConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "canopy.config.json";

/// Canopy configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Structure `inspect` reports on when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_struct: Option<String>,

    /// Overlay settings, same shape the browser binding takes at `attach`
    #[serde(default)]
    pub overlay: OverlayConfig,
}

impl Config {
    /// Load config from a directory, falling back to defaults when the
    /// directory has no config file
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Cannot read config {}", path.display()))?;
        let config = serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "defaultStruct": "page-home",
            "overlay": {
                "classPrefix": "cx-",
                "dragThreshold": 8,
                "channel": { "hostSource": "studio" }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_struct.as_deref(), Some("page-home"));
        assert_eq!(config.overlay.class_prefix, "cx-");
        assert_eq!(config.overlay.drag_threshold, 8.0);
        assert_eq!(config.overlay.channel.host_source, "studio");
        assert_eq!(
            config.overlay.channel.overlay_source,
            OverlayConfig::default().channel.overlay_source
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "overlay": { "rollbackCueMs": 500 } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.overlay.rollback_cue_ms, 500);
        assert_eq!(config.default_struct, None);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ nope").unwrap();
        assert!(Config::load(dir.path().to_str().unwrap()).is_err());
    }
}
