use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::camera::RetryPolicy;
use crate::pipeline::Polarity;
use crate::presets::Preset;
use crate::types::PipelineParameters;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: Defaults,
    pub ui: UiConfig,
    pub capture: CaptureConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Device index or stream URL.
    pub source: String,
    pub preset: Preset,
    /// Overrides the preset's background polarity.
    pub polarity: Option<Polarity>,
    /// Overrides the preset's downscale factor.
    pub scale: Option<f32>,
    /// Overrides the preset's starting parameters.
    pub parameters: Option<PipelineParameters>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub highlight_color_hex: String,
    pub hud_color_hex: String,
    pub font_family: String,
    pub font_size_pt: u32,
    pub menu_scale: usize,
    pub show_intermediates: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub retry_delay_ms: u64,
    pub max_consecutive_failures: u32,
    pub key_poll_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub save_dir: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            preset: Preset::Live,
            polarity: None,
            scale: None,
            parameters: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            highlight_color_hex: "#FF0000".to_string(),
            hud_color_hex: "#FFFFFF".to_string(),
            font_family: "DejaVuSans".to_string(),
            font_size_pt: 18,
            menu_scale: 2,
            show_intermediates: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 10,
            max_consecutive_failures: 100,
            key_poll_ms: 1,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("."),
        }
    }
}

impl CaptureConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_consecutive_failures: self.max_consecutive_failures.max(1),
        }
    }
}

enum FileState {
    Missing,
    Parsed(AppConfig),
    Unparsable,
}

impl AppConfig {
    pub const PATH: &'static str = "config.json";

    /// Loads `config.json` from the working directory.
    pub fn load() -> Result<Self> {
        Self::load_and_refresh(Path::new(Self::PATH))
    }

    /// Like [`AppConfig::load_from`], then writes the result back so newly
    /// added fields show up in the file. A file that does not parse is left
    /// untouched, and a failed write is only logged.
    pub fn load_and_refresh(path: &Path) -> Result<Self> {
        let config = match Self::read_state(path)? {
            FileState::Unparsable => return Ok(Self::default()),
            FileState::Missing => Self::default(),
            FileState::Parsed(c) => c,
        };
        if let Err(e) = config.save_to(path) {
            warn!(path = %path.display(), error = %e, "could not write configuration back");
        }
        Ok(config)
    }

    /// Missing files give defaults; unparsable files are reported and
    /// replaced by defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(match Self::read_state(path)? {
            FileState::Parsed(c) => c,
            FileState::Missing | FileState::Unparsable => Self::default(),
        })
    }

    fn read_state(path: &Path) -> Result<FileState> {
        if !path.exists() {
            info!(path = %path.display(), "configuration file not found, using defaults");
            return Ok(FileState::Missing);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(c) => {
                info!(path = %path.display(), "loaded configuration");
                Ok(FileState::Parsed(c))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not parse configuration, using defaults");
                Ok(FileState::Unparsable)
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Preset parameters with the file's overrides applied.
    pub fn initial_parameters(&self, preset: Preset) -> PipelineParameters {
        self.defaults
            .parameters
            .unwrap_or_else(|| preset.parameters())
            .normalized()
    }
}

/// Parses `#RRGGBB`, falling back to red.
pub fn parse_hex(hex: &str) -> (u8, u8, u8) {
    if hex.len() == 7 && hex.starts_with('#') {
        let r = u8::from_str_radix(&hex[1..3], 16).unwrap_or(255);
        let g = u8::from_str_radix(&hex[3..5], 16).unwrap_or(0);
        let b = u8::from_str_radix(&hex[5..7], 16).unwrap_or(0);
        (r, g, b)
    } else {
        (255, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#FF0000"), (255, 0, 0));
        assert_eq!(parse_hex("#00FF00"), (0, 255, 0));
        assert_eq!(parse_hex("#0000FF"), (0, 0, 255));
        assert_eq!(parse_hex("#FFFFFF"), (255, 255, 255));
        assert_eq!(parse_hex("invalid"), (255, 0, 0));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "defaults": { "preset": "vessel" }, "capture": { "max_consecutive_failures": 5 } }"#).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.defaults.preset, Preset::Vessel);
        assert_eq!(config.defaults.source, "0");
        assert_eq!(config.capture.max_consecutive_failures, 5);
        assert_eq!(config.capture.retry_delay_ms, 10);
        assert!(config.ui.show_intermediates);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.defaults.preset, Preset::Live);
    }

    #[test]
    fn refresh_leaves_unparsable_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ \"defaults\": { \"preset\": ").unwrap();
        let config = AppConfig::load_and_refresh(&path).unwrap();
        assert_eq!(config.defaults.preset, Preset::Live);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ \"defaults\": { \"preset\": ");
    }

    #[test]
    fn refresh_fills_in_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "defaults": { "preset": "still" } }"#).unwrap();
        AppConfig::load_and_refresh(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"max_consecutive_failures\": 100"));
        assert_eq!(AppConfig::load_from(&path).unwrap().defaults.preset, Preset::Still);
    }

    #[test]
    fn refresh_survives_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("config.json");
        let config = AppConfig::load_and_refresh(&path).unwrap();
        assert_eq!(config.defaults.source, "0");
        assert!(!path.exists());
    }

    #[test]
    fn parameter_overrides_are_normalized() {
        let mut config = AppConfig::default();
        config.defaults.parameters = Some(PipelineParameters {
            canny_low: 50,
            canny_high: 20,
            thickness: 12,
            tophat_size: 15,
        });
        let p = config.initial_parameters(Preset::Live);
        assert_eq!((p.canny_low, p.canny_high, p.thickness), (50, 60, 7));
    }
}
