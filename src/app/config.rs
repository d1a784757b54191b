use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{app::PickError, motion::MotionSettings};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerialPath {
    pub port: String,
    pub baud: u32,
}

impl SerialPath {
    pub fn new(port: String, baud: u32) -> Self {
        Self { port, baud }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LinkConfig {
    Dobot(SerialPath),
    DryRun,
}

impl LinkConfig {
    pub fn info(&self) -> String {
        match self {
            Self::Dobot(path) => format!("Dobot ({} @ {})", path.port, path.baud),
            Self::DryRun => "Dry Run".to_string(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Dobot(_) => "Serial connection to a Dobot Magician arm".to_string(),
            Self::DryRun => "Robot commands are logged but not sent".to_string(),
        }
    }
}

#[cfg(target_os = "windows")]
fn default_link() -> LinkConfig {
    LinkConfig::Dobot(SerialPath::new("COM9".to_string(), 115200))
}

#[cfg(not(target_os = "windows"))]
fn default_link() -> LinkConfig {
    LinkConfig::Dobot(SerialPath::new("/dev/ttyUSB0".to_string(), 115200))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectSettings {
    pub camera: i32,
    pub frame_width: i32,
    pub frame_height: i32,
    /// Contours must be strictly larger than this (px^2)
    pub min_area: f64,
    /// Pause between accepting a candidate and committing the detection
    pub delay_ms: u64,
    pub z: f64,
    pub rotation: f64,
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self {
            camera: 0,
            frame_width: 640,
            frame_height: 480,
            min_area: 500.0,
            delay_ms: 2000,
            z: -26.0,
            rotation: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profiles: PathBuf,
    pub matrix: PathBuf,
    pub record: PathBuf,
    pub bind: String,
    pub link: LinkConfig,
    pub detect: DetectSettings,
    pub motion: MotionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profiles: PathBuf::from("taught_colors.json"),
            matrix: PathBuf::from("cam_to_dobot_matrix.json"),
            record: PathBuf::from("detected_positions.json"),
            bind: "0.0.0.0:3001".to_string(),
            link: default_link(),
            detect: DetectSettings::default(),
            motion: MotionSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults, overridden by any fields present in the given JSON file
    pub fn load(path: Option<&Path>) -> Result<Self, PickError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| PickError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| PickError::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.detect.min_area, 500.0);
        assert_eq!(settings.detect.z, -26.0);
        assert_eq!(settings.motion.settle_ms, 5000);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "link": "DryRun", "detect": { "delay_ms": 0, "camera": 2 } }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.link, LinkConfig::DryRun);
        assert_eq!(settings.detect.delay_ms, 0);
        assert_eq!(settings.detect.camera, 2);
        assert_eq!(settings.detect.frame_width, 640);
        assert_eq!(settings.record, PathBuf::from("detected_positions.json"));
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(PickError::Config(_))
        ));
    }
}
