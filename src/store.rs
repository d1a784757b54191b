//! Single-slot hand-off of a detection between the vision and motion runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::PickError;

/// Robot-frame target. Serialised as `[x, y, z, rotation]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation: f64,
}

impl Detection {
    pub fn new(x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self { x, y, z, rotation }
    }
}

impl From<[f64; 4]> for Detection {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Detection> for [f64; 4] {
    fn from(d: Detection) -> Self {
        [d.x, d.y, d.z, d.rotation]
    }
}

pub struct DetectionStore {
    path: PathBuf,
}

impl DetectionStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored record. Written to a sibling file and renamed into
    /// place so a reader never sees half a record.
    pub fn save(&self, detection: &Detection) -> Result<(), PickError> {
        let text = serde_json::to_string_pretty(detection)
            .map_err(|e| PickError::MalformedRecord(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| PickError::Processing(format!("{}: {}", self.path.display(), e)))?;
        log::info!("Saved {:?} to {}", detection, self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Detection, PickError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PickError::NotFound(self.path.clone()));
            }
            Err(e) => {
                return Err(PickError::MalformedRecord(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        serde_json::from_str(&text).map_err(|e| {
            PickError::MalformedRecord(format!("{}: {}", self.path.display(), e))
        })
    }
}
