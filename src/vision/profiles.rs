use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::PickError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorProfile {
    pub name: String,
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorProfile {
    pub fn new(name: &str, lower: [u8; 3], upper: [u8; 3]) -> Result<Self, PickError> {
        if lower.iter().zip(upper.iter()).any(|(lo, hi)| lo > hi) {
            return Err(PickError::Config(format!(
                "Colour '{}' has lower bound {:?} above upper bound {:?}",
                name, lower, upper
            )));
        }
        Ok(Self {
            name: name.to_string(),
            lower,
            upper,
        })
    }
}

/// Colour profiles in the order they appear in the source file. Scanning
/// order decides which colour wins, so this is a list and not a map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileStore {
    profiles: Vec<ColorProfile>,
}

impl ProfileStore {
    pub fn new(profiles: Vec<ColorProfile>) -> Self {
        Self { profiles }
    }

    pub fn from_json(text: &str) -> Result<Self, PickError> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)
            .map_err(|e| PickError::Config(format!("Colour profiles: {}", e)))?;
        let mut profiles = Vec::with_capacity(map.len());
        for (name, value) in map {
            let range: HsvRange = serde_json::from_value(value)
                .map_err(|e| PickError::Config(format!("Colour '{}': {}", name, e)))?;
            profiles.push(ColorProfile::new(&name, range.lower, range.upper)?);
        }
        Ok(Self { profiles })
    }

    /// A missing file is an empty store, matching a fresh install with nothing taught
    pub fn load(path: &Path) -> Result<Self, PickError> {
        if !path.exists() {
            log::warn!("No colour profiles at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| PickError::Config(format!("{}: {}", path.display(), e)))?;
        let store = Self::from_json(&text)?;
        log::info!(
            "Loaded {} colour profiles: {:?}",
            store.len(),
            store.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        Ok(store)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
