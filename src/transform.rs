//! Pixel to robot-plane mapping through a fixed 3×3 homography.

use std::path::Path;

use nalgebra::{Matrix3, Vector3};

use crate::app::PickError;

#[derive(Clone, Debug, PartialEq)]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    const MIN_W: f64 = 1e-12;

    pub fn new(rows: [[f64; 3]; 3]) -> Result<Self, PickError> {
        let h = Matrix3::from_fn(|r, c| rows[r][c]);
        if h.iter().any(|v| !v.is_finite()) || h.try_inverse().is_none() {
            return Err(PickError::DegenerateTransform);
        }
        Ok(Self { h })
    }

    pub fn from_json(text: &str) -> Result<Self, PickError> {
        let rows: [[f64; 3]; 3] = serde_json::from_str(text)
            .map_err(|e| PickError::Config(format!("Transform matrix: {}", e)))?;
        Self::new(rows)
    }

    pub fn load(path: &Path) -> Result<Self, PickError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PickError::Config(format!("{}: {}", path.display(), e)))?;
        let homography = Self::from_json(&text)?;
        log::debug!("Loaded transform {:?}", homography.rows());
        Ok(homography)
    }

    pub fn rows(&self) -> [[f64; 3]; 3] {
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.h[(r, c)];
            }
        }
        rows
    }

    /// H * [x, y, 1]^T, normalised by the homogeneous coordinate
    pub fn project(&self, x: f64, y: f64) -> Result<(f64, f64), PickError> {
        let p = self.h * Vector3::new(x, y, 1.0);
        if p[2].abs() < Self::MIN_W {
            return Err(PickError::DegenerateTransform);
        }
        let (u, v) = (p[0] / p[2], p[1] / p[2]);
        if !u.is_finite() || !v.is_finite() {
            return Err(PickError::DegenerateTransform);
        }
        Ok((u, v))
    }

    /// Robot-frame (x, y) for a pixel centroid, to two decimal places
    pub fn to_robot(&self, pixel_x: i32, pixel_y: i32) -> Result<(f64, f64), PickError> {
        let (x, y) = self.project(pixel_x.into(), pixel_y.into())?;
        Ok((round2(x), round2(y)))
    }

    pub fn inverse(&self) -> Result<Self, PickError> {
        self.h
            .try_inverse()
            .map(|h| Self { h })
            .ok_or(PickError::DegenerateTransform)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
