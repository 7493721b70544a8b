//! JSON calibration config and reports.

use crate::core::{CameraMatrix, DistortionCoeffs, OptimalCameraMatrix, Roi, UndistortError};
use crate::recmath::Calibration;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Undistort(#[from] UndistortError),
}

/// Camera calibration as stored on disk.
///
/// `new_camera_matrix` and `roi` are optional: when the new matrix is absent
/// and `alpha` is set, both are derived with
/// [`optimal_new_camera_matrix`](crate::core::optimal_new_camera_matrix) for
/// the image size; otherwise the camera matrix is reused and the ROI covers
/// the whole image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    pub distortion: Vec<f64>,
    #[serde(default)]
    pub new_camera_matrix: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub roi: Option<[i32; 4]>,
    #[serde(default)]
    pub alpha: Option<f64>,
}

impl CalibrationConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn distortion_coeffs(&self) -> Result<DistortionCoeffs, ConfigError> {
        if self.distortion.is_empty() {
            return Ok(DistortionCoeffs::zeros());
        }
        Ok(DistortionCoeffs::from_slice(&self.distortion)?)
    }

    /// Resolve the full calibration for a `width x height` image.
    pub fn to_calibration(&self, width: usize, height: usize) -> Result<Calibration, ConfigError> {
        let k = CameraMatrix::from_array(self.camera_matrix);
        let dist = self.distortion_coeffs()?;

        let mut calibration = match (self.new_camera_matrix, self.alpha) {
            (Some(new_k), _) => Calibration::new(k, dist, CameraMatrix::from_array(new_k)),
            (None, Some(alpha)) => {
                log::debug!("deriving new camera matrix for {width}x{height}, alpha={alpha}");
                Calibration::new(k, dist, k).with_optimal_new_matrix(width, height, alpha)?
            }
            (None, None) => Calibration::new(k, dist, k),
        };
        if let Some(roi) = self.roi {
            calibration.roi = Roi::from_array(roi);
        }
        Ok(calibration)
    }

    pub fn from_calibration(calibration: &Calibration) -> Self {
        Self {
            camera_matrix: calibration.camera_matrix.to_array(),
            distortion: calibration.distortion.as_slice().to_vec(),
            new_camera_matrix: Some(calibration.new_camera_matrix.to_array()),
            roi: (!calibration.roi.is_whole_image()).then(|| calibration.roi.to_array()),
            alpha: None,
        }
    }
}

/// Output of the `optimal-matrix` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalMatrixReport {
    pub width: usize,
    pub height: usize,
    pub alpha: f64,
    pub new_camera_matrix: [[f64; 3]; 3],
    pub roi: [i32; 4],
}

impl OptimalMatrixReport {
    pub fn new(width: usize, height: usize, alpha: f64, opt: &OptimalCameraMatrix) -> Self {
        Self {
            width,
            height,
            alpha,
            new_camera_matrix: opt.camera_matrix.to_array(),
            roi: opt.roi.to_array(),
        }
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
