//! High-level facade crate for the `lens-undistort-*` workspace.
//!
//! This crate provides:
//! - re-exports of the camera/remap primitives and of the recording-level
//!   distortion-correction operator
//! - a JSON calibration config ([`io::CalibrationConfig`])
//! - (feature-gated) conversions to and from `image` crate buffers and the
//!   `lens-undistort` command line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use lens_undistort::imageio::{load_image, save_image};
//! use lens_undistort::io::CalibrationConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = load_image("frame.png")?;
//! let calib = CalibrationConfig::load_json("calib.json")?
//!     .to_calibration(img.width(), img.height())?;
//! let out = lens_undistort::undistort_image(&img, &calib, true)?;
//! save_image("frame_undistorted.png", &out)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `lens_undistort::core`: camera matrix, distortion model, remap, optimal matrix.
//! - `lens_undistort::recmath`: recordings, calibration records, the operator and registry.
//! - `lens_undistort::io`: calibration JSON and reports.
//! - `lens_undistort::imageio` (feature `image`): `image` crate conversions and file I/O.

pub use lens_undistort_core as core;
pub use lens_undistort_recmath as recmath;

pub use lens_undistort_core::{AnyImage, CameraMatrix, DistortionCoeffs, Roi};
pub use lens_undistort_recmath::{correct, default_registry, Calibration, SharedRecording};

pub mod io;

#[cfg(feature = "image")]
pub mod imageio;

use lens_undistort_recmath::{
    array_from_image, image_from_array, MathInputs, Metadata, RecmathError, Recording,
    DEFAULT_IMAGE_ARRAY, UNDISTORT,
};

/// Run the distortion-correction operator on a single in-memory image.
///
/// The image and calibration are wrapped in published recordings, corrected
/// with the generic variant and the result array is returned as an image.
pub fn undistort_image(
    img: &AnyImage,
    calibration: &Calibration,
    crop: bool,
) -> Result<AnyImage, RecmathError> {
    undistort_image_with(UNDISTORT, img, calibration, crop)
}

/// Same as [`undistort_image`], running the registered math function `name`.
pub fn undistort_image_with(
    name: &str,
    img: &AnyImage,
    calibration: &Calibration,
    crop: bool,
) -> Result<AnyImage, RecmathError> {
    let mut source = Recording::new("/image");
    source.define_array(DEFAULT_IMAGE_ARRAY, array_from_image(img)?)?;
    let source = SharedRecording::new(source.publish(Metadata::new())?);
    let calib = SharedRecording::new(calibration.to_recording("/calibration")?);

    let inputs = MathInputs::new(source, calib, crop).with_result_path("/image/undistorted");
    let result = default_registry().execute(name, &inputs)?;
    let rec = result.read_ready()?;
    let array = rec.array(0).ok_or_else(|| RecmathError::UnknownArray {
        path: rec.path().to_string(),
        index: 0,
    })?;
    Ok(image_from_array(DEFAULT_IMAGE_ARRAY, array)?)
}
