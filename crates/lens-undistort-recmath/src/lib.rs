//! Recording model and the lens distortion-correction math function.
//!
//! A [`Recording`] is a named set of n-d arrays with element-type tags,
//! metadata and a one-way lifecycle (`Pending -> MetadataDone -> Ready`).
//! Calibration recordings carry `cam_mtx` (3x3), `cam_dist` (up to 14
//! coefficients), `cam_newmtx` (3x3) and optionally `cam_roi`.
//!
//! ## Quickstart
//!
//! ```
//! use lens_undistort_recmath::{
//!     correct, ArrayData, Calibration, NdArray, Recording, SharedRecording,
//! };
//! use lens_undistort_core::{CameraMatrix, DistortionCoeffs};
//!
//! # fn main() -> Result<(), lens_undistort_recmath::RecmathError> {
//! let mut image = Recording::new("/camera");
//! image.define_array("image", NdArray::new(vec![4, 4], ArrayData::U8((0..16).collect()))?)?;
//! let image = SharedRecording::new(image.publish(Default::default())?);
//!
//! let k = CameraMatrix::from_intrinsics(1.0, 1.0, 2.0, 2.0);
//! let calib = Calibration::new(k, DistortionCoeffs::zeros(), k).to_recording("/calib")?;
//!
//! let result = correct(&image, &SharedRecording::new(calib), false)?;
//! assert!(result.read()?.is_ready());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - [`Recording`], [`NdArray`], [`SharedRecording`]: arrays, metadata, lifecycle.
//! - [`Calibration`]: calibration record extraction and construction.
//! - [`UndistortFunction`] / [`correct`]: the operator.
//! - [`FunctionRegistry`] / [`default_registry`]: lookup by stable name.

mod calibration;
mod convert;
mod error;
mod metadata;
mod operator;
mod recording;
mod registry;

pub use calibration::{
    Calibration, BRIGHTFIELD, CAM_DIST, CAM_MTX, CAM_NEWMTX, CAM_ROI, DARKFIELD,
};
pub use convert::{array_from_image, image_from_array, integer_values, parameter_values};
pub use error::{CorrectionError, RecmathError};
pub use metadata::{MetaValue, Metadata};
pub use operator::{
    correct, UndistortFunction, VariantPolicy, CROP_METADATA_KEY, DEFAULT_IMAGE_ARRAY,
    FIXED_METADATA_KEY, FIXED_METADATA_VALUE, UNDISTORT, UNDISTORT_U8,
};
pub use recording::{ArrayData, ElementType, NdArray, Recording, RecordingState, SharedRecording};
pub use registry::{default_registry, FunctionRegistry, MathFunction, MathInputs};
