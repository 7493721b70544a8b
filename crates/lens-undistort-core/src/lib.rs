//! Camera model, lens distortion and remapping primitives.
//!
//! This crate is purely geometric: typed single-channel images, the pinhole
//! camera matrix, the OpenCV 14-coefficient distortion model, undistortion
//! maps with bilinear resampling, and the optimal new camera matrix. It knows
//! nothing about recordings or file formats.
//!
//! ```
//! use lens_undistort_core::{undistort, CameraMatrix, DistortionCoeffs, Image};
//!
//! let src = Image::from_vec(4, 4, (0u8..16).collect()).unwrap();
//! let k = CameraMatrix::from_intrinsics(1.0, 1.0, 2.0, 2.0);
//! let out = undistort(&src.view(), &k, &DistortionCoeffs::zeros(), &k).unwrap();
//! assert_eq!(out, src);
//! ```

mod camera;
mod error;
mod image;
mod logger;
mod optimal;
mod undistort;

pub use camera::{
    tilt_projection, CameraMatrix, Distorter, DistortionCoeffs, DISTORTION_COEFFS,
    UNDISTORT_ITERS,
};
pub use error::UndistortError;
pub use image::{sample_bilinear, AnyImage, Image, ImageView, Sample, SampleKind};
pub use optimal::{optimal_new_camera_matrix, undistort_points, OptimalCameraMatrix, Roi};
pub use undistort::{
    crop_any_to_roi, crop_to_roi, init_undistort_map, remap, undistort, undistort_any,
    UndistortMap,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_logging, init_with_level, LogOptions};
