/// Errors produced by the camera model and remapping primitives.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UndistortError {
    #[error("invalid image buffer length (expected {expected} samples, got {got})")]
    BufferLength { expected: usize, got: usize },

    #[error("camera matrix is singular and cannot be inverted")]
    SingularCameraMatrix,

    #[error("unsupported number of distortion coefficients: {0} (expected 4, 5, 8, 12 or 14)")]
    InvalidCoefficientCount(usize),

    #[error("image size {width}x{height} is too small (need at least 2x2)")]
    InvalidImageSize { width: usize, height: usize },
}
