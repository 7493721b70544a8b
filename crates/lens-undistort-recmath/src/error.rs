use crate::{ElementType, RecordingState};
use lens_undistort_core::UndistortError;

/// Failures of a single distortion-correction invocation. None of them leave
/// a published result behind.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CorrectionError {
    #[error("array `{array}` has unsupported element type {element_type}")]
    UnsupportedType {
        array: String,
        element_type: ElementType,
    },

    #[error("array `{array}` has the wrong shape: {detail}")]
    ShapeMismatch { array: String, detail: String },

    #[error(transparent)]
    Undistort(#[from] UndistortError),
}

impl CorrectionError {
    pub(crate) fn shape(array: &str, detail: impl Into<String>) -> Self {
        CorrectionError::ShapeMismatch {
            array: array.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unsupported(array: &str, element_type: ElementType) -> Self {
        CorrectionError::UnsupportedType {
            array: array.to_string(),
            element_type,
        }
    }
}

/// Errors from the recording model and the function registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RecmathError {
    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error("no math function registered under `{0}`")]
    UnknownFunction(String),

    #[error("math function `{0}` is already registered")]
    DuplicateFunction(String),

    #[error("recording `{path}` cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        path: String,
        from: RecordingState,
        to: RecordingState,
    },

    #[error("recording `{0}` is ready and can no longer be modified")]
    AlreadyReady(String),

    #[error("recording `{0}` is not ready")]
    NotReady(String),

    #[error("recording `{path}` has no array {index}")]
    UnknownArray { path: String, index: usize },

    #[error("array data length {got} does not match dims (expected {expected})")]
    ArrayLength { expected: usize, got: usize },

    #[error("lock on recording `{0}` is poisoned")]
    LockPoisoned(String),
}
