//! Calibration records: camera matrix, distortion coefficients, optimized
//! camera matrix and valid-pixel ROI stored as named recording arrays.

use crate::convert::{array_from_image, image_from_array, integer_values, parameter_values};
use crate::{ArrayData, CorrectionError, NdArray, RecmathError, Recording};
use lens_undistort_core::{
    optimal_new_camera_matrix, AnyImage, CameraMatrix, DistortionCoeffs, Image, Roi,
    UndistortError,
};

pub const CAM_MTX: &str = "cam_mtx";
pub const CAM_DIST: &str = "cam_dist";
pub const CAM_NEWMTX: &str = "cam_newmtx";
pub const CAM_ROI: &str = "cam_roi";
pub const BRIGHTFIELD: &str = "brightfield";
pub const DARKFIELD: &str = "darkfield";

/// Everything the distortion-correction operator reads from a calibration
/// recording, plus the flat-field reference images that travel with it.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    pub camera_matrix: CameraMatrix,
    pub distortion: DistortionCoeffs,
    pub new_camera_matrix: CameraMatrix,
    pub roi: Roi,
    pub brightfield: Option<AnyImage>,
    pub darkfield: Option<AnyImage>,
}

impl Calibration {
    pub fn new(
        camera_matrix: CameraMatrix,
        distortion: DistortionCoeffs,
        new_camera_matrix: CameraMatrix,
    ) -> Self {
        Self {
            camera_matrix,
            distortion,
            new_camera_matrix,
            roi: Roi::whole_image(),
            brightfield: None,
            darkfield: None,
        }
    }

    /// Placeholder calibration for a `width x height` camera: unit focal
    /// length, centered principal point, no distortion, saturated/zero
    /// 3x3 flat fields.
    pub fn identity(width: usize, height: usize) -> Self {
        let cx = width.saturating_sub(1) as f64 / 2.0;
        let cy = height.saturating_sub(1) as f64 / 2.0;
        let k = CameraMatrix::from_intrinsics(1.0, 1.0, cx, cy);
        Self {
            brightfield: Some(AnyImage::U8(Image {
                width: 3,
                height: 3,
                data: vec![255; 9],
            })),
            darkfield: Some(AnyImage::U8(Image::new(3, 3))),
            ..Self::new(k, DistortionCoeffs::zeros(), k)
        }
    }

    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = roi;
        self
    }

    /// Replace the new camera matrix and ROI with the optimal ones for
    /// `alpha` (see [`optimal_new_camera_matrix`]).
    pub fn with_optimal_new_matrix(
        mut self,
        width: usize,
        height: usize,
        alpha: f64,
    ) -> Result<Self, UndistortError> {
        let opt =
            optimal_new_camera_matrix(&self.camera_matrix, &self.distortion, width, height, alpha)?;
        self.new_camera_matrix = opt.camera_matrix;
        self.roi = opt.roi;
        Ok(self)
    }

    /// Validated extraction of the `cam_*` arrays; flat fields are not read.
    /// This is all the distortion-correction operator needs.
    pub fn parameters_from_recording(rec: &Recording) -> Result<Self, CorrectionError> {
        Ok(Self::new(
            matrix3(rec, CAM_MTX)?,
            distortion(rec)?,
            matrix3(rec, CAM_NEWMTX)?,
        )
        .with_roi(roi(rec)?))
    }

    /// Validated extraction from a calibration recording. Flat fields that
    /// are not a supported 2-D image are skipped with a warning.
    pub fn from_recording(rec: &Recording) -> Result<Self, CorrectionError> {
        let flat_field = |name: &str| {
            let arr = rec.array_named(name)?;
            image_from_array(name, arr)
                .map_err(|err| log::warn!("{}: skipping flat field: {err}", rec.path()))
                .ok()
        };

        Ok(Self {
            brightfield: flat_field(BRIGHTFIELD),
            darkfield: flat_field(DARKFIELD),
            ..Self::parameters_from_recording(rec)?
        })
    }

    /// Write the calibration as a ready recording at `path`.
    pub fn to_recording(&self, path: impl Into<String>) -> Result<Recording, RecmathError> {
        let mut rec = Recording::new(path);
        if let Some(img) = &self.brightfield {
            rec.define_array(BRIGHTFIELD, array_from_image(img)?)?;
        }
        if let Some(img) = &self.darkfield {
            rec.define_array(DARKFIELD, array_from_image(img)?)?;
        }
        rec.define_array(CAM_MTX, matrix_array(&self.camera_matrix)?)?;
        rec.define_array(
            CAM_DIST,
            NdArray::new(
                vec![self.distortion.coeffs.len()],
                ArrayData::F32(self.distortion.coeffs.iter().map(|&c| c as f32).collect()),
            )?,
        )?;
        rec.define_array(CAM_NEWMTX, matrix_array(&self.new_camera_matrix)?)?;
        rec.define_array(
            CAM_ROI,
            NdArray::new(vec![4], ArrayData::I32(self.roi.to_array().to_vec()))?,
        )?;
        rec.publish(Default::default())
    }
}

fn matrix_array(m: &CameraMatrix) -> Result<NdArray, RecmathError> {
    let values = m
        .to_array()
        .iter()
        .flat_map(|row| row.iter().map(|&v| v as f32))
        .collect();
    NdArray::new(vec![3, 3], ArrayData::F32(values))
}

fn required<'a>(rec: &'a Recording, name: &str) -> Result<&'a NdArray, CorrectionError> {
    rec.array_named(name)
        .ok_or_else(|| CorrectionError::shape(name, "array is missing"))
}

/// A 2-D 3x3 parameter matrix, copied in row-major order.
fn matrix3(rec: &Recording, name: &str) -> Result<CameraMatrix, CorrectionError> {
    let arr = required(rec, name)?;
    if arr.ndim() != 2 {
        return Err(CorrectionError::shape(
            name,
            format!("expected a 2-D array, got {} dims", arr.ndim()),
        ));
    }
    let values = parameter_values(name, arr)?;
    let values: [f64; 9] = values.try_into().map_err(|_| {
        CorrectionError::shape(name, format!("expected 3x3, got {:?}", arr.dims()))
    })?;
    if arr.dims() != [3, 3] {
        return Err(CorrectionError::shape(
            name,
            format!("expected 3x3, got {:?}", arr.dims()),
        ));
    }
    Ok(CameraMatrix::from_row_major(&values))
}

fn distortion(rec: &Recording) -> Result<DistortionCoeffs, CorrectionError> {
    let arr = required(rec, CAM_DIST)?;
    let values = parameter_values(CAM_DIST, arr)?;
    DistortionCoeffs::from_slice(&values).map_err(|_| {
        CorrectionError::shape(
            CAM_DIST,
            format!(
                "expected 4, 5, 8, 12 or 14 coefficients, got {}",
                values.len()
            ),
        )
    })
}

fn roi(rec: &Recording) -> Result<Roi, CorrectionError> {
    let Some(arr) = rec.array_named(CAM_ROI) else {
        return Ok(Roi::whole_image());
    };
    let values = integer_values(CAM_ROI, arr)?;
    let [x, y, w, h] = values[..] else {
        return Err(CorrectionError::shape(
            CAM_ROI,
            format!("expected 4 values, got {}", values.len()),
        ));
    };
    let clamp = |v: i64| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    Ok(Roi::new(clamp(x), clamp(y), clamp(w), clamp(h)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementType;

    fn calibration() -> Calibration {
        let k = CameraMatrix::from_array([[800.0, 0.0, 319.5], [0.0, 790.0, 239.5], [0.0, 0.0, 1.0]]);
        let mut cal = Calibration::new(
            k,
            DistortionCoeffs::brown_conrady(-0.125, 0.0625, 0.0, 0.0, 0.0),
            k,
        );
        cal.roi = Roi::new(4, 3, 600, 400);
        cal
    }

    #[test]
    fn recording_round_trip_preserves_values() {
        let cal = calibration();
        let rec = cal.to_recording("/calib").expect("recording");
        assert!(rec.is_ready());
        assert_eq!(rec.array_named(CAM_MTX).map(|a| a.dims()), Some(&[3, 3][..]));
        assert_eq!(rec.array_named(CAM_DIST).map(|a| a.element_count()), Some(14));
        assert_eq!(
            rec.array_named(CAM_ROI).map(|a| a.element_type()),
            Some(ElementType::I32)
        );
        let back = Calibration::from_recording(&rec).expect("extract");
        assert_eq!(back, cal);
    }

    #[test]
    fn identity_calibration_has_flat_fields() {
        let cal = Calibration::identity(4, 4);
        assert_eq!(cal.camera_matrix.cx(), 1.5);
        assert_eq!(cal.new_camera_matrix, cal.camera_matrix);
        assert!(cal.roi.is_whole_image());
        let rec = cal.to_recording("/calib").expect("recording");
        assert_eq!(rec.num_arrays(), 6);
        assert_eq!(rec.array_index(BRIGHTFIELD), Some(0));
        assert_eq!(Calibration::from_recording(&rec).expect("extract"), cal);
    }

    #[test]
    fn missing_distortion_is_a_shape_mismatch() {
        let mut rec = Recording::new("/calib");
        let eye = NdArray::new(
            vec![3, 3],
            ArrayData::F32(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
        )
        .expect("matrix");
        rec.define_array(CAM_MTX, eye.clone()).expect("define");
        rec.define_array(CAM_NEWMTX, eye).expect("define");
        let err = Calibration::from_recording(&rec).unwrap_err();
        assert_eq!(
            err,
            CorrectionError::ShapeMismatch {
                array: CAM_DIST.into(),
                detail: "array is missing".into()
            }
        );
    }

    #[test]
    fn flat_matrix_is_a_shape_mismatch() {
        let mut rec = calibration().to_recording("/calib").expect("recording");
        // rebuild a pending copy with a 1-D camera matrix
        let mut pending = Recording::new("/calib2");
        for name in [CAM_DIST, CAM_NEWMTX] {
            let arr = rec.array_named(name).cloned().expect("array");
            pending.define_array(name, arr).expect("define");
        }
        pending
            .define_array(CAM_MTX, NdArray::zeros(ElementType::F32, vec![9]))
            .expect("define");
        assert!(matches!(
            Calibration::from_recording(&pending),
            Err(CorrectionError::ShapeMismatch { array, .. }) if array == CAM_MTX
        ));
        assert!(rec.define_array("late", NdArray::zeros(ElementType::U8, vec![1])).is_err());
    }

    #[test]
    fn float64_parameters_are_unsupported() {
        let mut rec = Recording::new("/calib");
        rec.define_array(CAM_MTX, NdArray::zeros(ElementType::F64, vec![3, 3]))
            .expect("define");
        assert!(matches!(
            Calibration::from_recording(&rec),
            Err(CorrectionError::UnsupportedType { element_type: ElementType::F64, .. })
        ));
    }

    #[test]
    fn five_coefficient_vectors_are_padded() {
        let mut rec = Recording::new("/calib");
        let eye = NdArray::new(
            vec![3, 3],
            ArrayData::U8(vec![1, 0, 0, 0, 1, 0, 0, 0, 1]),
        )
        .expect("matrix");
        rec.define_array(CAM_MTX, eye.clone()).expect("define");
        rec.define_array(CAM_NEWMTX, eye).expect("define");
        rec.define_array(
            CAM_DIST,
            NdArray::new(vec![1, 5], ArrayData::F32(vec![0.5, 0.0, 0.0, 0.0, 0.25]))
                .expect("dist"),
        )
        .expect("define");
        let cal = Calibration::from_recording(&rec).expect("extract");
        assert_eq!(cal.distortion.coeffs[0], 0.5);
        assert_eq!(cal.distortion.coeffs[4], 0.25);
        assert!(cal.roi.is_whole_image());

        rec.define_array(CAM_DIST, NdArray::zeros(ElementType::F32, vec![6]))
            .expect("define");
        assert!(matches!(
            Calibration::from_recording(&rec),
            Err(CorrectionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn unreadable_flat_fields_are_skipped() {
        let full = calibration().to_recording("/full").expect("recording");
        let mut rec = Recording::new("/calib");
        for name in [CAM_MTX, CAM_DIST, CAM_NEWMTX, CAM_ROI] {
            let arr = full.array_named(name).cloned().expect("array");
            rec.define_array(name, arr).expect("define");
        }
        rec.define_array(BRIGHTFIELD, NdArray::zeros(ElementType::F64, vec![3, 3]))
            .expect("define");
        rec.define_array(DARKFIELD, NdArray::zeros(ElementType::U8, vec![2, 3, 3]))
            .expect("define");

        let cal = Calibration::from_recording(&rec).expect("extract");
        assert_eq!(cal, calibration());
        assert_eq!(Calibration::parameters_from_recording(&rec).expect("params"), cal);
    }

    #[test]
    fn optimal_matrix_fills_roi() {
        let cal = calibration()
            .with_optimal_new_matrix(640, 480, 1.0)
            .expect("optimal");
        assert!(!cal.roi.is_whole_image());
        assert!(cal.new_camera_matrix.fx() < cal.camera_matrix.fx());
    }
}
