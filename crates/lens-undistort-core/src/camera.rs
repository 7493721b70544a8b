//! Pinhole camera matrix and the OpenCV 14-coefficient lens distortion model.
//!
//! Coefficient order follows OpenCV:
//! `k1 k2 p1 p2 k3 k4 k5 k6 s1 s2 s3 s4 tau_x tau_y`
//! (radial numerator, tangential, rational denominator, thin prism, tilt).
//! Shorter vectors (4, 5, 8 or 12 entries) are zero-padded.

use crate::UndistortError;
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Number of coefficients in the full distortion model.
pub const DISTORTION_COEFFS: usize = 14;

/// Fixed-point iterations used when inverting the distortion model.
pub const UNDISTORT_ITERS: usize = 5;

/// 3x3 intrinsic matrix `[[fx, s, cx], [0, fy, cy], [0, 0, 1]]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub k: Matrix3<f64>,
}

impl CameraMatrix {
    pub fn new(k: Matrix3<f64>) -> Self {
        Self { k }
    }

    pub fn from_intrinsics(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self::new(Matrix3::new(
            fx, 0.0, cx, //
            0.0, fy, cy, //
            0.0, 0.0, 1.0,
        ))
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    /// Build from nine values in row-major order.
    pub fn from_row_major(values: &[f64; 9]) -> Self {
        Self::new(Matrix3::from_row_slice(values))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.k[(0, 0)], self.k[(0, 1)], self.k[(0, 2)]],
            [self.k[(1, 0)], self.k[(1, 1)], self.k[(1, 2)]],
            [self.k[(2, 0)], self.k[(2, 1)], self.k[(2, 2)]],
        ]
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    pub fn inverse(&self) -> Result<Matrix3<f64>, UndistortError> {
        self.k
            .try_inverse()
            .ok_or(UndistortError::SingularCameraMatrix)
    }

    /// Project normalized coordinates to pixels, ignoring skew.
    #[inline]
    pub fn project(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(self.fx() * p.x + self.cx(), self.fy() * p.y + self.cy())
    }
}

/// Lens distortion coefficients, always stored in the 14-entry layout.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistortionCoeffs {
    pub coeffs: [f64; DISTORTION_COEFFS],
}

impl Default for DistortionCoeffs {
    fn default() -> Self {
        Self::zeros()
    }
}

impl DistortionCoeffs {
    pub fn zeros() -> Self {
        Self {
            coeffs: [0.0; DISTORTION_COEFFS],
        }
    }

    /// Accepts the vector lengths OpenCV accepts and zero-pads to 14.
    pub fn from_slice(values: &[f64]) -> Result<Self, UndistortError> {
        if !matches!(values.len(), 4 | 5 | 8 | 12 | 14) {
            return Err(UndistortError::InvalidCoefficientCount(values.len()));
        }
        let mut coeffs = [0.0; DISTORTION_COEFFS];
        coeffs[..values.len()].copy_from_slice(values);
        Ok(Self { coeffs })
    }

    /// Brown-Conrady `k1 k2 p1 p2 k3`.
    pub fn brown_conrady(k1: f64, k2: f64, p1: f64, p2: f64, k3: f64) -> Self {
        let mut coeffs = [0.0; DISTORTION_COEFFS];
        coeffs[..5].copy_from_slice(&[k1, k2, p1, p2, k3]);
        Self { coeffs }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0.0)
    }

    pub fn has_tilt(&self) -> bool {
        self.coeffs[12] != 0.0 || self.coeffs[13] != 0.0
    }

    /// Tilt projection for the sensor tilt angles `tau_x`, `tau_y`.
    pub fn tilt_matrix(&self) -> Matrix3<f64> {
        tilt_projection(self.coeffs[12], self.coeffs[13])
    }

    /// Apply radial, tangential and thin-prism distortion to normalized
    /// coordinates. Tilt is applied separately by [`Distorter`].
    #[inline]
    pub fn distort_planar(&self, x: f64, y: f64) -> (f64, f64) {
        let k = &self.coeffs;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let num = 1.0 + k[0] * r2 + k[1] * r4 + k[4] * r6;
        let den = 1.0 + k[5] * r2 + k[6] * r4 + k[7] * r6;
        let kr = num / den;
        let xy2 = 2.0 * x * y;
        let xd = x * kr + k[2] * xy2 + k[3] * (r2 + 2.0 * x * x) + k[8] * r2 + k[9] * r4;
        let yd = y * kr + k[2] * (r2 + 2.0 * y * y) + k[3] * xy2 + k[10] * r2 + k[11] * r4;
        (xd, yd)
    }

    /// Iteratively invert [`Self::distort_planar`] (tilt already removed).
    ///
    /// Falls back to the input when the rational term turns negative.
    pub fn undistort_planar(&self, xd: f64, yd: f64) -> (f64, f64) {
        let k = &self.coeffs;
        let (x0, y0) = (xd, yd);
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let icdist = (1.0 + ((k[7] * r2 + k[6]) * r2 + k[5]) * r2)
                / (1.0 + ((k[4] * r2 + k[1]) * r2 + k[0]) * r2);
            if icdist < 0.0 {
                return (x0, y0);
            }
            let dx = 2.0 * k[2] * x * y + k[3] * (r2 + 2.0 * x * x) + k[8] * r2 + k[9] * r2 * r2;
            let dy = k[2] * (r2 + 2.0 * y * y) + 2.0 * k[3] * x * y + k[10] * r2 + k[11] * r2 * r2;
            x = (x0 - dx) * icdist;
            y = (y0 - dy) * icdist;
        }
        (x, y)
    }
}

/// Sensor tilt projection `ProjZ * Ry * Rx`, identity for zero angles.
pub fn tilt_projection(tau_x: f64, tau_y: f64) -> Matrix3<f64> {
    let (s_x, c_x) = tau_x.sin_cos();
    let (s_y, c_y) = tau_y.sin_cos();
    let rot_x = Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, c_x, s_x, //
        0.0, -s_x, c_x,
    );
    let rot_y = Matrix3::new(
        c_y, 0.0, -s_y, //
        0.0, 1.0, 0.0, //
        s_y, 0.0, c_y,
    );
    let rot_xy = rot_y * rot_x;
    let proj_z = Matrix3::new(
        rot_xy[(2, 2)],
        0.0,
        -rot_xy[(0, 2)],
        0.0,
        rot_xy[(2, 2)],
        -rot_xy[(1, 2)],
        0.0,
        0.0,
        1.0,
    );
    proj_z * rot_xy
}

#[inline]
fn apply_projective(m: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let v = m * Vector3::new(x, y, 1.0);
    let inv = if v[2] != 0.0 { 1.0 / v[2] } else { 1.0 };
    (v[0] * inv, v[1] * inv)
}

/// Full forward model (planar distortion then tilt), with the tilt matrix and
/// its inverse precomputed once.
#[derive(Clone, Copy, Debug)]
pub struct Distorter {
    coeffs: DistortionCoeffs,
    tilt: Option<(Matrix3<f64>, Matrix3<f64>)>,
}

impl Distorter {
    pub fn new(coeffs: DistortionCoeffs) -> Self {
        let tilt = if coeffs.has_tilt() {
            let m = coeffs.tilt_matrix();
            let inv = m.try_inverse().unwrap_or_else(Matrix3::identity);
            Some((m, inv))
        } else {
            None
        };
        Self { coeffs, tilt }
    }

    pub fn coeffs(&self) -> &DistortionCoeffs {
        &self.coeffs
    }

    /// Ideal normalized coordinates to distorted normalized coordinates.
    #[inline]
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let (xd, yd) = self.coeffs.distort_planar(p.x, p.y);
        match &self.tilt {
            Some((m, _)) => {
                let (x, y) = apply_projective(m, xd, yd);
                Point2::new(x, y)
            }
            None => Point2::new(xd, yd),
        }
    }

    /// Distorted normalized coordinates back to ideal normalized coordinates.
    pub fn undistort(&self, p: Point2<f64>) -> Point2<f64> {
        let (xd, yd) = match &self.tilt {
            Some((_, inv)) => apply_projective(inv, p.x, p.y),
            None => (p.x, p.y),
        };
        let (x, y) = self.coeffs.undistort_planar(xd, yd);
        Point2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficient_vectors_are_zero_padded() {
        let d = DistortionCoeffs::from_slice(&[0.1, -0.2, 0.0, 0.0, 0.05]).expect("coeffs");
        assert_eq!(d.coeffs[0], 0.1);
        assert_eq!(d.coeffs[4], 0.05);
        assert!(d.coeffs[5..].iter().all(|&c| c == 0.0));

        let err = DistortionCoeffs::from_slice(&[0.0; 6]).unwrap_err();
        assert_eq!(err, UndistortError::InvalidCoefficientCount(6));
    }

    #[test]
    fn zero_tilt_is_identity() {
        let m = tilt_projection(0.0, 0.0);
        assert_relative_eq!(m, Matrix3::identity(), epsilon = 1e-15);
    }

    #[test]
    fn zero_coefficients_leave_points_unchanged() {
        let d = Distorter::new(DistortionCoeffs::zeros());
        let p = Point2::new(0.31, -0.27);
        assert_eq!(d.distort(p), p);
        assert_eq!(d.undistort(p), p);
    }

    #[test]
    fn undistort_inverts_brown_conrady() {
        let d = Distorter::new(DistortionCoeffs::brown_conrady(
            -0.12, 0.02, 0.001, -0.0008, 0.0,
        ));
        let p = Point2::new(0.2, -0.15);
        let back = d.undistort(d.distort(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
    }

    #[test]
    fn undistort_inverts_tilted_rational_model() {
        let mut coeffs = [0.0; DISTORTION_COEFFS];
        coeffs[0] = -0.05;
        coeffs[5] = 0.01;
        coeffs[8] = 0.001;
        coeffs[12] = 0.01;
        coeffs[13] = -0.02;
        let d = Distorter::new(DistortionCoeffs { coeffs });
        let p = Point2::new(0.1, 0.08);
        let back = d.undistort(d.distort(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
    }

    #[test]
    fn camera_matrix_accessors() {
        let k = CameraMatrix::from_array([[500.0, 0.0, 320.0], [0.0, 480.0, 240.0], [0.0, 0.0, 1.0]]);
        assert_eq!(k.fx(), 500.0);
        assert_eq!(k.fy(), 480.0);
        assert_eq!(k.cx(), 320.0);
        assert_eq!(k.cy(), 240.0);
        assert_eq!(CameraMatrix::from_intrinsics(500.0, 480.0, 320.0, 240.0), k);
        assert_eq!(k.to_array()[1][2], 240.0);
        assert_eq!(
            CameraMatrix::from_array([[0.0; 3]; 3]).inverse().unwrap_err(),
            UndistortError::SingularCameraMatrix
        );
    }
}
