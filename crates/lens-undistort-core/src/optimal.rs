//! Optimal new camera matrix and the valid-pixel region of an undistorted image.
//!
//! `alpha = 0` zooms in so every output pixel maps inside the source image;
//! `alpha = 1` zooms out so every source pixel is retained. Values in between
//! interpolate the two projections linearly.

use crate::{CameraMatrix, Distorter, DistortionCoeffs, UndistortError};
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Samples per side of the grid used to trace the undistorted image border.
const GRID_SAMPLES: usize = 9;

/// Slack when snapping rectangle edges to whole pixels.
const EDGE_EPS: f64 = 1e-6;

/// Axis-aligned pixel rectangle `[x, y, width, height]`.
///
/// A negative width or height means "the whole image".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Roi {
    fn default() -> Self {
        Self::whole_image()
    }
}

impl Roi {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn whole_image() -> Self {
        Self::new(0, 0, -1, -1)
    }

    pub fn from_array(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn is_whole_image(&self) -> bool {
        self.width < 0 || self.height < 0
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        if self.is_whole_image() {
            return true;
        }
        let (x, y) = (x as i64, y as i64);
        let (x0, y0) = (self.x as i64, self.y as i64);
        x >= x0 && y >= y0 && x < x0 + self.width as i64 && y < y0 + self.height as i64
    }
}

/// Result of [`optimal_new_camera_matrix`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimalCameraMatrix {
    pub camera_matrix: CameraMatrix,
    /// Pixels of the undistorted image that are backed by source pixels.
    pub roi: Roi,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct RectF {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Map distorted pixel coordinates to ideal coordinates.
///
/// With `new_camera_matrix` the result is in that camera's pixels, otherwise
/// in normalized coordinates.
pub fn undistort_points(
    points: &[Point2<f64>],
    camera_matrix: &CameraMatrix,
    dist: &DistortionCoeffs,
    new_camera_matrix: Option<&CameraMatrix>,
) -> Vec<Point2<f64>> {
    let distorter = Distorter::new(*dist);
    let (fx, fy, cx, cy) = (
        camera_matrix.fx(),
        camera_matrix.fy(),
        camera_matrix.cx(),
        camera_matrix.cy(),
    );
    let proj: Option<Matrix3<f64>> = new_camera_matrix.map(|m| m.k);

    points
        .iter()
        .map(|p| {
            let n = Point2::new((p.x - cx) / fx, (p.y - cy) / fy);
            let ideal = distorter.undistort(n);
            match &proj {
                Some(m) => {
                    let v = m * Vector3::new(ideal.x, ideal.y, 1.0);
                    let w = if v[2] != 0.0 { 1.0 / v[2] } else { 1.0 };
                    Point2::new(v[0] * w, v[1] * w)
                }
                None => ideal,
            }
        })
        .collect()
}

/// Inscribed and circumscribed rectangles of the undistorted image border.
fn border_rectangles(
    camera_matrix: &CameraMatrix,
    dist: &DistortionCoeffs,
    new_camera_matrix: Option<&CameraMatrix>,
    width: usize,
    height: usize,
) -> (RectF, RectF) {
    let n = GRID_SAMPLES;
    let sx = (width - 1) as f64 / (n - 1) as f64;
    let sy = (height - 1) as f64 / (n - 1) as f64;
    let grid: Vec<Point2<f64>> = (0..n)
        .flat_map(|y| (0..n).map(move |x| Point2::new(x as f64 * sx, y as f64 * sy)))
        .collect();
    let pts = undistort_points(&grid, camera_matrix, dist, new_camera_matrix);

    let (mut ix0, mut ix1, mut iy0, mut iy1) = (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);

    for y in 0..n {
        for x in 0..n {
            let p = pts[y * n + x];
            ox0 = ox0.min(p.x);
            ox1 = ox1.max(p.x);
            oy0 = oy0.min(p.y);
            oy1 = oy1.max(p.y);

            if x == 0 {
                ix0 = ix0.max(p.x);
            }
            if x == n - 1 {
                ix1 = ix1.min(p.x);
            }
            if y == 0 {
                iy0 = iy0.max(p.y);
            }
            if y == n - 1 {
                iy1 = iy1.min(p.y);
            }
        }
    }

    let inner = RectF {
        x: ix0,
        y: iy0,
        width: ix1 - ix0,
        height: iy1 - iy0,
    };
    let outer = RectF {
        x: ox0,
        y: oy0,
        width: ox1 - ox0,
        height: oy1 - oy0,
    };
    (inner, outer)
}

/// Snap a rectangle of pixel centers inward to whole pixels and clip it to
/// the image.
fn snap_roi(inner: &RectF, width: usize, height: usize) -> Roi {
    let x0 = (inner.x - EDGE_EPS).ceil().max(0.0);
    let y0 = (inner.y - EDGE_EPS).ceil().max(0.0);
    let x1 = (inner.x + inner.width + EDGE_EPS)
        .floor()
        .min(width as f64 - 1.0);
    let y1 = (inner.y + inner.height + EDGE_EPS)
        .floor()
        .min(height as f64 - 1.0);
    if !(x1 >= x0 && y1 >= y0) {
        return Roi::new(0, 0, 0, 0);
    }
    Roi::new(
        x0 as i32,
        y0 as i32,
        (x1 - x0) as i32 + 1,
        (y1 - y0) as i32 + 1,
    )
}

/// Compute a new camera matrix for undistorting a `width x height` image,
/// trading off invalid border pixels (`alpha` towards 1) against lost source
/// pixels (`alpha` towards 0). `alpha` is clamped to `[0, 1]`.
pub fn optimal_new_camera_matrix(
    camera_matrix: &CameraMatrix,
    dist: &DistortionCoeffs,
    width: usize,
    height: usize,
    alpha: f64,
) -> Result<OptimalCameraMatrix, UndistortError> {
    if width < 2 || height < 2 {
        return Err(UndistortError::InvalidImageSize { width, height });
    }
    camera_matrix.inverse()?;
    let alpha = alpha.clamp(0.0, 1.0);

    let (inner, outer) = border_rectangles(camera_matrix, dist, None, width, height);
    if !(inner.width > 0.0 && inner.height > 0.0 && outer.width > 0.0 && outer.height > 0.0) {
        return Err(UndistortError::SingularCameraMatrix);
    }

    let w1 = (width - 1) as f64;
    let h1 = (height - 1) as f64;

    let fx0 = w1 / inner.width;
    let fy0 = h1 / inner.height;
    let cx0 = -fx0 * inner.x;
    let cy0 = -fy0 * inner.y;

    let fx1 = w1 / outer.width;
    let fy1 = h1 / outer.height;
    let cx1 = -fx1 * outer.x;
    let cy1 = -fy1 * outer.y;

    let new_k = CameraMatrix::from_intrinsics(
        fx0 * (1.0 - alpha) + fx1 * alpha,
        fy0 * (1.0 - alpha) + fy1 * alpha,
        cx0 * (1.0 - alpha) + cx1 * alpha,
        cy0 * (1.0 - alpha) + cy1 * alpha,
    );

    let (valid, _) = border_rectangles(camera_matrix, dist, Some(&new_k), width, height);
    let roi = snap_roi(&valid, width, height);
    log::debug!(
        "optimal camera matrix alpha={alpha}: fx={:.3} fy={:.3} cx={:.3} cy={:.3} roi={:?}",
        new_k.fx(),
        new_k.fy(),
        new_k.cx(),
        new_k.cy(),
        roi.to_array()
    );

    Ok(OptimalCameraMatrix {
        camera_matrix: new_k,
        roi,
    })
}
