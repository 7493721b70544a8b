use crate::{
    sample_bilinear, AnyImage, CameraMatrix, Distorter, DistortionCoeffs, Image, ImageView, Roi,
    Sample, UndistortError,
};
use nalgebra::{Point2, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-pixel source coordinates for an undistorted output image.
///
/// `map_x[y * width + x]` / `map_y[...]` give the position in the distorted
/// source image that output pixel `(x, y)` samples from.
#[derive(Clone, Debug, PartialEq)]
pub struct UndistortMap {
    pub width: usize,
    pub height: usize,
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl UndistortMap {
    #[inline]
    pub fn source_of(&self, x: usize, y: usize) -> Option<Point2<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y * self.width + x;
        Some(Point2::new(self.map_x[idx], self.map_y[idx]))
    }
}

/// Build the map for `undistort`: each output pixel is back-projected through
/// `new_camera_matrix`, distorted with `dist` and projected with
/// `camera_matrix`. The camera skew term is ignored.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(camera_matrix, dist, new_camera_matrix))
)]
pub fn init_undistort_map(
    camera_matrix: &CameraMatrix,
    dist: &DistortionCoeffs,
    new_camera_matrix: &CameraMatrix,
    width: usize,
    height: usize,
) -> Result<UndistortMap, UndistortError> {
    let inv_new = new_camera_matrix.inverse()?;
    let distorter = Distorter::new(*dist);
    let identity = dist.is_zero();

    let n = width * height;
    let mut map_x = Vec::with_capacity(n);
    let mut map_y = Vec::with_capacity(n);

    for v in 0..height {
        for u in 0..width {
            let ray = inv_new * Vector3::new(u as f64, v as f64, 1.0);
            let w = if ray[2] != 0.0 { 1.0 / ray[2] } else { 1.0 };
            let ideal = Point2::new(ray[0] * w, ray[1] * w);
            let distorted = if identity {
                ideal
            } else {
                distorter.distort(ideal)
            };
            let src = camera_matrix.project(distorted);
            map_x.push(src.x as f32);
            map_y.push(src.y as f32);
        }
    }

    Ok(UndistortMap {
        width,
        height,
        map_x,
        map_y,
    })
}

/// Resample `src` through `map` with bilinear interpolation and a zero border.
pub fn remap<T: Sample>(
    src: &ImageView<'_, T>,
    map: &UndistortMap,
) -> Result<Image<T>, UndistortError> {
    if map.map_x.len() != map.width * map.height || map.map_y.len() != map.map_x.len() {
        return Err(UndistortError::BufferLength {
            expected: map.width * map.height,
            got: map.map_x.len().min(map.map_y.len()),
        });
    }

    let data = map
        .map_x
        .iter()
        .zip(&map.map_y)
        .map(|(&mx, &my)| T::from_f32(sample_bilinear(src, mx, my)))
        .collect();

    Image::from_vec(map.width, map.height, data)
}

/// Remove lens distortion from `src`; the output has the same size and
/// sample kind as the input.
pub fn undistort<T: Sample>(
    src: &ImageView<'_, T>,
    camera_matrix: &CameraMatrix,
    dist: &DistortionCoeffs,
    new_camera_matrix: &CameraMatrix,
) -> Result<Image<T>, UndistortError> {
    let map = init_undistort_map(
        camera_matrix,
        dist,
        new_camera_matrix,
        src.width,
        src.height,
    )?;
    log::debug!(
        "undistort {}x{} {:?} (zero distortion: {})",
        src.width,
        src.height,
        T::KIND,
        dist.is_zero()
    );
    remap(src, &map)
}

/// [`undistort`] over a runtime-typed image; the sample kind is preserved.
pub fn undistort_any(
    src: &AnyImage,
    camera_matrix: &CameraMatrix,
    dist: &DistortionCoeffs,
    new_camera_matrix: &CameraMatrix,
) -> Result<AnyImage, UndistortError> {
    Ok(match src {
        AnyImage::U8(img) => undistort(&img.view(), camera_matrix, dist, new_camera_matrix)?.into(),
        AnyImage::U16(img) => {
            undistort(&img.view(), camera_matrix, dist, new_camera_matrix)?.into()
        }
        AnyImage::F32(img) => {
            undistort(&img.view(), camera_matrix, dist, new_camera_matrix)?.into()
        }
    })
}

/// Zero every pixel outside `roi`. Whole-image ROIs leave the image untouched.
pub fn crop_to_roi<T: Sample>(img: &mut Image<T>, roi: &Roi) {
    if roi.is_whole_image() {
        return;
    }
    for y in 0..img.height {
        for x in 0..img.width {
            if !roi.contains(x, y) {
                img.data[y * img.width + x] = T::default();
            }
        }
    }
}

/// [`crop_to_roi`] over a runtime-typed image.
pub fn crop_any_to_roi(img: &mut AnyImage, roi: &Roi) {
    match img {
        AnyImage::U8(img) => crop_to_roi(img, roi),
        AnyImage::U16(img) => crop_to_roi(img, roi),
        AnyImage::F32(img) => crop_to_roi(img, roi),
    }
}
