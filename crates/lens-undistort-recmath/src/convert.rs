//! Conversions between recording arrays and typed images / parameter values.

use crate::{ArrayData, CorrectionError, NdArray, RecmathError};
use lens_undistort_core::{AnyImage, Image};

/// Interpret a 2-D array `[rows, cols]` as an image of its own sample kind.
///
/// The element type is checked before the shape, so unsupported data never
/// gets copied.
pub fn image_from_array(name: &str, array: &NdArray) -> Result<AnyImage, CorrectionError> {
    let element_type = array.element_type();
    if element_type.sample_kind().is_none() {
        return Err(CorrectionError::unsupported(name, element_type));
    }
    let &[rows, cols] = array.dims() else {
        return Err(CorrectionError::shape(
            name,
            format!("expected a 2-D image, got dims {:?}", array.dims()),
        ));
    };

    let img = match array.data() {
        ArrayData::U8(v) => AnyImage::U8(Image::from_vec(cols, rows, v.clone())?),
        ArrayData::U16(v) => AnyImage::U16(Image::from_vec(cols, rows, v.clone())?),
        ArrayData::F32(v) => AnyImage::F32(Image::from_vec(cols, rows, v.clone())?),
        _ => return Err(CorrectionError::unsupported(name, element_type)),
    };
    Ok(img)
}

/// Pack an image into a 2-D array `[height, width]`.
pub fn array_from_image(img: &AnyImage) -> Result<NdArray, RecmathError> {
    let dims = vec![img.height(), img.width()];
    let data = match img {
        AnyImage::U8(img) => ArrayData::U8(img.data.clone()),
        AnyImage::U16(img) => ArrayData::U16(img.data.clone()),
        AnyImage::F32(img) => ArrayData::F32(img.data.clone()),
    };
    NdArray::new(dims, data)
}

/// Widen a parameter array (uint8, uint16 or float32) to `f64` values in
/// row-major order.
pub fn parameter_values(name: &str, array: &NdArray) -> Result<Vec<f64>, CorrectionError> {
    match array.data() {
        ArrayData::U8(v) => Ok(v.iter().map(|&x| x as f64).collect()),
        ArrayData::U16(v) => Ok(v.iter().map(|&x| x as f64).collect()),
        ArrayData::F32(v) => Ok(v.iter().map(|&x| x as f64).collect()),
        _ => Err(CorrectionError::unsupported(name, array.element_type())),
    }
}

/// Integer view of a small index-like array; also accepts int32.
pub fn integer_values(name: &str, array: &NdArray) -> Result<Vec<i64>, CorrectionError> {
    match array.data() {
        ArrayData::I32(v) => Ok(v.iter().map(|&x| x as i64).collect()),
        ArrayData::U8(v) => Ok(v.iter().map(|&x| x as i64).collect()),
        ArrayData::U16(v) => Ok(v.iter().map(|&x| x as i64).collect()),
        ArrayData::F32(v) => Ok(v.iter().map(|&x| x.round() as i64).collect()),
        _ => Err(CorrectionError::unsupported(name, array.element_type())),
    }
}
