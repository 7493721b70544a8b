use crate::UndistortError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel sample kinds the remapping code understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    U8,
    U16,
    F32,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleKind::U8 => "uint8",
            SampleKind::U16 => "uint16",
            SampleKind::F32 => "float32",
        };
        f.write_str(s)
    }
}

/// A scalar pixel type. Interpolation happens in `f32`; `from_f32` rounds and
/// saturates for the integer kinds.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: SampleKind;

    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl Sample for u8 {
    const KIND: SampleKind = SampleKind::U8;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u8::MAX as f32) as u8
    }
}

impl Sample for u16 {
    const KIND: SampleKind = SampleKind::U16;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

impl Sample for f32 {
    const KIND: SampleKind = SampleKind::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a, T> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [T], // row-major, len = w*h
}

impl<'a, T: Sample> ImageView<'a, T> {
    pub fn new(width: usize, height: usize, data: &'a [T]) -> Result<Self, UndistortError> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Owned single-channel image, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
}

impl<T: Sample> Image<T> {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self, UndistortError> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = v;
        }
    }
}

fn check_len(width: usize, height: usize, got: usize) -> Result<(), UndistortError> {
    let expected = width
        .checked_mul(height)
        .ok_or(UndistortError::BufferLength {
            expected: usize::MAX,
            got,
        })?;
    if expected != got {
        return Err(UndistortError::BufferLength { expected, got });
    }
    Ok(())
}

/// An image whose sample kind is only known at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyImage {
    U8(Image<u8>),
    U16(Image<u16>),
    F32(Image<f32>),
}

impl AnyImage {
    pub fn kind(&self) -> SampleKind {
        match self {
            AnyImage::U8(_) => SampleKind::U8,
            AnyImage::U16(_) => SampleKind::U16,
            AnyImage::F32(_) => SampleKind::F32,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            AnyImage::U8(img) => img.width,
            AnyImage::U16(img) => img.width,
            AnyImage::F32(img) => img.width,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            AnyImage::U8(img) => img.height,
            AnyImage::U16(img) => img.height,
            AnyImage::F32(img) => img.height,
        }
    }
}

impl From<Image<u8>> for AnyImage {
    fn from(img: Image<u8>) -> Self {
        AnyImage::U8(img)
    }
}

impl From<Image<u16>> for AnyImage {
    fn from(img: Image<u16>) -> Self {
        AnyImage::U16(img)
    }
}

impl From<Image<f32>> for AnyImage {
    fn from(img: Image<f32>) -> Self {
        AnyImage::F32(img)
    }
}

#[inline]
fn get_sample<T: Sample>(src: &ImageView<'_, T>, x: i32, y: i32) -> f32 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0.0;
    }
    src.data[y as usize * src.width + x as usize].to_f32()
}

/// Bilinear sample at `(x, y)` in pixel coordinates (pixel centers on
/// integers). Neighbours outside the image read as zero.
#[inline]
pub fn sample_bilinear<T: Sample>(src: &ImageView<'_, T>, x: f32, y: f32) -> f32 {
    // NaN fails every comparison; past this point the integer casts cannot saturate
    let near = x >= -1.0 && y >= -1.0 && x < src.width as f32 && y < src.height as f32;
    if !near {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_sample(src, x0, y0);
    let p10 = get_sample(src, x0 + 1, y0);
    let p01 = get_sample(src, x0, y0 + 1);
    let p11 = get_sample(src, x0 + 1, y0 + 1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}
