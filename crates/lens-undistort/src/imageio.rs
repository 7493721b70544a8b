//! Conversions between `image` crate buffers and the core image types, plus
//! file load/save for single-channel images.

use crate::core::{AnyImage, Image, SampleKind};
use ::image::{DynamicImage, GrayImage, ImageBuffer, ImageReader, Luma};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

#[derive(thiserror::Error, Debug)]
pub enum ImageIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error("image dimensions {width}x{height} do not fit the output format")]
    InvalidDimensions { width: usize, height: usize },
}

pub fn image_from_gray(img: &GrayImage) -> Image<u8> {
    Image {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

pub fn image_from_gray16(img: &Gray16Image) -> Image<u16> {
    Image {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

fn dims_u32(width: usize, height: usize) -> Result<(u32, u32), ImageIoError> {
    let w = u32::try_from(width).ok();
    let h = u32::try_from(height).ok();
    w.zip(h)
        .ok_or(ImageIoError::InvalidDimensions { width, height })
}

pub fn gray_from_image(img: &Image<u8>) -> Result<GrayImage, ImageIoError> {
    let (w, h) = dims_u32(img.width, img.height)?;
    GrayImage::from_raw(w, h, img.data.clone()).ok_or(ImageIoError::InvalidDimensions {
        width: img.width,
        height: img.height,
    })
}

pub fn gray16_from_image(img: &Image<u16>) -> Result<Gray16Image, ImageIoError> {
    let (w, h) = dims_u32(img.width, img.height)?;
    Gray16Image::from_raw(w, h, img.data.clone()).ok_or(ImageIoError::InvalidDimensions {
        width: img.width,
        height: img.height,
    })
}

/// Collapse a decoded image to one channel, keeping 8/16-bit depth and
/// float32 where the source has them. Color images are converted to luma.
pub fn any_image_from_dynamic(img: &DynamicImage) -> AnyImage {
    match img {
        DynamicImage::ImageLuma8(gray) => image_from_gray(gray).into(),
        DynamicImage::ImageLuma16(gray) => image_from_gray16(gray).into(),
        DynamicImage::ImageLumaA16(_) | DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
            image_from_gray16(&img.to_luma16()).into()
        }
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            let luma = img.to_luma32f();
            Image {
                width: luma.width() as usize,
                height: luma.height() as usize,
                data: luma.into_raw(),
            }
            .into()
        }
        _ => image_from_gray(&img.to_luma8()).into(),
    }
}

/// Encode as the matching `image` buffer. Float images are stored as 16-bit
/// with samples scaled from `[0, 1]`, which is how the `image` crate maps
/// float luma to integer formats.
pub fn dynamic_from_any_image(img: &AnyImage) -> Result<DynamicImage, ImageIoError> {
    Ok(match img {
        AnyImage::U8(img) => DynamicImage::ImageLuma8(gray_from_image(img)?),
        AnyImage::U16(img) => DynamicImage::ImageLuma16(gray16_from_image(img)?),
        AnyImage::F32(img) => {
            let (w, h) = dims_u32(img.width, img.height)?;
            let rgb = ImageBuffer::<::image::Rgb<f32>, Vec<f32>>::from_fn(w, h, |x, y| {
                let v = img.data[y as usize * img.width + x as usize];
                ::image::Rgb([v, v, v])
            });
            DynamicImage::ImageLuma16(DynamicImage::ImageRgb32F(rgb).to_luma16())
        }
    })
}

/// Load an image file as a single-channel [`AnyImage`].
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(path)))]
pub fn load_image(path: impl AsRef<Path>) -> Result<AnyImage, ImageIoError> {
    let path = path.as_ref();
    let img = ImageReader::open(path)?.decode()?;
    let any = any_image_from_dynamic(&img);
    log::debug!(
        "loaded {}: {}x{} {}",
        path.display(),
        any.width(),
        any.height(),
        any.kind()
    );
    Ok(any)
}

/// Save a single-channel image; the format follows the file extension.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(path, img)))]
pub fn save_image(path: impl AsRef<Path>, img: &AnyImage) -> Result<(), ImageIoError> {
    let path = path.as_ref();
    if img.kind() == SampleKind::F32 {
        log::warn!("{}: float32 samples are stored as 16-bit", path.display());
    }
    dynamic_from_any_image(img)?.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_u8() -> Image<u8> {
        Image::from_vec(4, 3, (0..12).map(|i| i * 20).collect()).expect("image")
    }

    #[test]
    fn gray_conversions_keep_layout() {
        let img = ramp_u8();
        let gray = gray_from_image(&img).expect("gray");
        assert_eq!(gray.dimensions(), (4, 3));
        assert_eq!(gray.get_pixel(1, 2).0[0], img.data[2 * 4 + 1]);
        assert_eq!(image_from_gray(&gray), img);
    }

    #[test]
    fn dynamic_keeps_sample_kind() {
        let img16 = Image::from_vec(2, 2, vec![0u16, 1000, 40000, 65535]).expect("image");
        let dynamic = dynamic_from_any_image(&AnyImage::U16(img16.clone())).expect("encode");
        assert_eq!(any_image_from_dynamic(&dynamic), AnyImage::U16(img16));

        let rgb = DynamicImage::ImageRgb8(::image::RgbImage::new(3, 2));
        let any = any_image_from_dynamic(&rgb);
        assert_eq!(any.kind(), SampleKind::U8);
        assert_eq!((any.width(), any.height()), (3, 2));
    }

    #[test]
    fn png_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ramp.png");
        let img = AnyImage::U8(ramp_u8());
        save_image(&path, &img).expect("save");
        assert_eq!(load_image(&path).expect("load"), img);
    }
}
