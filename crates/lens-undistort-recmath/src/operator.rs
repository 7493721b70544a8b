//! The distortion-correction math function.
//!
//! One generic implementation backs both registered variants:
//! 1. take read access to the source image and calibration recordings,
//! 2. validate and extract (sample kind resolved once, before allocation),
//! 3. allocate the result recording and finalize its metadata,
//! 4. undistort, optionally crop to the calibration ROI, copy into the result,
//! 5. release every guard, then mark the result ready.

use crate::calibration::Calibration;
use crate::convert::image_from_array;
use crate::registry::{MathFunction, MathInputs};
use crate::{
    ArrayData, CorrectionError, ElementType, Metadata, NdArray, RecmathError, Recording,
    SharedRecording,
};
use lens_undistort_core::{crop_any_to_roi, undistort_any, AnyImage, SampleKind};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Registered name of the uint8-only variant.
pub const UNDISTORT_U8: &str = "lens_undistort.undistort_u8";
/// Registered name of the variant that follows the source sample kind.
pub const UNDISTORT: &str = "lens_undistort.undistort";

/// Name of the image array in result recordings when the source array has
/// no name of its own.
pub const DEFAULT_IMAGE_ARRAY: &str = "image";

/// Metadata entry attached by the uint8-only variant.
pub const FIXED_METADATA_KEY: &str = "Test_metadata_entry";
#[allow(clippy::approx_constant)]
pub const FIXED_METADATA_VALUE: f64 = 3.14;

/// Metadata entry recording the crop flag of the generic variant.
pub const CROP_METADATA_KEY: &str = "undistort.crop";

/// How a variant treats the source sample kind and what metadata it emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantPolicy {
    /// Only accepts sources of this kind; attaches the fixed annotation.
    Fixed(SampleKind),
    /// Accepts any supported kind; merges source and calibration metadata.
    Generic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UndistortFunction {
    name: &'static str,
    policy: VariantPolicy,
}

impl UndistortFunction {
    pub const fn new(name: &'static str, policy: VariantPolicy) -> Self {
        Self { name, policy }
    }

    pub const fn fixed_u8() -> Self {
        Self::new(UNDISTORT_U8, VariantPolicy::Fixed(SampleKind::U8))
    }

    pub const fn generic() -> Self {
        Self::new(UNDISTORT, VariantPolicy::Generic)
    }

    pub fn policy(&self) -> VariantPolicy {
        self.policy
    }

    fn result_metadata(&self, source: &Recording, calib: &Recording, crop: bool) -> Metadata {
        match self.policy {
            VariantPolicy::Fixed(_) => {
                Metadata::new().with(FIXED_METADATA_KEY, FIXED_METADATA_VALUE)
            }
            VariantPolicy::Generic => calib
                .metadata()
                .merge(source.metadata())
                .with(CROP_METADATA_KEY, crop),
        }
    }

    /// Run the operator; the returned recording is ready.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, inputs),
            fields(
                function = self.name,
                image = inputs.image.path(),
                calibration = inputs.calibration.path(),
                crop = inputs.crop
            )
        )
    )]
    pub fn run(&self, inputs: &MathInputs) -> Result<SharedRecording, RecmathError> {
        let result = {
            let source = inputs.image.read_ready()?;
            let calib = inputs.calibration.read_ready()?;

            let (array_name, image, calibration) = self.prepare(&source, &calib)?;

            // allocate + metadata
            let mut rec = Recording::new(inputs.result_path.clone());
            let idx = rec.define_array(
                array_name,
                NdArray::zeros(
                    ElementType::from(image.kind()),
                    vec![image.height(), image.width()],
                ),
            )?;
            rec.set_metadata(self.result_metadata(&source, &calib, inputs.crop))?;
            rec.mark_metadata_done()?;
            let result = SharedRecording::new(rec);

            // transform
            let mut corrected = undistort_any(
                &image,
                &calibration.camera_matrix,
                &calibration.distortion,
                &calibration.new_camera_matrix,
            )
            .map_err(CorrectionError::from)?;
            if inputs.crop {
                crop_any_to_roi(&mut corrected, &calibration.roi);
            }

            {
                let mut out = result.write()?;
                out.array_mut(idx)?.fill_from(image_data(corrected))?;
            }
            result
        };

        // every guard is released at this point
        result.write()?.mark_data_ready()?;
        log::info!(
            "{}: {} -> {} (crop: {})",
            self.name,
            inputs.image.path(),
            result.path(),
            inputs.crop
        );
        Ok(result)
    }

    /// Every validation step; nothing is allocated until this succeeds.
    fn prepare(
        &self,
        source: &Recording,
        calib: &Recording,
    ) -> Result<(String, AnyImage, Calibration), CorrectionError> {
        let (array_name, image) = self.source_image(source)?;
        let calibration = Calibration::parameters_from_recording(calib)?;
        Ok((array_name, image, calibration))
    }

    /// Pick the source image array (the first one) and resolve its kind.
    fn source_image(&self, source: &Recording) -> Result<(String, AnyImage), CorrectionError> {
        let array_name = source
            .array_name(0)
            .unwrap_or(DEFAULT_IMAGE_ARRAY)
            .to_string();
        let array = source
            .array(0)
            .ok_or_else(|| CorrectionError::shape(&array_name, "source has no arrays"))?;

        if let VariantPolicy::Fixed(kind) = self.policy {
            let element_type = array.element_type();
            if element_type.sample_kind() != Some(kind) {
                return Err(CorrectionError::unsupported(&array_name, element_type));
            }
        }

        let image = image_from_array(&array_name, array)?;
        log::debug!(
            "{}: source {} `{}` {}x{} {}",
            self.name,
            source.path(),
            array_name,
            image.width(),
            image.height(),
            image.kind()
        );
        Ok((array_name, image))
    }
}

impl MathFunction for UndistortFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, inputs: &MathInputs) -> Result<SharedRecording, RecmathError> {
        self.run(inputs)
    }
}

fn image_data(img: AnyImage) -> ArrayData {
    match img {
        AnyImage::U8(img) => ArrayData::U8(img.data),
        AnyImage::U16(img) => ArrayData::U16(img.data),
        AnyImage::F32(img) => ArrayData::F32(img.data),
    }
}

/// Correct `image` with `calibration` using the generic variant. The result
/// is published at `<image path>/undistorted`.
pub fn correct(
    image: &SharedRecording,
    calibration: &SharedRecording,
    crop: bool,
) -> Result<SharedRecording, RecmathError> {
    let inputs = MathInputs::new(image.clone(), calibration.clone(), crop)
        .with_result_path(format!("{}/undistorted", image.path()));
    UndistortFunction::generic().run(&inputs)
}
