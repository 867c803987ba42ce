//! # Image Preprocessor
//!
//! Turns a user-selected image into a JPEG small enough to upload.
//!
//! ## Pipeline
//!
//! 1. **Decode**: any format the `image` crate recognises from the bytes themselves,
//!    upright according to the EXIF orientation tag when the file carries one
//! 2. **Plan**: `r = min(maxW / w, maxH / h, 1)` via [`sop_scale::presets::build_plan`]
//! 3. **Resize**: SIMD Lanczos3 via [`sop_scale::cpu`], skipped when `r == 1`
//! 4. **Flatten**: alpha is composited over black, as a canvas JPEG export does
//! 5. **Encode**: baseline JPEG at `round(quality * 100)`
//!
//! Decode failures are [`VerdictError::Decode`] and never panic. The async entry
//! point runs steps 1-5 on the blocking pool so the calling task stays responsive.

use std::io::Cursor;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use fast_image_resize::Resizer;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageReader};
use sop_scale::cpu::scale_rgba_to_vec;
use sop_scale::presets::{Size, build_plan};
use tracing::debug;

use crate::error::{VerdictError, VerdictResult};

/// Bounding box and encoder quality for uploads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality factor in `(0, 1]`
    pub quality: f32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_width: 1500,
            max_height: 1500,
            quality: 0.8,
        }
    }
}

impl PreprocessOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(format!(
                "Target box must be positive, got {}x{}",
                self.max_width, self.max_height
            ));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(format!("Quality must be in (0, 1], got {}", self.quality));
        }
        Ok(())
    }

    fn bounds(&self) -> Size {
        Size::new(self.max_width, self.max_height)
    }

    /// Quality on the encoder's 1..=100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// A re-encoded upload ready to attach to a request.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// JPEG bytes
    pub jpeg: Vec<u8>,
    /// Dimensions of the encoded JPEG
    pub size: Size,
    /// Dimensions of the decoded source
    pub source: Size,
}

impl PreparedImage {
    pub const MEDIA_TYPE: &'static str = "image/jpeg";

    /// `data:image/jpeg;base64,...` for embedding in a request body.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            Self::MEDIA_TYPE,
            general_purpose::STANDARD.encode(&self.jpeg)
        )
    }

    pub fn was_resized(&self) -> bool {
        self.size != self.source
    }
}

/// Decode, downscale and re-encode `bytes`.
pub fn preprocess_bytes(bytes: &[u8], opts: &PreprocessOptions) -> VerdictResult<PreparedImage> {
    opts.validate()
        .map_err(|reason| VerdictError::validation("preprocess", reason, format!("{opts:?}")))?;

    let decoded = decode_upright(bytes)?;
    let source = Size::new(decoded.width(), decoded.height());
    let plan = build_plan(source, opts.bounds());

    let rgba = decoded.into_rgba8();
    let pixels = if plan.is_identity() {
        rgba.into_raw()
    } else {
        let mut resizer = Resizer::new();
        scale_rgba_to_vec(&mut resizer, rgba.as_raw(), source, &plan)?
    };
    let rgb = flatten_over_black(&pixels);

    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, opts.jpeg_quality());
        encoder.encode(&rgb, plan.out.w, plan.out.h, ExtendedColorType::Rgb8)?;
    }

    debug!(
        src_w = source.w,
        src_h = source.h,
        out_w = plan.out.w,
        out_h = plan.out.h,
        bytes = jpeg.len(),
        "image preprocessed"
    );

    Ok(PreparedImage {
        jpeg,
        size: plan.out,
        source,
    })
}

/// Read `path` and preprocess it on the blocking pool.
pub async fn preprocess_file(path: &Path, opts: &PreprocessOptions) -> VerdictResult<PreparedImage> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| VerdictError::decode(format!("cannot read '{}': {e}", path.display())))?;
    let opts = *opts;
    tokio::task::spawn_blocking(move || preprocess_bytes(&bytes, &opts))
        .await
        .map_err(|e| VerdictError::processing("preprocess task", e.to_string()))?
}

/// Decode `bytes` and rotate/flip per the EXIF orientation tag.
fn decode_upright(bytes: &[u8]) -> VerdictResult<DynamicImage> {
    let decode = |e: &dyn std::fmt::Display| VerdictError::decode(e.to_string());
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode(&e))?
        .into_decoder()
        .map_err(|e| decode(&e))?;
    let orientation = decoder.orientation().map_err(|e| decode(&e))?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode(&e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// RGBA8 → RGB8, compositing over black.
fn flatten_over_black(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let a = u16::from(px[3]);
        for &c in &px[..3] {
            rgb.push(((u16::from(c) * a + 127) / 255) as u8);
        }
    }
    rgb
}
