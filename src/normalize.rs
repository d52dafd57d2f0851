//! Image normalization.
//!
//! A single pure transform: raw encoded bytes in, a 3840×2160 JPEG out.
//! Cover-fit scaling preserves aspect ratio and the center crop discards
//! the overflow — left+right margins for sources wider than 16:9,
//! top+bottom for taller ones (which is why portrait and square sources
//! lose side content).
//!
//! Determinism is load-bearing: the ledger's reuse path assumes the
//! device-side asset for a given source identity is equivalent across
//! invocations, so the same input bytes with the same filter parameters
//! must reproduce byte-identical output.

use image::GenericImageView;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::core::constants::{JPEG_QUALITY, TARGET_HEIGHT, TARGET_WIDTH};
use crate::core::{FetchedAsset, NormalizeError, NormalizedAsset};

/// Normalize fetched bytes into the device's required format.
///
/// Fails with [`NormalizeError::Decode`] if the bytes are not a
/// supported raster image.
pub fn normalize(asset: &FetchedAsset) -> Result<NormalizedAsset, NormalizeError> {
    let decoded = image::load_from_memory(&asset.bytes).map_err(NormalizeError::Decode)?;
    let (width, height) = decoded.dimensions();

    // Cover-fit: scale until both axes reach the target, rounding up so
    // the crop below always has enough pixels on each axis.
    let scale = f64::max(
        f64::from(TARGET_WIDTH) / f64::from(width),
        f64::from(TARGET_HEIGHT) / f64::from(height),
    );
    let scaled_w = ((f64::from(width) * scale).ceil() as u32).max(TARGET_WIDTH);
    let scaled_h = ((f64::from(height) * scale).ceil() as u32).max(TARGET_HEIGHT);

    let resized = decoded.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3);

    // Center crop. Exactly one axis has overflow to discard.
    let left = (scaled_w - TARGET_WIDTH) / 2;
    let top = (scaled_h - TARGET_HEIGHT) / 2;
    let cropped = resized
        .crop_imm(left, top, TARGET_WIDTH, TARGET_HEIGHT)
        .to_rgb8();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    cropped
        .write_with_encoder(encoder)
        .map_err(NormalizeError::Encode)?;

    Ok(NormalizedAsset {
        bytes,
        source_identity: asset.identity.clone(),
    })
}
