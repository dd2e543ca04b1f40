//! Variant derivation: resolution-capped renditions of a decoded image
//!
//! Downscales preserve aspect ratio and never upscale. JPEG quality is 95
//! for the re-encoded original, 85 for medium, 80 for thumbnails. The webp
//! rendition shares the medium bound and is only emitted when enabled.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError};
use std::io::Cursor;

use crate::models::VariantKind;

pub const MEDIUM_MAX_EDGE: u32 = 1920;
pub const THUMBNAIL_MAX_EDGE: u32 = 400;

const ORIGINAL_QUALITY: u8 = 95;
const MEDIUM_QUALITY: u8 = 85;
const THUMBNAIL_QUALITY: u8 = 80;

/// One encoded rendition ready for upload
pub struct EncodedVariant {
    pub kind: VariantKind,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Cap the longer edge at `max_edge`, keeping aspect ratio. Images already
/// within the bound are returned unchanged.
pub fn scale_down(img: &DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        img.clone()
    } else {
        img.resize(max_edge, max_edge, FilterType::Lanczos3)
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    // JPEG has no alpha channel.
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = WebPEncoder::new_lossless(&mut buf);
    DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}

/// Derive the full variant set for an already-watermarked base image.
pub fn derive_variants(
    img: &DynamicImage,
    webp_enabled: bool,
) -> Result<Vec<EncodedVariant>, ImageError> {
    let medium = scale_down(img, MEDIUM_MAX_EDGE);
    let thumbnail = scale_down(img, THUMBNAIL_MAX_EDGE);

    let mut variants = vec![
        EncodedVariant {
            kind: VariantKind::Original,
            bytes: encode_jpeg(img, ORIGINAL_QUALITY)?,
            width: img.width(),
            height: img.height(),
        },
        EncodedVariant {
            kind: VariantKind::Medium,
            bytes: encode_jpeg(&medium, MEDIUM_QUALITY)?,
            width: medium.width(),
            height: medium.height(),
        },
        EncodedVariant {
            kind: VariantKind::Thumbnail,
            bytes: encode_jpeg(&thumbnail, THUMBNAIL_QUALITY)?,
            width: thumbnail.width(),
            height: thumbnail.height(),
        },
    ];

    if webp_enabled {
        variants.push(EncodedVariant {
            kind: VariantKind::Webp,
            bytes: encode_webp(&medium)?,
            width: medium.width(),
            height: medium.height(),
        });
    }

    Ok(variants)
}
