//! Text watermark overlay rasterized with fontdue

use anyhow::{Context, Result, anyhow};
use fontdue::{Font, FontSettings};
use image::RgbaImage;
use std::path::Path;

use crate::models::WatermarkPosition;

/// Margin between the text box and the image edge, in pixels
const EDGE_MARGIN: u32 = 8;

/// Minimum font size so watermarks stay legible on small images
const MIN_FONT_PX: f32 = 16.0;

/// Font size scales with image width.
pub fn scaled_font_px(image_width: u32) -> f32 {
    (image_width as f32 / 20.0).max(MIN_FONT_PX)
}

/// Top-left corner of the text box for a given anchor corner.
pub fn corner_origin(
    position: WatermarkPosition,
    image_width: u32,
    image_height: u32,
    text_width: u32,
    text_height: u32,
) -> (i32, i32) {
    let right = image_width.saturating_sub(text_width + EDGE_MARGIN) as i32;
    let bottom = image_height.saturating_sub(text_height + EDGE_MARGIN) as i32;
    let margin = EDGE_MARGIN as i32;

    match position {
        WatermarkPosition::TopLeft => (margin, margin),
        WatermarkPosition::TopRight => (right, margin),
        WatermarkPosition::BottomLeft => (margin, bottom),
        WatermarkPosition::BottomRight => (right, bottom),
    }
}

/// A parsed TTF ready for watermark rasterization
pub struct WatermarkFont {
    font: Font,
}

impl WatermarkFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read watermark font {}", path.display()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow!("Failed to parse watermark font: {e}"))?;
        Ok(Self { font })
    }

    fn measure(&self, text: &str, px: f32) -> (u32, f32, f32) {
        let (ascent, descent) = self
            .font
            .horizontal_line_metrics(px)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((px, 0.0));
        let width: f32 = text
            .chars()
            .map(|c| self.font.metrics(c, px).advance_width)
            .sum();
        (width.ceil() as u32, ascent, descent)
    }

    /// Blend white text onto `img` at `opacity`, anchored at `position`.
    pub fn draw(
        &self,
        img: &mut RgbaImage,
        text: &str,
        position: WatermarkPosition,
        opacity: f32,
    ) {
        let opacity = opacity.clamp(0.0, 1.0);
        let px = scaled_font_px(img.width());
        let (text_width, ascent, descent) = self.measure(text, px);
        let text_height = (ascent - descent).ceil() as u32;

        let (origin_x, origin_y) =
            corner_origin(position, img.width(), img.height(), text_width, text_height);
        let baseline_y = origin_y + ascent.ceil() as i32;

        let mut pen_x = origin_x as f32;
        for c in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(c, px);
            let glyph_left = pen_x.round() as i32 + metrics.xmin;
            let glyph_top = baseline_y - metrics.ymin - metrics.height as i32;

            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let coverage = bitmap[row * metrics.width + col];
                    if coverage == 0 {
                        continue;
                    }
                    let x = glyph_left + col as i32;
                    let y = glyph_top + row as i32;
                    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
                        continue;
                    }
                    let alpha = (coverage as f32 / 255.0) * opacity;
                    let pixel = img.get_pixel_mut(x as u32, y as u32);
                    for channel in 0..3 {
                        let dst = pixel.0[channel] as f32;
                        pixel.0[channel] = (255.0 * alpha + dst * (1.0 - alpha)).round() as u8;
                    }
                }
            }

            pen_x += metrics.advance_width;
        }
    }
}
