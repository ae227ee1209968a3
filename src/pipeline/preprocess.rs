//! Image pre-processing applied before OCR.
//!
//! The chain is fixed and deterministic: contrast boost → grayscale →
//! auto-contrast → binary threshold. Scanned data sheets are often grey,
//! low-contrast faxes; Tesseract reads a clean black-on-white bitmap far
//! better than the raw render.

use image::{DynamicImage, GrayImage, Luma};

/// Parameters of the pre-processing chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// Passed to `DynamicImage::adjust_contrast`; 0 leaves the image unchanged.
    pub contrast_boost: f32,
    /// Luma below this becomes black, everything else white.
    pub threshold: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            contrast_boost: 30.0,
            threshold: 140,
        }
    }
}

/// Run the full chain and return a binary (0/255) grayscale image.
pub fn prepare_for_ocr(image: &DynamicImage, opts: PreprocessOptions) -> GrayImage {
    let boosted = if opts.contrast_boost > 0.0 {
        image.adjust_contrast(opts.contrast_boost)
    } else {
        image.clone()
    };
    let mut gray = boosted.to_luma8();
    auto_contrast(&mut gray);
    binarize(&mut gray, opts.threshold);
    gray
}

/// Stretch luma linearly so the darkest pixel becomes 0 and the brightest 255.
///
/// A uniform image is left untouched.
pub fn auto_contrast(gray: &mut GrayImage) {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), Luma([v])| (lo.min(*v), hi.max(*v)));
    if max <= min {
        return;
    }
    let range = (max - min) as u32;
    for Luma([v]) in gray.pixels_mut() {
        *v = (((*v - min) as u32 * 255 + range / 2) / range) as u8;
    }
}

/// Map every pixel to 0 (below `threshold`) or 255.
pub fn binarize(gray: &mut GrayImage, threshold: u8) {
    for Luma([v]) in gray.pixels_mut() {
        *v = if *v < threshold { 0 } else { 255 };
    }
}
