//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium wraps a C++ library with thread-local state, so the pipeline calls
//! [`PageRasterizer::rasterize`] from `tokio::task::spawn_blocking`, never
//! from an async worker thread.
//!
//! The requested DPI is honoured up to `max_rendered_pixels` on the longest
//! edge; beyond that both dimensions are scaled down together.

use crate::error::ExtractionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const POINTS_PER_INCH: f32 = 72.0;

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 1-based page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Renders all pages of a PDF at a given DPI.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<RasterPage>, ExtractionError>;
}

/// [`PageRasterizer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    password: Option<String>,
    max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(
        library_path: Option<PathBuf>,
        password: Option<String>,
        max_rendered_pixels: u32,
    ) -> Self {
        Self {
            library_path,
            password,
            max_rendered_pixels,
        }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<RasterPage>, ExtractionError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, self.password.as_deref())
            .map_err(|e| ExtractionError::DocumentLoad(format!("{e:?}")))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("Rasterising {} pages at {} DPI", total_pages, dpi);

        let mut results = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let (w, h) = render_dimensions(
                page.width().value,
                page.height().value,
                dpi,
                self.max_rendered_pixels,
            );
            let render_config = PdfRenderConfig::new()
                .set_target_width(w as i32)
                .set_maximum_height(h as i32);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ExtractionError::Rasterisation {
                    page: page_num,
                    detail: format!("{e:?}"),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            results.push(RasterPage { page_num, image });
        }

        Ok(results)
    }
}

/// Bind to pdfium: an explicit file or directory first, then the system library.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    if let Some(path) = library_path {
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(path.to_string_lossy().as_ref())
        } else {
            path.to_path_buf()
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Loaded pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => warn!(
                "Could not load pdfium from {}: {:?}; trying system library",
                lib.display(),
                e
            ),
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::PdfiumBinding(format!(
            "pdfium library not found. Set PDFIUM_LIB_PATH or install pdfium: {e:?}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Pixel size of a page rendered at `dpi`, longest edge capped at `max_px`.
pub(crate) fn render_dimensions(
    width_points: f32,
    height_points: f32,
    dpi: u32,
    max_px: u32,
) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let longest = raw_w.max(raw_h);
    if longest > max_px as f32 {
        let ratio = max_px as f32 / longest;
        (
            ((raw_w * ratio) as u32).clamp(1, max_px),
            ((raw_h * ratio) as u32).clamp(1, max_px),
        )
    } else {
        (raw_w as u32, raw_h as u32)
    }
}
