//! Page-1 rasterization at 300 DPI (§4.3 step 1), via `pdfium-render` —
//! grounded directly in the teacher's own `pdfium_fast` crate, whose
//! `Cargo.toml` documents this exact dependency as "PDF rendering for OCR
//! fallback".

use image::DynamicImage;
use pdfium_render::prelude::*;
use vnform_core::error::{Result, VnFormError};

const TARGET_DPI: f32 = 300.0;
const POINTS_PER_INCH: f32 = 72.0;

/// Renders page 1 of `pdf_bytes` to an RGB image at 300 DPI.
pub fn rasterize_first_page(pdfium: &Pdfium, pdf_bytes: &[u8]) -> Result<DynamicImage> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| VnFormError::DetectorFailed(format!("failed to load PDF for rasterization: {e}")))?;

    let page = document
        .pages()
        .first()
        .map_err(|e| VnFormError::DetectorFailed(format!("PDF has no first page: {e}")))?;

    let scale = TARGET_DPI / POINTS_PER_INCH;
    let target_width = (page.width().value * scale).round() as i32;
    let target_height = (page.height().value * scale).round() as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_target_height(target_height);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| VnFormError::DetectorFailed(format!("failed to render page: {e}")))?;

    Ok(bitmap.as_image())
}

/// Page width/height in points, for the overlay coordinate transform (§4.7).
pub fn page_media_box(pdfium: &Pdfium, pdf_bytes: &[u8]) -> Result<(f32, f32)> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| VnFormError::DetectorFailed(format!("failed to load PDF: {e}")))?;
    let page = document
        .pages()
        .first()
        .map_err(|e| VnFormError::DetectorFailed(format!("PDF has no first page: {e}")))?;
    Ok((page.width().value, page.height().value))
}
