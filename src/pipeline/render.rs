//! PDF rasterisation: render every page to a PNG file via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which uses thread-local
//! state and is CPU-bound. `tokio::task::spawn_blocking` keeps it off the
//! async worker threads.
//!
//! Pages are written as PNG files into the caller's scoped work directory so
//! the preprocessing stage can treat PDF pages and photos identically.

use crate::config::IntakeConfig;
use crate::error::IntakeError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to pdfium: `PDFIUM_LIB_PATH` if set, else the system library.
pub fn bind_pdfium() -> Result<Pdfium, IntakeError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path)
            .map_err(|e| IntakeError::PdfiumBindingFailed(format!("{}: {:?}", path, e)))?,
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| IntakeError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Rasterise all pages of `pdf_path` into `workdir`.
///
/// # Returns
/// Page image paths in page order.
pub async fn render_pages(
    pdf_path: &Path,
    config: &IntakeConfig,
    workdir: &Path,
) -> Result<Vec<PathBuf>, IntakeError> {
    let path = pdf_path.to_path_buf();
    let out_dir = workdir.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, dpi, max_pixels, &out_dir))
        .await
        .map_err(|e| IntakeError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    workdir: &Path,
) -> Result<Vec<PathBuf>, IntakeError> {
    let failed = |detail: String| IntakeError::RasterisationFailed {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| failed(format!("{:?}", e)))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let stem = pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        let out = workdir.join(format!("{}_page{}.png", stem, idx + 1));
        image
            .save(&out)
            .map_err(|e| failed(format!("page {}: {}", idx + 1, e)))?;

        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(out);
    }

    if results.is_empty() {
        return Err(failed("document has no pages".into()));
    }
    Ok(results)
}
