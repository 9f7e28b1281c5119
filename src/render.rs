//! PDFium-backed page renderer
//!
//! Production implementation of the `PageRenderer` boundary. PDFium is not
//! thread-safe and its document handles borrow the library instance, so a
//! fresh binding is created per call; documents here are small scans and
//! the rebind cost is negligible next to rendering.

use crate::geometry::{PageRaster, PageRenderer, PageSize};
use crate::PdfError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

/// Renderer reading a PDF file read-only through PDFium
pub struct PdfiumRenderer {
    path: PathBuf,
}

impl PdfiumRenderer {
    /// Open a PDF for rendering, verifying PDFium can load it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PdfError> {
        let renderer = Self {
            path: path.as_ref().to_path_buf(),
        };
        renderer.page_count()?;
        Ok(renderer)
    }

    fn load<'a>(&self, pdfium: &'a Pdfium) -> Result<PdfDocument<'a>, PdfError> {
        pdfium
            .load_pdf_from_file(&self.path, None)
            .map_err(|e| PdfError::Render(format!("failed to load {:?}: {}", self.path, e)))
    }
}

/// Bind to a PDFium library next to the executable, in /opt/pdfium/lib, or
/// installed system-wide
fn create_pdfium() -> Result<Pdfium, PdfError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PdfError::Render(format!("failed to initialize PDFium: {}", e)))?;

    Ok(Pdfium::new(bindings))
}

impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> Result<usize, PdfError> {
        let pdfium = create_pdfium()?;
        let document = self.load(&pdfium)?;
        Ok(document.pages().len() as usize)
    }

    fn page_size(&self, index: usize) -> Result<PageSize, PdfError> {
        let pdfium = create_pdfium()?;
        let document = self.load(&pdfium)?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| PdfError::Render(format!("failed to get page {}: {}", index + 1, e)))?;
        Ok(PageSize::new(page.width().value, page.height().value))
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<PageRaster, PdfError> {
        let pdfium = create_pdfium()?;
        let document = self.load(&pdfium)?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| PdfError::Render(format!("failed to get page {}: {}", index + 1, e)))?;

        let config = PdfRenderConfig::new().set_target_size(
            (page.width().value * scale) as i32,
            (page.height().value * scale) as i32,
        );

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::Render(format!("failed to render page {}: {}", index + 1, e)))?;

        let rgb: image::RgbImage = bitmap.as_image().to_rgb8();
        let (width, height) = (rgb.width(), rgb.height());
        PageRaster::new(width, height, rgb.into_raw())
    }
}
