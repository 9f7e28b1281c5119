//! Page geometry primitives and the rasterization boundary
//!
//! Everything the injection pipeline knows about a page comes through the
//! types in this module: page dimensions in points, OCR word boxes in
//! top-left image coordinates, and the `PageRenderer` trait that supplies
//! rasterized page content for stripping.

use crate::PdfError;

/// Page dimensions in PDF points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Check that a point (PDF user space, origin bottom-left) is on the page
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x <= self.width && y <= self.height
    }
}

/// Axis-aligned word bounding box in page units
///
/// Origin is at the top-left of the page with y increasing downward, which
/// is how OCR engines report word positions. Conversion to PDF user space
/// (origin bottom-left) happens during placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// A box with zero or negative extent cannot anchor a glyph run
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Whether the box lies entirely within a page of the given size
    pub fn fits(&self, page: &PageSize) -> bool {
        self.x0 >= 0.0 && self.y0 >= 0.0 && self.x1 <= page.width && self.y1 <= page.height
    }
}

/// A recognized word from OCR with its page-space position
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    /// Page index (0-based)
    pub page: usize,
    /// The recognized text
    pub text: String,
    /// Word bounding box (top-left origin, y down)
    pub bbox: BoundingBox,
    /// Font size reported by the OCR engine, if any
    pub font_size_hint: Option<f32>,
}

impl OcrWord {
    pub fn new(page: usize, text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            page,
            text: text.into(),
            bbox,
            font_size_hint: None,
        }
    }
}

/// Raw RGB raster of one page
#[derive(Debug, Clone)]
pub struct PageRaster {
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
    /// Tightly packed 8-bit RGB samples, row-major, `width * height * 3` bytes
    pub rgb: Vec<u8>,
}

impl PageRaster {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, PdfError> {
        if rgb.len() != (width as usize) * (height as usize) * 3 {
            return Err(PdfError::Render(format!(
                "raster buffer is {} bytes, expected {} for {}x{} RGB",
                rgb.len(),
                width as usize * height as usize * 3,
                width,
                height
            )));
        }
        Ok(Self { width, height, rgb })
    }
}

/// Boundary to the page geometry reader
///
/// Implementations own the rendering backend (PDFium in production, a stub
/// in tests). The injection pipeline only ever reads through this trait, so
/// the input PDF is never mutated while it is being rasterized.
pub trait PageRenderer {
    /// Number of pages in the document
    fn page_count(&self) -> Result<usize, PdfError>;

    /// Page dimensions in points for a 0-based page index
    fn page_size(&self, index: usize) -> Result<PageSize, PdfError>;

    /// Render the page's current visible content at `scale` times its
    /// nominal point size
    fn rasterize(&self, index: usize, scale: f32) -> Result<PageRaster, PdfError>;
}
