//! Searchable-PDF text injection using lopdf
//!
//! This crate turns scanned PDFs into searchable documents:
//! - Page stripping: flatten each page to a raster so no stale text layer
//!   survives
//! - Reflow placement: marker-delimited page text without positions is
//!   re-wrapped across the page at a tiny font size
//! - Exact placement: OCR word boxes drive per-word font size and baseline
//! - Invisible writer: glyph runs are emitted in rendering mode 3, so the
//!   page looks identical but becomes searchable and copyable

pub mod detect;
pub mod extract;
pub mod geometry;
pub mod inject;
pub mod layout;
pub mod marker;
#[cfg(feature = "pdfium")]
pub mod render;
pub mod strip;

#[cfg(test)]
pub(crate) mod test_support;

pub use detect::{scan_text_layer, TextLayerScan};
pub use extract::{extract_text_items, TextItem};
pub use geometry::{BoundingBox, OcrWord, PageRaster, PageRenderer, PageSize};
pub use inject::{inject_document, InjectOptions, InjectionReport};
pub use layout::{AverageWidth, InjectionPlan, LayoutOptions, Placement, TextSource, WidthEstimator};
pub use marker::{contains_extraction_error, parse_page_markers};
#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;

use lopdf::Document;
use std::fs;
use std::path::Path;

/// Inject a text source into a PDF and write the searchable result
///
/// The input is opened read-only; the output is written to a sibling temp
/// file and renamed into place only after a successful save, so an
/// interrupted run never leaves a partially written PDF behind. Pass a
/// renderer to strip pages before injecting (recommended; see
/// `InjectOptions::strip`), or `None` to overlay the original content.
pub fn make_searchable<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    source: &TextSource,
    renderer: Option<&dyn PageRenderer>,
    options: &InjectOptions,
) -> Result<InjectionReport, PdfError> {
    make_searchable_with_estimator(
        input,
        output,
        source,
        renderer,
        &AverageWidth::default(),
        options,
    )
}

/// Like [`make_searchable`], with a caller-supplied width estimator
pub fn make_searchable_with_estimator<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    source: &TextSource,
    renderer: Option<&dyn PageRenderer>,
    estimator: &dyn WidthEstimator,
    options: &InjectOptions,
) -> Result<InjectionReport, PdfError> {
    let mut doc = Document::load(input)?;
    let report = inject_document(&mut doc, source, renderer, estimator, options)?;

    let output = output.as_ref();
    let temp = temp_sibling(output);
    if let Err(e) = doc.save(&temp) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, output) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }

    Ok(report)
}

/// Temp path next to the final output, on the same filesystem so the
/// rename stays atomic
fn temp_sibling(output: &Path) -> std::path::PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output.pdf".into());
    name.push(".tmp");
    output.with_file_name(name)
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("rendering error: {0}")]
    Render(String),
    #[error("invalid PDF structure")]
    InvalidStructure,
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_sibling_stays_in_directory() {
        let temp = temp_sibling(Path::new("/some/dir/out.pdf"));
        assert_eq!(temp, Path::new("/some/dir/out.pdf.tmp"));
    }
}
