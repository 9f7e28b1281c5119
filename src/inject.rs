//! Invisible text writer and the per-document injection pipeline
//!
//! The writer appends one content stream per page that shows every planned
//! glyph run in rendering mode 3 (no fill, no stroke), so the text is
//! selectable and searchable but paints nothing. The pipeline wires the
//! pieces together: page geometry, optional stripping, strategy-dependent
//! plan computation, and the structured skip report.

use crate::geometry::{OcrWord, PageRenderer, PageSize};
use crate::layout::{
    exact_plan, reflow_plan, InjectionPlan, LayoutOptions, TextSource, WidthEstimator,
};
use crate::marker::parse_page_markers;
use crate::strip::strip_page;
use crate::PdfError;
use log::{debug, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Font resource name for the injected layer; unusual on purpose so it
/// cannot collide with fonts already present on a page
const FONT_RESOURCE: &str = "FSrch";

/// Options for the injection pipeline
#[derive(Debug, Clone)]
pub struct InjectOptions {
    /// Placement tunables shared by both strategies
    pub layout: LayoutOptions,
    /// Rasterize and flatten each page before injecting (requires a
    /// renderer); turning this off injects over the original content
    pub strip: bool,
    /// Upscale factor for the stripping raster
    pub raster_scale: f32,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            strip: true,
            raster_scale: 2.0,
        }
    }
}

/// Structured outcome of one document's injection
///
/// Per-page and per-word failures are collected here instead of being
/// raised, so a caller can decide whether the output is acceptable.
#[derive(Debug, Clone, Default)]
pub struct InjectionReport {
    /// Pages in the document
    pub page_count: u32,
    /// Pages that received a non-empty invisible layer
    pub pages_injected: u32,
    /// Pages skipped for geometry or rasterization failures
    pub pages_skipped: u32,
    /// `=== PAGE N ===` markers referencing pages beyond the document
    pub markers_dropped: u32,
    /// OCR words skipped for degenerate boxes or empty text
    pub words_skipped: u32,
    /// Total glyph runs written
    pub placements: u64,
    /// Whether any page had text to place at all
    pub had_input_text: bool,
}

impl InjectionReport {
    /// A document succeeds when at least one page received an injection, or
    /// when there was nothing to inject in the first place
    pub fn succeeded(&self) -> bool {
        self.pages_injected > 0 || !self.had_input_text
    }
}

/// Apply an injection plan to one page
///
/// Placements whose origin falls outside the page are skipped, never
/// fatal. Returns the number of glyph runs written.
pub fn apply_plan(
    doc: &mut Document,
    page_id: ObjectId,
    size: &PageSize,
    plan: &InjectionPlan,
) -> Result<u32, PdfError> {
    if plan.is_empty() {
        return Ok(0);
    }

    let mut operations = vec![
        Operation::new("BT", vec![]),
        // Rendering mode 3: neither fill nor stroke, text is invisible
        Operation::new("Tr", vec![3.into()]),
    ];

    let mut written = 0u32;
    for placement in &plan.placements {
        if !size.contains(placement.x, placement.y) {
            debug!(
                "clipping placement {:?} at ({}, {}) outside {}x{} page",
                placement.text, placement.x, placement.y, size.width, size.height
            );
            continue;
        }

        operations.push(Operation::new(
            "Tf",
            vec![FONT_RESOURCE.into(), placement.font_size.into()],
        ));
        operations.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                placement.x.into(),
                placement.y.into(),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_pdf_text(&placement.text),
                lopdf::StringFormat::Literal,
            )],
        ));
        written += 1;
    }
    operations.push(Operation::new("ET", vec![]));

    if written == 0 {
        return Ok(0);
    }

    let encoded = Content { operations }
        .encode()
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    let stream_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, encoded)));

    append_page_content(doc, page_id, stream_id)?;
    ensure_font_resource(doc, page_id)?;

    Ok(written)
}

/// Encode text for a Tj literal string under WinAnsiEncoding
///
/// Characters outside Latin-1 cannot be represented by the simple font the
/// layer uses and degrade to '?' (they still keep the run searchable for
/// the surrounding words).
fn encode_pdf_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

/// Append a content stream reference to a page's Contents entry
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    stream_id: ObjectId,
) -> Result<(), PdfError> {
    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Parse(e.to_string()))?;

    match page_dict.get_mut(b"Contents") {
        Ok(Object::Reference(existing)) => {
            let contents = vec![Object::Reference(*existing), Object::Reference(stream_id)];
            page_dict.set("Contents", contents);
        }
        Ok(Object::Array(array)) => {
            array.push(Object::Reference(stream_id));
        }
        _ => {
            // No usable Contents entry: the injected layer becomes the
            // page's only content
            page_dict.set("Contents", stream_id);
        }
    }

    Ok(())
}

/// Make sure the page's resources carry the invisible-layer font
///
/// Resources and the nested Font dictionary may each be inline or behind a
/// reference; both shapes occur in the wild and after stripping.
fn ensure_font_resource(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    // Read-only pass first: if the font entry is already present, there is
    // nothing to add and no object to create
    let resources_ref = {
        let page_dict = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| PdfError::Parse(e.to_string()))?;

        let resources = match page_dict.get(b"Resources") {
            Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        };
        let fonts = resources.and_then(|r| match r.get(b"Font") {
            Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        });
        if fonts.is_some_and(|f| f.has(FONT_RESOURCE.as_bytes())) {
            return Ok(());
        }

        match page_dict.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let resources = match resources_ref {
        Some(id) => doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Parse(e.to_string()))?,
        None => {
            let page_dict = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| PdfError::Parse(e.to_string()))?;
            if !matches!(page_dict.get(b"Resources"), Ok(Object::Dictionary(_))) {
                page_dict.set("Resources", dictionary! {});
            }
            match page_dict.get_mut(b"Resources") {
                Ok(Object::Dictionary(dict)) => dict,
                _ => return Err(PdfError::InvalidStructure),
            }
        }
    };

    // Font entry may itself be inline or a reference
    let font_dict_ref = match resources.get(b"Font") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(Object::Dictionary(_)) => None,
        _ => {
            resources.set("Font", dictionary! {});
            None
        }
    };

    let fonts = match font_dict_ref {
        Some(id) => doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Parse(e.to_string()))?,
        None => match resources.get_mut(b"Font") {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return Err(PdfError::InvalidStructure),
        },
    };

    if !fonts.has(FONT_RESOURCE.as_bytes()) {
        fonts.set(FONT_RESOURCE, font_id);
    }

    Ok(())
}

/// Per-page text input after grouping a `TextSource`
enum PageInput {
    Block(String),
    Words(Vec<OcrWord>),
    Empty,
}

/// Inject a text source into every page of a loaded document
///
/// Pages are stripped (when enabled and a renderer is available) and then
/// receive their strategy-dependent invisible layer. Placement plans are
/// computed in parallel across pages; all document mutations stay
/// sequential. Per-page failures are reported, not raised.
pub fn inject_document(
    doc: &mut Document,
    source: &TextSource,
    renderer: Option<&dyn PageRenderer>,
    estimator: &dyn WidthEstimator,
    options: &InjectOptions,
) -> Result<InjectionReport, PdfError> {
    let pages = doc.get_pages();
    let page_count = pages.len();

    let mut report = InjectionReport {
        page_count: page_count as u32,
        ..InjectionReport::default()
    };

    // Group the source by 0-based page index
    let mut inputs: BTreeMap<usize, PageInput> = BTreeMap::new();
    match source {
        TextSource::Markers(text) => {
            let parsed = parse_page_markers(text, page_count);
            report.markers_dropped = parsed.dropped;
            for (page, block) in parsed.blocks {
                match inputs.entry(page).or_insert(PageInput::Empty) {
                    PageInput::Block(existing) => {
                        existing.push(' ');
                        existing.push_str(&block);
                    }
                    slot => *slot = PageInput::Block(block),
                }
            }
        }
        TextSource::Words(words) => {
            for word in words {
                if word.page >= page_count {
                    warn!(
                        "dropping word {:?} on page {} (document has {} pages)",
                        word.text, word.page, page_count
                    );
                    report.words_skipped += 1;
                    continue;
                }
                match inputs.entry(word.page).or_insert(PageInput::Empty) {
                    PageInput::Words(list) => list.push(word.clone()),
                    slot => *slot = PageInput::Words(vec![word.clone()]),
                }
            }
        }
    }

    // Resolve geometry for every page up front; a page without usable
    // geometry is skipped, not fatal
    let mut page_table: Vec<(usize, ObjectId, Option<PageSize>)> = Vec::with_capacity(page_count);
    for (page_num, page_id) in &pages {
        let index = (*page_num as usize) - 1;
        let size = match renderer {
            Some(r) => match r.page_size(index) {
                Ok(size) => Some(size),
                Err(e) => {
                    warn!("page {}: geometry unavailable: {}", page_num, e);
                    page_media_size(doc, *page_id)
                }
            },
            None => page_media_size(doc, *page_id),
        };
        page_table.push((index, *page_id, size));
    }

    // Plans are independent per page: compute them in parallel
    let plans: Vec<(InjectionPlan, u32)> = page_table
        .par_iter()
        .map(|(index, _, size)| {
            let size = match size {
                Some(size) => size,
                None => return (InjectionPlan::default(), 0),
            };
            match inputs.get(index) {
                Some(PageInput::Block(text)) => {
                    (reflow_plan(text, size, estimator, &options.layout), 0)
                }
                Some(PageInput::Words(words)) => {
                    exact_plan(words, size, estimator, &options.layout)
                }
                Some(PageInput::Empty) | None => (InjectionPlan::default(), 0),
            }
        })
        .collect();

    report.had_input_text = plans.iter().any(|(plan, _)| !plan.is_empty());
    report.words_skipped += plans.iter().map(|(_, skipped)| skipped).sum::<u32>();

    // Sequential write phase: strip, then overlay the invisible layer
    for ((index, page_id, size), (plan, _)) in page_table.iter().zip(plans.iter()) {
        let size = match size {
            Some(size) => *size,
            None => {
                report.pages_skipped += 1;
                continue;
            }
        };

        if options.strip {
            if let Some(renderer) = renderer {
                match renderer.rasterize(*index, options.raster_scale) {
                    Ok(raster) => strip_page(doc, *page_id, &size, &raster)?,
                    Err(e) => {
                        warn!("page {}: rasterization failed, skipping: {}", index + 1, e);
                        report.pages_skipped += 1;
                        continue;
                    }
                }
            }
        }

        let written = apply_plan(doc, *page_id, &size, plan)?;
        if written > 0 {
            report.pages_injected += 1;
            report.placements += written as u64;
        }
    }

    Ok(report)
}

/// Read a page's size from its MediaBox, following Pages-tree inheritance
fn page_media_size(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut current = page_id;
    // Pages trees are shallow; bounded walk guards against cycles
    for _ in 0..16 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let array = match media_box {
                Object::Array(array) => array.clone(),
                Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?.clone(),
                _ => return None,
            };
            if array.len() < 4 {
                return None;
            }
            let n = |obj: &Object| match obj {
                Object::Integer(i) => Some(*i as f32),
                Object::Real(r) => Some(*r),
                _ => None,
            };
            let (x0, y0, x1, y1) = (n(&array[0])?, n(&array[1])?, n(&array[2])?, n(&array[3])?);
            return Some(PageSize::new(x1 - x0, y1 - y0));
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{AverageWidth, Placement};
    use crate::test_support::sample_document;

    #[test]
    fn test_apply_plan_writes_invisible_runs() {
        let (mut doc, page_id) = sample_document("original");
        let size = PageSize::new(612.0, 792.0);
        let plan = InjectionPlan {
            placements: vec![Placement {
                text: "hidden".into(),
                x: 100.0,
                y: 650.0,
                font_size: 12.0,
            }],
        };

        let written = apply_plan(&mut doc, page_id, &size, &plan).unwrap();
        assert_eq!(written, 1);

        let content = doc.get_page_content(page_id).unwrap();
        let decoded = Content::decode(&content).unwrap();
        let operators: Vec<&str> = decoded
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        // Original content first, then our BT / Tr 3 / ... / ET block
        assert!(operators.windows(2).any(|w| w == ["BT", "Tr"]));
        let tr = decoded
            .operations
            .iter()
            .find(|op| op.operator == "Tr")
            .unwrap();
        assert_eq!(tr.operands[0].as_i64().unwrap(), 3);
    }

    #[test]
    fn test_apply_plan_registers_font() {
        let (mut doc, page_id) = sample_document("original");
        let size = PageSize::new(612.0, 792.0);
        let plan = InjectionPlan {
            placements: vec![Placement {
                text: "hidden".into(),
                x: 10.0,
                y: 10.0,
                font_size: 8.0,
            }],
        };
        apply_plan(&mut doc, page_id, &size, &plan).unwrap();

        let page_dict = doc.get_dictionary(page_id).unwrap();
        let resources = page_dict.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));
    }

    #[test]
    fn test_apply_plan_skips_out_of_page_placements() {
        let (mut doc, page_id) = sample_document("original");
        let size = PageSize::new(612.0, 792.0);
        let plan = InjectionPlan {
            placements: vec![
                Placement {
                    text: "outside".into(),
                    x: 700.0,
                    y: 100.0,
                    font_size: 8.0,
                },
                Placement {
                    text: "inside".into(),
                    x: 100.0,
                    y: 100.0,
                    font_size: 8.0,
                },
            ],
        };
        let written = apply_plan(&mut doc, page_id, &size, &plan).unwrap();
        assert_eq!(written, 1);
    }

    #[test]
    fn test_overflowing_block_is_fully_written() {
        use crate::extract::extract_text_items;
        use crate::layout::{reflow_plan, LayoutOptions};

        // Far more tokens than a 100x60 page can hold at this line height
        let (mut doc, page_id) = sample_document("original");
        let size = PageSize::new(100.0, 60.0);
        let tokens: Vec<String> = (0..200).map(|i| format!("w{}", i)).collect();
        let text = tokens.join(" ");
        let options = LayoutOptions {
            reflow_font_size: 10.0,
            ..LayoutOptions::default()
        };

        let plan = reflow_plan(&text, &size, &AverageWidth::default(), &options);
        assert_eq!(plan.placements.len(), 200);

        let written = apply_plan(&mut doc, page_id, &size, &plan).unwrap();
        assert_eq!(written, 200);

        let recovered: Vec<String> = extract_text_items(&doc)
            .unwrap()
            .into_iter()
            .map(|item| item.text)
            .filter(|text| text.starts_with('w'))
            .collect();
        assert_eq!(recovered, tokens);
    }

    #[test]
    fn test_font_resource_registered_once() {
        let (mut doc, page_id) = sample_document("original");
        ensure_font_resource(&mut doc, page_id).unwrap();
        let objects = doc.objects.len();

        // A second pass finds the entry and must not orphan a new object
        ensure_font_resource(&mut doc, page_id).unwrap();
        assert_eq!(doc.objects.len(), objects);
    }

    #[test]
    fn test_apply_empty_plan_is_noop() {
        let (mut doc, page_id) = sample_document("original");
        let before = doc.get_page_content(page_id).unwrap();
        let written = apply_plan(
            &mut doc,
            page_id,
            &PageSize::new(612.0, 792.0),
            &InjectionPlan::default(),
        )
        .unwrap();
        assert_eq!(written, 0);
        assert_eq!(doc.get_page_content(page_id).unwrap(), before);
    }

    #[test]
    fn test_encode_pdf_text_degrades_non_latin1() {
        assert_eq!(encode_pdf_text("abc"), b"abc".to_vec());
        assert_eq!(encode_pdf_text("caf\u{e9}"), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode_pdf_text("\u{4e16}"), b"?".to_vec());
    }

    #[test]
    fn test_media_size_inherited_from_parent() {
        let (doc, page_id) = sample_document("x");
        let size = page_media_size(&doc, page_id).unwrap();
        assert_eq!(size.width, 612.0);
        assert_eq!(size.height, 792.0);
    }

    #[test]
    fn test_inject_document_reflow_without_renderer() {
        let (mut doc, _) = sample_document("original");
        let source = TextSource::Markers("=== PAGE 1 ===\nalpha beta".into());
        let report = inject_document(
            &mut doc,
            &source,
            None,
            &AverageWidth::default(),
            &InjectOptions::default(),
        )
        .unwrap();

        assert_eq!(report.page_count, 1);
        assert_eq!(report.pages_injected, 1);
        assert_eq!(report.placements, 2);
        assert!(report.succeeded());
    }

    #[test]
    fn test_inject_document_empty_source_succeeds() {
        let (mut doc, _) = sample_document("original");
        let report = inject_document(
            &mut doc,
            &TextSource::Markers(String::new()),
            None,
            &AverageWidth::default(),
            &InjectOptions::default(),
        )
        .unwrap();

        assert_eq!(report.pages_injected, 0);
        assert!(!report.had_input_text);
        assert!(report.succeeded());
    }

    #[test]
    fn test_inject_document_drops_out_of_range_words() {
        use crate::geometry::{BoundingBox, OcrWord};
        let (mut doc, _) = sample_document("original");
        let words = vec![
            OcrWord::new(0, "ok", BoundingBox::new(10.0, 10.0, 40.0, 22.0)),
            OcrWord::new(7, "lost", BoundingBox::new(10.0, 10.0, 40.0, 22.0)),
        ];
        let report = inject_document(
            &mut doc,
            &TextSource::Words(words),
            None,
            &AverageWidth::default(),
            &InjectOptions::default(),
        )
        .unwrap();

        assert_eq!(report.words_skipped, 1);
        assert_eq!(report.placements, 1);
    }
}
