//! Text-layer detection
//!
//! Scans content streams for text-showing operators to tell whether a PDF
//! already carries a selectable layer. Stripping exists precisely because a
//! leftover layer would fight the injected one during search, so callers
//! use this to classify inputs and to explain why pages get flattened.

use lopdf::{Document, Object, ObjectId};

/// Summary of a document's existing text layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLayerScan {
    /// Pages in the document
    pub page_count: u32,
    /// Pages with at least one text-showing operator
    pub pages_with_text: u32,
    /// Total text-showing operators across all pages
    pub total_text_ops: u32,
}

impl TextLayerScan {
    /// Whether any page carries selectable text
    pub fn has_text_layer(&self) -> bool {
        self.pages_with_text > 0
    }
}

/// Scan every page of a loaded document for text operators
pub fn scan_text_layer(doc: &Document) -> TextLayerScan {
    let pages = doc.get_pages();
    let mut scan = TextLayerScan {
        page_count: pages.len() as u32,
        pages_with_text: 0,
        total_text_ops: 0,
    };

    for (_, page_id) in pages {
        let ops = count_page_text_operators(doc, page_id);
        if ops > 0 {
            scan.pages_with_text += 1;
        }
        scan.total_text_ops += ops;
    }

    scan
}

/// Count text-showing operators in one page's content streams
fn count_page_text_operators(doc: &Document, page_id: ObjectId) -> u32 {
    let mut ops = 0u32;

    for content_id in doc.get_page_contents(page_id) {
        if let Ok(Object::Stream(stream)) = doc.get_object(content_id) {
            let content = match stream.decompressed_content() {
                Ok(data) => data,
                Err(_) => stream.content.clone(),
            };
            ops += count_text_operators(&content);
        }
    }

    ops
}

/// Fast byte scan for Tj/TJ show-text operators
///
/// Literal string content is skipped by tracking parenthesis nesting (with
/// `\`-escape handling), so text like `(Tj )` never counts as an operator;
/// a match additionally requires the following byte to be whitespace or end
/// of stream, which filters out names like `/Tja`.
fn count_text_operators(content: &[u8]) -> u32 {
    let mut ops = 0u32;
    let mut depth = 0u32;

    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'\\' if depth > 0 => {
                // Escape inside a literal string covers \( \) \\ etc.
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' if depth > 0 => depth -= 1,
            b'T' if depth == 0 && i + 1 < content.len() => {
                let next = content[i + 1];
                if (next == b'j' || next == b'J')
                    && (i + 2 >= content.len() || content[i + 2].is_ascii_whitespace())
                {
                    ops += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_document;

    #[test]
    fn test_count_operators() {
        let content = b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET";
        assert_eq!(count_text_operators(content), 1);

        let content = b"BT /F1 12 Tf [(H) 10 (ello)] TJ (more) Tj ET";
        assert_eq!(count_text_operators(content), 2);

        let content = b"q 100 0 0 100 50 700 cm /Img1 Do Q";
        assert_eq!(count_text_operators(content), 0);
    }

    #[test]
    fn test_operators_inside_string_literals_not_counted() {
        let content = b"BT (a Tj inside) Tj ET";
        assert_eq!(count_text_operators(content), 1);

        let content = b"BT ((nested Tj) still a string) ET";
        assert_eq!(count_text_operators(content), 0);

        let content = br"BT (escaped \) paren Tj) ET";
        assert_eq!(count_text_operators(content), 0);
    }

    #[test]
    fn test_scan_finds_existing_layer() {
        let (doc, _) = sample_document("Some visible text");
        let scan = scan_text_layer(&doc);
        assert_eq!(scan.page_count, 1);
        assert_eq!(scan.pages_with_text, 1);
        assert!(scan.has_text_layer());
    }

    #[test]
    fn test_scan_after_strip_finds_nothing() {
        use crate::geometry::{PageRaster, PageSize};
        use crate::strip::strip_page;

        let (mut doc, page_id) = sample_document("Some visible text");
        let raster = PageRaster::new(2, 2, vec![255u8; 12]).unwrap();
        strip_page(&mut doc, page_id, &PageSize::new(612.0, 792.0), &raster).unwrap();

        let scan = scan_text_layer(&doc);
        assert_eq!(scan.pages_with_text, 0);
        assert!(!scan.has_text_layer());
    }
}
