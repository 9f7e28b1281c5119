//! Page-delimited text stream parsing
//!
//! Upstream text producers emit one block per page, delimited by literal
//! `=== PAGE N ===` lines with 1-based page numbers. This module splits
//! such a stream into 0-based (page, text) blocks and screens for the
//! error sentinels a failed extraction leaves behind.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^===\s*PAGE\s+(\d+)\s*===\s*$").unwrap());

static EXTRACTION_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[Error extracting page \d+").unwrap());

/// Result of splitting a marker-delimited stream
#[derive(Debug, Clone, Default)]
pub struct MarkerBlocks {
    /// (0-based page index, text) in stream order
    pub blocks: Vec<(usize, String)>,
    /// Markers referencing pages beyond the document's page count
    pub dropped: u32,
}

/// Split a text stream on `=== PAGE N ===` markers
///
/// Markers are 1-based in the stream and mapped to 0-based page indices.
/// Text before the first marker belongs to no page and is ignored. Markers
/// whose page number exceeds `page_count` are dropped with a warning and
/// counted, never fatal.
pub fn parse_page_markers(text: &str, page_count: usize) -> MarkerBlocks {
    let mut result = MarkerBlocks::default();

    // Current block under accumulation: None until the first marker,
    // None again while skipping an out-of-range block.
    let mut current: Option<(usize, String)> = None;

    for line in text.lines() {
        if let Some(caps) = PAGE_MARKER.captures(line) {
            if let Some((page, body)) = current.take() {
                result.blocks.push((page, body));
            }

            let page_num: usize = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => {
                    // Only reachable for numbers that overflow usize
                    result.dropped += 1;
                    continue;
                }
            };

            if page_num == 0 || page_num > page_count {
                warn!(
                    "dropping marker for page {} (document has {} pages)",
                    page_num, page_count
                );
                result.dropped += 1;
                continue;
            }

            current = Some((page_num - 1, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
        // Text before the first marker falls through and is ignored
    }

    if let Some((page, body)) = current {
        result.blocks.push((page, body));
    }

    result
}

/// Check whether an extracted text stream contains the error sentinel the
/// upstream producer writes for pages it failed to read
/// (`[Error extracting page N: ...]`)
pub fn contains_extraction_error(text: &str) -> bool {
    EXTRACTION_ERROR.is_match(text)
}
