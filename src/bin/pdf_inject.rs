//! CLI tool that makes a scanned PDF searchable
//!
//! Takes an extracted-text file (marker-delimited blocks from a vision or
//! OCR producer) or a word-box TSV, and writes a copy of the PDF with an
//! invisible text layer injected.

use pdf_searchable::{
    contains_extraction_error, make_searchable, scan_text_layer, BoundingBox, InjectOptions,
    OcrWord, PdfiumRenderer, TextSource,
};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    let positional: Vec<&String> = args[1..].iter().filter(|a| !a.starts_with("--")).collect();
    let flag = |name: &str| args[1..].iter().any(|a| a == name);

    if positional.len() != 3 {
        eprintln!(
            "Usage: {} <input.pdf> <text_file> <output.pdf> [options]",
            args[0]
        );
        eprintln!();
        eprintln!("Injects an invisible, searchable text layer into a scanned PDF.");
        eprintln!();
        eprintln!("The text file is either a marker-delimited stream (`=== PAGE N ===`");
        eprintln!("blocks, the default) or, with --words, a TSV of OCR word boxes:");
        eprintln!("  page<TAB>text<TAB>x0<TAB>y0<TAB>x1<TAB>y1[<TAB>font_size]");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --words     Treat the text file as OCR word boxes (exact placement)");
        eprintln!("  --no-strip  Keep original page content instead of flattening it");
        eprintln!("  --force     Inject even if the text file contains extraction errors");
        process::exit(1);
    }

    let (input, text_file, output) = (positional[0], positional[1], positional[2]);
    let words_mode = flag("--words");
    let no_strip = flag("--no-strip");
    let force = flag("--force");

    let text = match fs::read_to_string(text_file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", text_file, e);
            process::exit(1);
        }
    };

    let source = if words_mode {
        match parse_words_tsv(&text) {
            Ok(words) => TextSource::Words(words),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        if contains_extraction_error(&text) && !force {
            eprintln!("Error: {} contains extraction-error markers.", text_file);
            eprintln!("Fix the extraction or pass --force to inject anyway.");
            process::exit(2);
        }
        TextSource::Markers(text)
    };

    // Report whether the input already carries a text layer; stripping
    // removes it so search only ever hits the injected layer
    match lopdf::Document::load(input) {
        Ok(doc) => {
            let scan = scan_text_layer(&doc);
            if scan.has_text_layer() {
                println!(
                    "Note: {} of {} pages already carry selectable text{}",
                    scan.pages_with_text,
                    scan.page_count,
                    if no_strip {
                        " (kept: --no-strip)"
                    } else {
                        " (will be stripped)"
                    }
                );
            }
        }
        Err(e) => {
            eprintln!("Error: cannot open {}: {}", input, e);
            process::exit(1);
        }
    }

    let renderer = if no_strip {
        None
    } else {
        match PdfiumRenderer::open(input) {
            Ok(renderer) => Some(renderer),
            Err(e) => {
                eprintln!("Warning: PDFium unavailable, injecting without stripping: {}", e);
                None
            }
        }
    };

    let options = InjectOptions {
        strip: renderer.is_some(),
        ..InjectOptions::default()
    };

    let renderer_ref = renderer
        .as_ref()
        .map(|r| r as &dyn pdf_searchable::PageRenderer);

    match make_searchable(input, output, &source, renderer_ref, &options) {
        Ok(report) => {
            println!("Searchable PDF written to: {}", output);
            println!("  Pages:           {}", report.page_count);
            println!("  Pages injected:  {}", report.pages_injected);
            println!("  Glyph runs:      {}", report.placements);
            if report.pages_skipped > 0 {
                println!("  Pages skipped:   {}", report.pages_skipped);
            }
            if report.markers_dropped > 0 {
                println!("  Markers dropped: {}", report.markers_dropped);
            }
            if report.words_skipped > 0 {
                println!("  Words skipped:   {}", report.words_skipped);
            }
            if !report.succeeded() {
                eprintln!("Warning: no page received an injection.");
                process::exit(3);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Parse OCR word boxes from tab-separated lines
///
/// Format per line: `page<TAB>text<TAB>x0<TAB>y0<TAB>x1<TAB>y1` with an
/// optional trailing font-size column. Blank lines and `#` comments are
/// skipped; a malformed line is an error so silently shifted columns never
/// produce a garbage layer.
fn parse_words_tsv(text: &str) -> Result<Vec<OcrWord>, String> {
    let mut words = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 6 {
            return Err(format!(
                "line {}: expected at least 6 tab-separated fields, got {}",
                line_no + 1,
                fields.len()
            ));
        }

        let parse_num = |s: &str, what: &str| {
            s.trim()
                .parse::<f32>()
                .map_err(|_| format!("line {}: bad {}: {:?}", line_no + 1, what, s))
        };

        let page: usize = fields[0]
            .trim()
            .parse()
            .map_err(|_| format!("line {}: bad page index: {:?}", line_no + 1, fields[0]))?;

        let bbox = BoundingBox::new(
            parse_num(fields[2], "x0")?,
            parse_num(fields[3], "y0")?,
            parse_num(fields[4], "x1")?,
            parse_num(fields[5], "y1")?,
        );

        let mut word = OcrWord::new(page, fields[1], bbox);
        if let Some(size) = fields.get(6) {
            word.font_size_hint = parse_num(size, "font size").ok();
        }
        words.push(word);
    }

    Ok(words)
}
