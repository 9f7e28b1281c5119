//! Debug tool: print the placement plan for a marker-delimited text file

use pdf_searchable::layout::{reflow_plan, AverageWidth, LayoutOptions};
use pdf_searchable::{parse_page_markers, PageSize};
use std::env;
use std::fs;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <text_file> [width] [height]", args[0]);
        std::process::exit(1);
    }

    let text = fs::read_to_string(&args[1]).expect("Failed to read text file");
    let width: f32 = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(612.0);
    let height: f32 = args.get(3).and_then(|a| a.parse().ok()).unwrap_or(792.0);

    let page = PageSize::new(width, height);
    let estimator = AverageWidth::default();
    let options = LayoutOptions::default();

    let parsed = parse_page_markers(&text, usize::MAX);
    println!("{} block(s), {} marker(s) dropped", parsed.blocks.len(), parsed.dropped);

    for (index, block) in &parsed.blocks {
        let plan = reflow_plan(block, &page, &estimator, &options);
        println!();
        println!("=== page {} ({} placements) ===", index + 1, plan.placements.len());
        for p in &plan.placements {
            println!("  ({:7.2}, {:7.2}) @{:4.1}pt {:?}", p.x, p.y, p.font_size, p.text);
        }
    }
}
