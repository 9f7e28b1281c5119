//! Placement strategies: turning text into per-page injection plans
//!
//! Two strategies produce the same artifact, an `InjectionPlan`:
//! - reflow: marker-delimited page text with no position data is re-wrapped
//!   across the page at a tiny fixed font size (coverage over precision)
//! - exact: OCR words carry real bounding boxes, so font size is solved per
//!   word from the box width and the baseline anchored to the box bottom
//!
//! The plan is the only coupling to the writer; it never knows which
//! strategy produced it.

use crate::geometry::{OcrWord, PageSize};

/// One invisible glyph run: what to emit and where
///
/// Position is in PDF user space (origin bottom-left, y up) and names the
/// baseline start of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

/// Ordered placements for a single page
///
/// Built once per page, handed to the writer, then discarded.
#[derive(Debug, Clone, Default)]
pub struct InjectionPlan {
    pub placements: Vec<Placement>,
}

impl InjectionPlan {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// The two inputs a text producer can hand to the injector
#[derive(Debug, Clone)]
pub enum TextSource {
    /// UTF-8 stream with `=== PAGE N ===` markers, no positions (reflow)
    Markers(String),
    /// OCR words with bounding boxes, unordered across pages (exact)
    Words(Vec<OcrWord>),
}

/// Width estimation capability
///
/// Highlight-box fidelity in exact placement is bounded by how well this
/// matches the embedded font, so it is a trait rather than a constant:
/// tests substitute a deterministic stub.
pub trait WidthEstimator: Send + Sync {
    /// Estimated rendered width of `text` at `font_size`, in points
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Font size at which `text` renders approximately `target_width` wide
    ///
    /// Returns `None` for degenerate solves (empty text, non-positive
    /// target), which callers treat as "fall back or skip".
    fn solve_font_size(&self, text: &str, target_width: f32) -> Option<f32> {
        let unit_width = self.text_width(text, 1.0);
        if unit_width <= 0.0 || target_width <= 0.0 {
            None
        } else {
            Some(target_width / unit_width)
        }
    }
}

/// Monospace-style width model: every glyph advances the same fraction of
/// the font size
///
/// 0.5 em tracks Helvetica's average advance closely enough for invisible
/// text whose only job is to put search highlights in the right region.
#[derive(Debug, Clone, Copy)]
pub struct AverageWidth {
    pub em_fraction: f32,
}

impl Default for AverageWidth {
    fn default() -> Self {
        Self { em_fraction: 0.5 }
    }
}

impl WidthEstimator for AverageWidth {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.em_fraction
    }
}

/// Tunables for both placement strategies
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Fixed font size for reflow placement (small enough to be invisible
    /// even if a viewer ignores the rendering mode)
    pub reflow_font_size: f32,
    /// Vertical advance between reflow rows, in points
    pub reflow_line_height: f32,
    /// Top/side margin where reflow starts, in points
    pub margin: f32,
    /// Clamp bounds for solved font sizes in exact placement
    pub min_font_size: f32,
    pub max_font_size: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            reflow_font_size: 1.0,
            reflow_line_height: 8.0,
            margin: 36.0,
            min_font_size: 2.0,
            max_font_size: 72.0,
        }
    }
}

/// Reflow a positionless text block across the page
///
/// Tokens flow left-to-right from the top margin and wrap at the usable
/// width. When a block overflows the page, baselines clamp to the bottom
/// edge instead of leaving the page: every token must stay on-page and
/// searchable even if its highlight ends up overlapping.
pub fn reflow_plan(
    text: &str,
    page: &PageSize,
    estimator: &dyn WidthEstimator,
    options: &LayoutOptions,
) -> InjectionPlan {
    let mut plan = InjectionPlan::default();
    let size = options.reflow_font_size;
    let right_edge = (page.width - options.margin).max(options.margin + 1.0);
    let space = estimator.text_width(" ", size);

    let mut cursor_x = options.margin;
    let mut cursor_y = options.margin; // distance from the top of the page

    for token in text.split_whitespace() {
        let width = estimator.text_width(token, size);

        if cursor_x > options.margin && cursor_x + width > right_edge {
            cursor_x = options.margin;
            cursor_y += options.reflow_line_height;
        }

        plan.placements.push(Placement {
            text: token.to_string(),
            x: cursor_x,
            // Overflowing rows pin to the bottom edge; the writer clips
            // anything off-page, so leaving the page would drop tokens
            y: (page.height - cursor_y).max(0.0),
            font_size: size,
        });

        cursor_x += width + space;
    }

    plan
}

/// Place OCR words at their true boxes
///
/// Font size is solved so the run's estimated width matches the box width,
/// clamped to sane bounds; the baseline sits on the bottom edge of the box
/// so highlights cover the box instead of floating above it. Words are
/// independent, so no wrapping is involved. Returns the plan and the count
/// of words skipped for degenerate or off-page boxes or empty text.
pub fn exact_plan(
    words: &[OcrWord],
    page: &PageSize,
    estimator: &dyn WidthEstimator,
    options: &LayoutOptions,
) -> (InjectionPlan, u32) {
    let mut plan = InjectionPlan::default();
    let mut skipped = 0u32;

    for word in words {
        let text = word.text.trim();
        if text.is_empty() || word.bbox.is_degenerate() || !word.bbox.fits(page) {
            skipped += 1;
            continue;
        }

        let solved = estimator
            .solve_font_size(text, word.bbox.width())
            .or(word.font_size_hint)
            // Last resort mirrors the usual OCR heuristic: three quarters
            // of the box height, never below 6pt
            .unwrap_or_else(|| (word.bbox.height() * 0.75).max(6.0));

        let font_size = solved.clamp(options.min_font_size, options.max_font_size);

        plan.placements.push(Placement {
            text: text.to_string(),
            x: word.bbox.x0,
            // Box coordinates are top-left/y-down; the baseline goes at the
            // bottom edge of the box in PDF space
            y: page.height - word.bbox.y1,
            font_size,
        });
    }

    (plan, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    /// Deterministic stub: every char is exactly half the font size wide
    fn estimator() -> AverageWidth {
        AverageWidth { em_fraction: 0.5 }
    }

    #[test]
    fn test_reflow_preserves_token_order() {
        let page = PageSize::new(612.0, 792.0);
        let plan = reflow_plan(
            "alpha beta\n gamma",
            &page,
            &estimator(),
            &LayoutOptions::default(),
        );
        let tokens: Vec<&str> = plan.placements.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(tokens, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_reflow_starts_at_top_margin() {
        let page = PageSize::new(612.0, 792.0);
        let options = LayoutOptions::default();
        let plan = reflow_plan("word", &page, &estimator(), &options);
        assert_eq!(plan.placements[0].x, options.margin);
        assert_eq!(plan.placements[0].y, page.height - options.margin);
    }

    #[test]
    fn test_reflow_wraps_at_usable_width() {
        // Narrow page forces one token per row
        let page = PageSize::new(90.0, 200.0);
        let options = LayoutOptions {
            reflow_font_size: 10.0,
            ..LayoutOptions::default()
        };
        let plan = reflow_plan("first second", &page, &estimator(), &options);
        assert_eq!(plan.placements.len(), 2);
        assert_eq!(plan.placements[1].x, options.margin);
        assert_eq!(
            plan.placements[1].y,
            plan.placements[0].y - options.reflow_line_height
        );
    }

    #[test]
    fn test_reflow_never_drops_tokens() {
        // Page shorter than the text needs: rows continue past the margin
        let page = PageSize::new(100.0, 60.0);
        let options = LayoutOptions {
            reflow_font_size: 10.0,
            ..LayoutOptions::default()
        };
        let text = "one two three four five six seven eight";
        let plan = reflow_plan(text, &page, &estimator(), &options);
        assert_eq!(plan.placements.len(), 8);
        // Overflowing rows clamp to the bottom edge instead of leaving
        // the page, so the writer keeps them
        assert!(plan.placements.last().unwrap().y < plan.placements[0].y);
        assert!(plan.placements.iter().all(|p| page.contains(p.x, p.y)));
        assert_eq!(plan.placements.last().unwrap().y, 0.0);
    }

    #[test]
    fn test_reflow_empty_block() {
        let page = PageSize::new(612.0, 792.0);
        let plan = reflow_plan("   \n\t ", &page, &estimator(), &LayoutOptions::default());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_exact_solves_size_from_box_width() {
        let page = PageSize::new(612.0, 792.0);
        let words = vec![OcrWord::new(
            0,
            "Hello",
            BoundingBox::new(100.0, 100.0, 160.0, 120.0),
        )];
        let (plan, skipped) = exact_plan(&words, &page, &estimator(), &LayoutOptions::default());
        assert_eq!(skipped, 0);
        assert_eq!(plan.placements.len(), 1);

        let p = &plan.placements[0];
        // 5 chars at 0.5 em covering a 60pt box solves to 24pt
        assert!((p.font_size - 24.0).abs() < 0.01);
        assert_eq!(p.x, 100.0);
        // Baseline at the box bottom: 792 - 120
        assert_eq!(p.y, 672.0);
    }

    #[test]
    fn test_exact_clamps_solved_size() {
        let page = PageSize::new(612.0, 792.0);
        let options = LayoutOptions::default();
        // One character in a very wide box would solve far past the clamp
        let wide = vec![OcrWord::new(0, "x", BoundingBox::new(0.0, 0.0, 500.0, 20.0))];
        let (plan, _) = exact_plan(&wide, &page, &estimator(), &options);
        assert_eq!(plan.placements[0].font_size, options.max_font_size);

        // A sliver of a box clamps up to the minimum
        let thin = vec![OcrWord::new(
            0,
            "word",
            BoundingBox::new(0.0, 0.0, 0.5, 10.0),
        )];
        let (plan, _) = exact_plan(&thin, &page, &estimator(), &options);
        assert_eq!(plan.placements[0].font_size, options.min_font_size);
    }

    #[test]
    fn test_exact_skips_degenerate_box() {
        let page = PageSize::new(612.0, 792.0);
        let words = vec![
            OcrWord::new(0, "kept", BoundingBox::new(10.0, 10.0, 60.0, 25.0)),
            OcrWord::new(0, "gone", BoundingBox::new(50.0, 50.0, 50.0, 50.0)),
            OcrWord::new(0, "also", BoundingBox::new(70.0, 10.0, 120.0, 25.0)),
        ];
        let (plan, skipped) = exact_plan(&words, &page, &estimator(), &LayoutOptions::default());
        assert_eq!(skipped, 1);
        let texts: Vec<&str> = plan.placements.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["kept", "also"]);
    }

    #[test]
    fn test_exact_skips_off_page_box() {
        let page = PageSize::new(612.0, 792.0);
        let words = vec![
            OcrWord::new(0, "kept", BoundingBox::new(10.0, 10.0, 60.0, 25.0)),
            OcrWord::new(0, "wide", BoundingBox::new(600.0, 10.0, 660.0, 25.0)),
            OcrWord::new(0, "high", BoundingBox::new(10.0, -5.0, 60.0, 10.0)),
        ];
        let (plan, skipped) = exact_plan(&words, &page, &estimator(), &LayoutOptions::default());
        assert_eq!(skipped, 2);
        assert_eq!(plan.placements.len(), 1);
        assert_eq!(plan.placements[0].text, "kept");
    }

    #[test]
    fn test_exact_skips_empty_text() {
        let page = PageSize::new(612.0, 792.0);
        let words = vec![OcrWord::new(0, "  ", BoundingBox::new(10.0, 10.0, 60.0, 25.0))];
        let (plan, skipped) = exact_plan(&words, &page, &estimator(), &LayoutOptions::default());
        assert!(plan.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_exact_uses_hint_when_solve_degenerates() {
        // Estimator that cannot measure anything forces the fallback path
        struct Broken;
        impl WidthEstimator for Broken {
            fn text_width(&self, _: &str, _: f32) -> f32 {
                0.0
            }
        }

        let page = PageSize::new(612.0, 792.0);
        let mut word = OcrWord::new(0, "hinted", BoundingBox::new(0.0, 0.0, 50.0, 12.0));
        word.font_size_hint = Some(11.0);
        let (plan, _) = exact_plan(&[word], &page, &Broken, &LayoutOptions::default());
        assert_eq!(plan.placements[0].font_size, 11.0);

        // Without a hint the box-height heuristic applies
        let word = OcrWord::new(0, "plain", BoundingBox::new(0.0, 0.0, 50.0, 12.0));
        let (plan, _) = exact_plan(&[word], &page, &Broken, &LayoutOptions::default());
        assert_eq!(plan.placements[0].font_size, 9.0);
    }
}
