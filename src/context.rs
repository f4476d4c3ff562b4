//! Context windows: clamped display ranges around a line of interest.
//!
//! Unlike addressed edit ranges, context windows clamp to the file bounds:
//! a match on line 1 with radius 3 shows lines 1..=4, not an error. Each
//! match gets its own independent window; overlapping windows are rendered
//! separately so every match appears centered in its own block.

/// Inclusive 1-based display range, always within `[1, line_count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub start: usize,
    pub end: usize,
}

impl ContextWindow {
    /// Window of `radius` lines on each side of `center`, clamped to the
    /// file. `center` must already be a valid 1-based line number.
    pub fn around(center: usize, radius: usize, line_count: usize) -> Self {
        ContextWindow {
            start: center.saturating_sub(radius).max(1),
            end: (center + radius).min(line_count),
        }
    }
}

/// Gutter width for rendering: wide enough for the largest line number in
/// the file, so all blocks from one file align.
pub fn gutter_width(line_count: usize) -> usize {
    line_count.max(1).to_string().len()
}

/// Render the window's lines with a right-aligned line-number gutter.
///
/// The `marked` line (if any) carries a `>` between number and text; all
/// other lines carry a space. `lines` is the whole file, 0-indexed.
pub fn render(lines: &[String], window: ContextWindow, marked: Option<usize>, width: usize) -> String {
    let mut out = String::new();
    for number in window.start..=window.end {
        let marker = if marked == Some(number) { '>' } else { ' ' };
        let text = lines.get(number - 1).map(String::as_str).unwrap_or("");
        out.push_str(&format!("{number:>width$}{marker} {text}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn test_window_interior() {
        let w = ContextWindow::around(5, 2, 10);
        assert_eq!((w.start, w.end), (3, 7));
    }

    #[test]
    fn test_window_clamps_at_start() {
        let w = ContextWindow::around(1, 3, 10);
        assert_eq!((w.start, w.end), (1, 4));
    }

    #[test]
    fn test_window_clamps_at_end() {
        let w = ContextWindow::around(10, 3, 10);
        assert_eq!((w.start, w.end), (7, 10));
    }

    #[test]
    fn test_zero_radius_is_single_line() {
        let w = ContextWindow::around(4, 0, 10);
        assert_eq!((w.start, w.end), (4, 4));
    }

    #[test]
    fn test_render_marks_center_only() {
        let lines = file(5);
        let rendered = render(&lines, ContextWindow::around(3, 1, 5), Some(3), 1);
        assert_eq!(rendered, "2  line 2\n3> line 3\n4  line 4\n");
    }

    #[test]
    fn test_render_aligns_gutter() {
        let lines = file(12);
        let rendered = render(
            &lines,
            ContextWindow::around(10, 1, 12),
            Some(10),
            gutter_width(12),
        );
        assert_eq!(rendered, " 9  line 9\n10> line 10\n11  line 11\n");
    }
}
