//! Plain-text tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// Renders left-aligned columns under a dashed header rule.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    render_aligned(headers, rows, &[])
}

/// Like [`render_table`], with per-column alignment. Missing entries are left-aligned.
pub fn render_aligned(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let cells = widths.iter().enumerate().map(|(idx, width)| {
        let value = values.get(idx).map(String::as_str).unwrap_or("");
        let sanitized = sanitize_cell(value);
        let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
        match aligns.get(idx).copied().unwrap_or_default() {
            Align::Left => format!("{sanitized}{padding}"),
            Align::Right => format!("{padding}{sanitized}"),
        }
    });
    let line = cells.collect::<Vec<_>>().join(COLUMN_GAP);
    line.trim_end().to_string()
}

/// Character count, ignoring ANSI colour sequences.
pub fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn pads_columns_to_widest_cell() {
        let rendered = render_table(
            &strings(&["Row", "Customer"]),
            &[strings(&["1", "Somchai"]), strings(&["12", "Ann"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Row  Customer");
        assert_eq!(lines[1], "---  --------");
        assert_eq!(lines[2], "1    Somchai");
        assert_eq!(lines[3], "12   Ann");
    }

    #[test]
    fn right_alignment_pads_on_the_left() {
        let rendered = render_aligned(
            &strings(&["Price", "Note"]),
            &[strings(&["5", "x"]), strings(&["50000", "y"])],
            &[Align::Right],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[2], "    5  x");
        assert_eq!(lines[3], "50000  y");
    }

    #[test]
    fn control_characters_and_ansi_do_not_break_layout() {
        let rendered = render_table(
            &strings(&["A", "B"]),
            &[strings(&["line\nbreak", "\u{1b}[31mred\u{1b}[0m"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("line break"));
        assert_eq!(display_width("\u{1b}[31mred\u{1b}[0m"), 3);
    }

    #[test]
    fn short_rows_render_empty_cells() {
        let rendered = render_table(&strings(&["A", "B", "C"]), &[strings(&["x"])]);
        assert_eq!(rendered.lines().nth(2), Some("x"));
    }
}
