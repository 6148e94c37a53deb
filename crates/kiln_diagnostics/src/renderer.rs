//! Human-readable marker rendering.

use crate::marker::Marker;

/// Formats markers for display.
pub trait MarkerRenderer {
    /// Renders one marker. `source` is the resource's text when it is
    /// available and valid UTF-8.
    fn render(&self, marker: &Marker, source: Option<&str>) -> String;
}

/// Renders markers in a compiler-style terminal format.
///
/// ```text
/// error: src/b.src:3:5: unexpected token
///   |
/// 3 | let x = ;
///   |     ^^^
/// ```
///
/// Without source text only the header line is produced, with the byte
/// offset in place of line and column.
#[derive(Debug, Clone, Default)]
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn severity_label(&self, marker: &Marker) -> String {
        if self.color {
            let code = if marker.severity.is_error() { 31 } else { 33 };
            format!("\x1b[1;{code}m{}\x1b[0m", marker.severity)
        } else {
            marker.severity.to_string()
        }
    }
}

impl MarkerRenderer for TerminalRenderer {
    fn render(&self, marker: &Marker, source: Option<&str>) -> String {
        let label = self.severity_label(marker);
        let Some(text) = source else {
            return format!(
                "{label}: {}@{}: {}\n",
                marker.resource, marker.start, marker.message
            );
        };

        let (line, col) = line_col(text, marker.start);
        let mut out = format!("{label}: {}:{line}:{col}: {}\n", marker.resource, marker.message);

        let line_num = line.to_string();
        let padding = " ".repeat(line_num.len());
        let content = source_line(text, marker.start);
        let room = content.chars().count().saturating_sub(col - 1).max(1);
        let carets = "^".repeat(marker.len().min(room));
        let col_padding = " ".repeat(col - 1);

        out.push_str(&format!("{padding} |\n"));
        out.push_str(&format!("{line_num} | {content}\n"));
        out.push_str(&format!("{padding} | {col_padding}{carets}\n"));
        out
    }
}

/// Clamps `offset` into `text` and back to the nearest char boundary.
fn clamp(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Returns the 1-based line and column (in characters) of a byte offset.
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let offset = clamp(text, offset);
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
    let col = text[line_start..offset].chars().count() + 1;
    (line, col)
}

/// Extracts the line of `text` containing the given byte offset.
fn source_line(text: &str, offset: usize) -> &str {
    let offset = clamp(text, offset);
    let start = text[..offset].rfind('\n').map_or(0, |pos| pos + 1);
    let end = text[offset..]
        .find('\n')
        .map_or(text.len(), |pos| offset + pos);
    text[start..end].trim_end_matches('\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Location;
    use std::path::PathBuf;

    fn marker(start: usize, last: usize) -> Marker {
        Marker::error(
            Location::File(PathBuf::from("src/b.src")),
            start,
            last,
            "unexpected token",
        )
    }

    #[test]
    fn line_col_counts_from_one() {
        let text = "ab\ncd\nef";
        assert_eq!(line_col(text, 0), (1, 1));
        assert_eq!(line_col(text, 4), (2, 2));
        assert_eq!(line_col(text, 100), (3, 3));
    }

    #[test]
    fn render_with_source() {
        let text = "first\nlet x = ;\n";
        let out = TerminalRenderer::new(false).render(&marker(14, 14), Some(text));
        assert!(out.starts_with("error: src/b.src:2:9: unexpected token\n"));
        assert!(out.contains("2 | let x = ;"));
        assert!(out.contains("  |         ^\n"));
    }

    #[test]
    fn render_without_source() {
        let out = TerminalRenderer::new(false).render(&marker(7, 9), None);
        assert_eq!(out, "error: src/b.src@7: unexpected token\n");
    }

    #[test]
    fn carets_do_not_run_past_line() {
        let text = "abc\ndef";
        let out = TerminalRenderer::new(false).render(&marker(1, 50), Some(text));
        assert!(out.contains("  |  ^^\n"));
    }

    #[test]
    fn color_wraps_label() {
        let out = TerminalRenderer::new(true).render(&marker(0, 0), None);
        assert!(out.starts_with("\x1b[1;31merror\x1b[0m"));
    }
}
