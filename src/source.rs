//! Source positions and source buffers used across the whole pipeline.

use std::sync::Arc;

use miette::NamedSource;

/// A position inside one source buffer: byte offset plus 1-based line and
/// column. Attached to every token, AST node, and diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl SourceLocation {
    /// The position of the first byte of a buffer.
    pub fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            col: 1,
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::start()
    }
}

/// A source buffer paired with the path it goes by in reports.
///
/// Which text sits behind the name depends on the stage: the preprocessor
/// reports against the raw text of whichever file it is inside (includes
/// have their own contexts), while the lexer, parser, and sema all report
/// against the preprocessed buffer, whose line numbers are authoritative
/// once macros have run.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Pair a path with the text the current stage is working on.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// A context with no text behind it, for failures that happen before
    /// any buffer exists: a bad invocation, an unreadable input file.
    /// Reports carry the name but cannot quote a snippet.
    pub fn synthetic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: String::new(),
        }
    }

    /// The shared `NamedSource` miette renders snippets from.
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }

    /// Byte offset of a 1-based (line, col) position in this buffer.
    ///
    /// Positions past the end of a line clamp to the line's last byte, and
    /// positions past the last line clamp to the end of the buffer.
    pub fn offset_of(&self, line: u32, col: u32) -> usize {
        let mut cur_line = 1u32;
        let mut line_start = 0usize;
        for (i, b) in self.content.bytes().enumerate() {
            if cur_line == line {
                line_start = i;
                break;
            }
            if b == b'\n' {
                cur_line += 1;
                line_start = i + 1;
            }
        }
        if cur_line < line {
            return self.content.len();
        }
        let line_end = self.content[line_start..]
            .find('\n')
            .map(|n| line_start + n)
            .unwrap_or(self.content.len());
        (line_start + col.saturating_sub(1) as usize).min(line_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_of_maps_line_and_column() {
        let ctx = SourceContext::from_file("t.c", "abc\ndef\nghi\n");
        assert_eq!(ctx.offset_of(1, 1), 0);
        assert_eq!(ctx.offset_of(2, 1), 4);
        assert_eq!(ctx.offset_of(2, 3), 6);
        assert_eq!(ctx.offset_of(3, 2), 9);
    }

    #[test]
    fn offset_of_clamps_past_end() {
        let ctx = SourceContext::from_file("t.c", "ab\ncd");
        assert_eq!(ctx.offset_of(1, 99), 2);
        assert_eq!(ctx.offset_of(9, 1), ctx.content.len());
    }

    #[test]
    fn synthetic_context_has_a_name_but_no_text() {
        let ctx = SourceContext::synthetic("<command line>");
        assert_eq!(ctx.name, "<command line>");
        assert!(ctx.content.is_empty());
        assert_eq!(ctx.offset_of(5, 5), 0);
    }
}
