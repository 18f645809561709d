//! The diagnostic collector shared by the lexer, parser, and semantic
//! checker.
//!
//! Diagnostics accumulate in insertion order and are rendered once, after a
//! stage finishes, as `path:line:col: level: message` lines followed by the
//! offending source line and a caret pointing at the diagnostic's column.
//! Rendering never mutates the collector.

use std::io::Write;

use crate::source::SourceLocation;

/// Severity of a single diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Note,
}

impl Level {
    pub fn name(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Note => "note",
        }
    }
}

/// One reported problem: severity, human-readable message, and the position
/// it points at inside the preprocessed buffer.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub loc: SourceLocation,
}

/// Ordered collector of diagnostics with a sticky error flag.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diags: Vec<Diagnostic>,
    has_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, loc: SourceLocation, message: impl Into<String>) {
        self.has_error = true;
        self.push(Level::Error, loc, message);
    }

    pub fn warning(&mut self, loc: SourceLocation, message: impl Into<String>) {
        self.push(Level::Warning, loc, message);
    }

    pub fn note(&mut self, loc: SourceLocation, message: impl Into<String>) {
        self.push(Level::Note, loc, message);
    }

    fn push(&mut self, level: Level, loc: SourceLocation, message: impl Into<String>) {
        self.diags.push(Diagnostic {
            level,
            message: message.into(),
            loc,
        });
    }

    /// True once any `Error`-level diagnostic has been recorded.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn error_count(&self) -> usize {
        self.diags
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diags.iter()
    }

    /// Render every diagnostic against the buffer it points into.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut out = String::new();
        for d in &self.diags {
            out.push_str(&format!(
                "{}:{}:{}: {}: {}\n",
                filename,
                d.loc.line,
                d.loc.col,
                d.level.name(),
                d.message
            ));
            let line_text = line_text(source, d.loc.line);
            if !line_text.is_empty() {
                out.push_str(&format!("  {}\n", line_text));
                out.push_str(&format!(
                    "  {}^\n",
                    " ".repeat(d.loc.col.saturating_sub(1) as usize)
                ));
            }
        }
        out
    }

    /// Render everything to stderr.
    pub fn print_all(&self, filename: &str, source: &str) {
        let _ = std::io::stderr().write_all(self.render(filename, source).as_bytes());
    }
}

fn line_text(source: &str, line: u32) -> &str {
    let mut cur = 1u32;
    let mut start = 0usize;
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            if cur == line {
                return &source[start..i];
            }
            cur += 1;
            start = i + 1;
        }
    }
    if cur == line {
        return &source[start..];
    }
    ""
}
