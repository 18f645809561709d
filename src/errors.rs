//! Pipeline-level error handling.
//!
//! All hard failures of the front end (preprocessor aborts, stage gates,
//! driver misuse) are represented by `CompileError`. Soft, recoverable
//! problems inside the lexer/parser/sema are *not* errors in this sense;
//! they accumulate in [`crate::diagnostics::Diagnostics`] and only surface
//! here as a `SyntaxErrors`/`SemanticErrors` gate once a stage finishes.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::source::{SourceContext, SourceLocation};

/// The single error type for hard failures: what went wrong, where it
/// happened, and how to help.
#[derive(Debug)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub help: Option<String>,
}

/// All hard failure modes as a clean enum.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Preprocessor errors - the whole compilation aborts
    UnknownDirective,
    ExpectedHeaderName,
    UnterminatedIncludePath,
    UnresolvedInclude { header: String },
    ExpectedMacroName,
    MalformedParameterList { detail: String },
    UnexpectedConditional { directive: String },
    UnterminatedConditional,
    MalformedIfExpression { detail: String },

    // Stage gates - the details already went to stderr as diagnostics
    SyntaxErrors { count: usize },
    SemanticErrors { count: usize },

    // Driver errors
    InvalidUsage { message: String },
    Io { path: String, message: String },
    NoMainFunction,
    OutputWithMultipleInputs,
}

/// Where the failure points: a named source buffer plus a span inside it.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: &'static str,
}

impl CompileError {
    /// Create an error anchored to a position inside a real source buffer.
    pub fn new(
        kind: ErrorKind,
        phase: &'static str,
        ctx: &SourceContext,
        span: SourceSpan,
    ) -> Self {
        Self {
            kind,
            source_info: SourceInfo {
                source: ctx.to_named_source(),
                primary_span: span,
                phase,
            },
            help: None,
        }
    }

    /// Preprocessor error at a 1-based (line, col) position of `ctx`.
    pub fn preprocess(kind: ErrorKind, ctx: &SourceContext, line: u32, col: u32) -> Self {
        let offset = ctx.offset_of(line, col);
        Self::new(kind, "preprocess", ctx, SourceSpan::from(offset..offset))
    }

    /// Driver error; these happen before any source buffer exists.
    pub fn driver(kind: ErrorKind) -> Self {
        Self::new(
            kind,
            "driver",
            &SourceContext::synthetic("<command line>"),
            unspanned(),
        )
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Get the error category for test assertions
    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            ErrorKind::UnknownDirective
            | ErrorKind::ExpectedHeaderName
            | ErrorKind::UnterminatedIncludePath
            | ErrorKind::UnresolvedInclude { .. }
            | ErrorKind::ExpectedMacroName
            | ErrorKind::MalformedParameterList { .. }
            | ErrorKind::UnexpectedConditional { .. }
            | ErrorKind::UnterminatedConditional
            | ErrorKind::MalformedIfExpression { .. } => ErrorCategory::Preprocess,

            ErrorKind::SyntaxErrors { .. } => ErrorCategory::Syntax,
            ErrorKind::SemanticErrors { .. } => ErrorCategory::Semantic,

            ErrorKind::InvalidUsage { .. }
            | ErrorKind::Io { .. }
            | ErrorKind::NoMainFunction
            | ErrorKind::OutputWithMultipleInputs => ErrorCategory::Driver,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self.kind {
            ErrorKind::UnknownDirective => "unknown_directive",
            ErrorKind::ExpectedHeaderName => "expected_header_name",
            ErrorKind::UnterminatedIncludePath => "unterminated_include_path",
            ErrorKind::UnresolvedInclude { .. } => "unresolved_include",
            ErrorKind::ExpectedMacroName => "expected_macro_name",
            ErrorKind::MalformedParameterList { .. } => "malformed_parameter_list",
            ErrorKind::UnexpectedConditional { .. } => "unexpected_conditional",
            ErrorKind::UnterminatedConditional => "unterminated_conditional",
            ErrorKind::MalformedIfExpression { .. } => "malformed_if_expression",
            ErrorKind::SyntaxErrors { .. } => "syntax_errors",
            ErrorKind::SemanticErrors { .. } => "semantic_errors",
            ErrorKind::InvalidUsage { .. } => "invalid_usage",
            ErrorKind::Io { .. } => "io",
            ErrorKind::NoMainFunction => "no_main_function",
            ErrorKind::OutputWithMultipleInputs => "output_with_multiple_inputs",
        }
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::UnknownDirective => "unknown directive".into(),
            ErrorKind::ExpectedHeaderName => "header name expected here".into(),
            ErrorKind::UnterminatedIncludePath => "path never closed".into(),
            ErrorKind::UnresolvedInclude { .. } => "not found on any search path".into(),
            ErrorKind::ExpectedMacroName => "macro name expected here".into(),
            ErrorKind::MalformedParameterList { .. } => "in this parameter list".into(),
            ErrorKind::UnexpectedConditional { .. } => "no matching #if".into(),
            ErrorKind::UnterminatedConditional => "conditional still open here".into(),
            ErrorKind::MalformedIfExpression { .. } => "in this expression".into(),
            ErrorKind::SyntaxErrors { .. } => "while parsing this unit".into(),
            ErrorKind::SemanticErrors { .. } => "while checking this unit".into(),
            ErrorKind::InvalidUsage { .. } => "in the invocation".into(),
            ErrorKind::Io { .. } => "while reading".into(),
            ErrorKind::NoMainFunction => "no entry point".into(),
            ErrorKind::OutputWithMultipleInputs => "conflicting flags".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Preprocess,
    Syntax,
    Semantic,
    Driver,
}

impl std::error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::UnknownDirective => {
                write!(f, "unknown preprocessor directive")
            }
            ErrorKind::ExpectedHeaderName => {
                write!(f, "expected '\"' or '<' after include")
            }
            ErrorKind::UnterminatedIncludePath => {
                write!(f, "unterminated include path")
            }
            ErrorKind::UnresolvedInclude { header } => {
                write!(f, "include file not found: {}", header)
            }
            ErrorKind::ExpectedMacroName => {
                write!(f, "expected macro name")
            }
            ErrorKind::MalformedParameterList { detail } => {
                write!(f, "malformed macro parameter list: {}", detail)
            }
            ErrorKind::UnexpectedConditional { directive } => {
                write!(f, "unexpected {}", directive)
            }
            ErrorKind::UnterminatedConditional => {
                write!(f, "unterminated conditional directive")
            }
            ErrorKind::MalformedIfExpression { detail } => {
                write!(f, "{}", detail)
            }
            ErrorKind::SyntaxErrors { count } => {
                write!(f, "{} syntax error(s)", count)
            }
            ErrorKind::SemanticErrors { count } => {
                write!(f, "{} semantic error(s)", count)
            }
            ErrorKind::InvalidUsage { message } => {
                write!(f, "{}", message)
            }
            ErrorKind::Io { path, message } => {
                write!(f, "failed to read '{}': {}", path, message)
            }
            ErrorKind::NoMainFunction => {
                write!(f, "no 'main' function defined")
            }
            ErrorKind::OutputWithMultipleInputs => {
                write!(f, "-o with -c requires a single input file")
            }
        }
    }
}

impl Diagnostic for CompileError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!(
            "c99cc::{}::{}",
            self.source_info.phase,
            self.code_suffix()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

/// Creates a placeholder span for errors not tied to a specific source code
/// location, such as I/O errors or driver-level failures. This makes the
/// intent of using an empty span explicit and searchable.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Converts a front-end [`SourceLocation`] to a miette `SourceSpan`.
pub fn to_source_span(loc: SourceLocation) -> SourceSpan {
    SourceSpan::from(loc.offset..loc.offset)
}

/// Prints a CompileError with full miette diagnostics
///
/// This provides rich error formatting with source spans and context. Use
/// this for user-facing error display in the driver.
pub fn print_error(error: CompileError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
