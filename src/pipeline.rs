//! The front-end pipeline: source text → preprocessed text → token stream
//! → AST → validated AST → IR module.
//!
//! Each stage fully consumes its input before the next stage starts, and a
//! stage that recorded any error refuses to hand its output onward. Stage
//! diagnostics are rendered to stderr against the preprocessed buffer
//! (whose line numbers are authoritative once macros have run); the caller
//! receives a gate error with the count.

use std::path::PathBuf;

use tracing::debug;

use crate::diagnostics::{Diagnostics, Level};
use crate::errors::{to_source_span, unspanned, CompileError, ErrorKind};
use crate::ir::{lower::lower, ModuleIr};
use crate::preprocessor::Preprocessor;
use crate::sema::Sema;
use crate::source::SourceContext;
use crate::syntax::{Lexer, Parser, TranslationUnit};

#[derive(Debug, Default)]
pub struct CompilePipeline {
    pub include_paths: Vec<PathBuf>,
    pub system_include_paths: Vec<PathBuf>,
}

impl CompilePipeline {
    pub fn new(include_paths: Vec<PathBuf>, system_include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            system_include_paths,
        }
    }

    /// Run only the preprocessor.
    pub fn preprocess(&self, path: &str, source: &str) -> Result<String, CompileError> {
        let mut pp = Preprocessor::new(
            self.include_paths.clone(),
            self.system_include_paths.clone(),
        );
        pp.run(path, source)
    }

    /// Compile one source file down to an IR module.
    pub fn compile(&self, path: &str, source: &str) -> Result<ModuleIr, CompileError> {
        let preprocessed = self.preprocess(path, source)?;
        debug!(path, bytes = preprocessed.len(), "preprocessed");

        let mut diags = Diagnostics::new();
        let tu = match self.parse(&preprocessed, &mut diags) {
            Some(tu) if !diags.has_error() => tu,
            _ => {
                diags.print_all(path, &preprocessed);
                return Err(self.gate_error(
                    path,
                    &preprocessed,
                    &diags,
                    ErrorKind::SyntaxErrors {
                        count: diags.error_count(),
                    },
                ));
            }
        };
        debug!(path, func = %tu.func_name, "parsed");

        Sema::new(&mut diags).run(&tu);
        if diags.has_error() {
            diags.print_all(path, &preprocessed);
            return Err(self.gate_error(
                path,
                &preprocessed,
                &diags,
                ErrorKind::SemanticErrors {
                    count: diags.error_count(),
                },
            ));
        }
        debug!(path, "checked");

        let module = lower(&tu, path);
        debug!(path, blocks = module.functions[0].blocks().count(), "lowered");
        Ok(module)
    }

    fn parse(&self, preprocessed: &str, diags: &mut Diagnostics) -> Option<TranslationUnit> {
        Parser::new(Lexer::new(preprocessed), diags).parse()
    }

    /// A stage gate anchored at the first error, so the report points into
    /// the preprocessed buffer even though the details already went out.
    fn gate_error(
        &self,
        path: &str,
        preprocessed: &str,
        diags: &Diagnostics,
        kind: ErrorKind,
    ) -> CompileError {
        let ctx = SourceContext::from_file(path, preprocessed);
        let span = diags
            .iter()
            .find(|d| d.level == Level::Error)
            .map(|d| to_source_span(d.loc))
            .unwrap_or_else(unspanned);
        CompileError::new(kind, "compile", &ctx, span)
    }
}
