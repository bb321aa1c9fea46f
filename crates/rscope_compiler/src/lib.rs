//! rscope_compiler: Compiler orchestration.
//!
//! Runs parse -> bind -> emit for one script or one piece of eval code and
//! hands back the root [`FunctionCode`] together with the binder's scope
//! report. The interner lives here so the runtime can compile eval code
//! against the same name keys as the script that calls it.

use bumpalo::Bump;
use rscope_binder::{BindResult, Binder, ScopeError, ScopeLimits};
use rscope_core::intern::StringInterner;
use rscope_diagnostics::{Diagnostic, DiagnosticCollection};
use rscope_emitter::{EmitError, Emitter, FunctionCode};
use rscope_options::CompilerOptions;
use rscope_parser::Parser;
use std::rc::Rc;

/// File name given to code compiled by `eval`.
pub const EVAL_FILE_NAME: &str = "<eval>";

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// The first syntax or early error in the source.
    #[error("{0}")]
    Syntax(Diagnostic),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// One compiled script or eval program.
#[derive(Debug)]
pub struct CompiledProgram {
    pub code: Rc<FunctionCode>,
    pub bind: BindResult,
    /// Non-error diagnostics from parsing and binding, sorted by position.
    pub diagnostics: DiagnosticCollection,
}

pub struct Compiler {
    interner: StringInterner,
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_interner(StringInterner::new(), options)
    }

    /// A compiler that interns into an existing table.
    pub fn with_interner(interner: StringInterner, options: CompilerOptions) -> Self {
        Self { interner, options }
    }

    #[inline]
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    #[inline]
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Scope limits derived from the options.
    pub fn limits(&self) -> ScopeLimits {
        ScopeLimits {
            growth_slack: self
                .options
                .growth_slack
                .unwrap_or(ScopeLimits::DEFAULT_GROWTH_SLACK),
            max_depth: self
                .options
                .max_scope_depth
                .unwrap_or(ScopeLimits::DEFAULT_MAX_DEPTH),
        }
    }

    /// Compile a top-level script. Its declarations become globals.
    #[tracing::instrument(level = "debug", skip(self, source), fields(len = source.len()))]
    pub fn compile_script(&self, file_name: &str, source: &str) -> Result<CompiledProgram, CompileError> {
        self.compile(file_name, source, self.options.is_strict(), false)
    }

    /// Compile code passed to a direct `eval`. Strict callers produce strict
    /// eval code.
    #[tracing::instrument(level = "debug", skip(self, source), fields(len = source.len()))]
    pub fn compile_eval(&self, source: &str, strict: bool) -> Result<CompiledProgram, CompileError> {
        self.compile(EVAL_FILE_NAME, source, strict || self.options.is_strict(), true)
    }

    fn compile(
        &self,
        file_name: &str,
        source: &str,
        strict: bool,
        eval: bool,
    ) -> Result<CompiledProgram, CompileError> {
        let arena = Bump::new();
        let parsed = Parser::new(&arena, file_name, source, &self.interner)
            .with_strict(strict)
            .parse_program();
        if let Some(error) = parsed.diagnostics.first_error() {
            tracing::debug!(
                file = file_name,
                errors = parsed.diagnostics.error_count(),
                "syntax errors"
            );
            return Err(CompileError::Syntax(error.clone()));
        }

        let binder = Binder::new(&self.interner).with_limits(self.limits());
        let mut bind = if eval {
            binder.bind_eval(&parsed.program)?
        } else {
            binder.bind_script(&parsed.program)?
        };
        let code = Emitter::new(&bind, &self.interner).emit_program(&parsed.program)?;

        let mut diagnostics = parsed.diagnostics;
        diagnostics.extend(std::mem::take(&mut bind.diagnostics));
        diagnostics.sort();
        tracing::debug!(
            nodes = parsed.node_count,
            scopes = bind.scopes.len(),
            diagnostics = diagnostics.len(),
            "compiled"
        );

        Ok(CompiledProgram {
            code,
            bind,
            diagnostics,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}
