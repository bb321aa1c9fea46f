//! rscope_diagnostics: Diagnostic messages and error reporting infrastructure.
//!
//! Diagnostics describe problems in the user's source: syntax errors and
//! strict-mode violations found while parsing or binding. Defects in the
//! compiler itself are not diagnostics; those surface as typed errors from
//! the crate that detected them.

use rscope_core::text::TextSpan;
use std::fmt;

/// Diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Message,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Warning => write!(f, "warning"),
            DiagnosticCategory::Error => write!(f, "error"),
            DiagnosticCategory::Message => write!(f, "message"),
        }
    }
}

/// A diagnostic message template with a code and category.
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    /// May contain `{0}`, `{1}`, etc. placeholders.
    pub message: &'static str,
}

/// A realized diagnostic with location information and resolved message text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub span: Option<TextSpan>,
    pub message_text: String,
    pub code: u32,
    pub category: DiagnosticCategory,
}

impl Diagnostic {
    /// Create a new diagnostic without location info.
    pub fn new(message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            file: None,
            span: None,
            message_text: format_message(message.message, args),
            code: message.code,
            category: message.category,
        }
    }

    pub fn with_location(
        file: String,
        span: TextSpan,
        message: &DiagnosticMessage,
        args: &[&str],
    ) -> Self {
        Self {
            file: Some(file),
            span: Some(span),
            message_text: format_message(message.message, args),
            code: message.code,
            category: message.category,
        }
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}", file)?;
            if let Some(span) = self.span {
                write!(f, "({})", span.start)?;
            }
            write!(f, ": ")?;
        }
        write!(f, "{} RS{}: {}", self.category, self.code, self.message_text)
    }
}

/// Format a message template by replacing `{0}`, `{1}`, etc. with arguments.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", i), arg);
    }
    result
}

/// A collection of diagnostics accumulated during compilation.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// The first error, in source order once [`sort`](Self::sort) has run.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_error())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Attach a file name to every diagnostic that does not name one yet.
    pub fn attribute_to(&mut self, file: &str) {
        for diagnostic in &mut self.diagnostics {
            if diagnostic.file.as_deref().map_or(true, str::is_empty) {
                diagnostic.file = Some(file.to_string());
            }
        }
    }

    /// Sort diagnostics by file and position.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            let file_cmp = a.file.cmp(&b.file);
            if file_cmp != std::cmp::Ordering::Equal {
                return file_cmp;
            }
            let a_pos = a.span.map(|s| s.start).unwrap_or(0);
            let b_pos = b.span.map(|s| s.start).unwrap_or(0);
            a_pos.cmp(&b_pos)
        });
    }
}

// ============================================================================
// Diagnostic Messages
// ============================================================================

pub mod messages {
    use super::*;

    macro_rules! diag {
        ($code:expr, Error, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Error, message: $msg }
        };
        ($code:expr, Warning, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Warning, message: $msg }
        };
        ($code:expr, Message, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Message, message: $msg }
        };
    }

    // ========================================================================
    // Scanner errors (1000-1099)
    // ========================================================================
    pub const UNTERMINATED_STRING_LITERAL: DiagnosticMessage = diag!(1002, Error, "Unterminated string literal.");
    pub const IDENTIFIER_EXPECTED: DiagnosticMessage = diag!(1003, Error, "Identifier expected.");
    pub const _0_EXPECTED: DiagnosticMessage = diag!(1005, Error, "'{0}' expected.");
    pub const ASTERISK_SLASH_EXPECTED: DiagnosticMessage = diag!(1010, Error, "'*/' expected.");
    pub const UNEXPECTED_TOKEN: DiagnosticMessage = diag!(1012, Error, "Unexpected token.");
    pub const INVALID_CHARACTER: DiagnosticMessage = diag!(1027, Error, "Invalid character.");

    // ========================================================================
    // Parser and strict-mode errors (1100-1199)
    // ========================================================================
    pub const INVALID_USE_OF_0_IN_STRICT_MODE: DiagnosticMessage = diag!(1100, Error, "Invalid use of '{0}' in strict mode.");
    pub const DELETE_CANNOT_BE_CALLED_ON_AN_IDENTIFIER_IN_STRICT_MODE: DiagnosticMessage = diag!(1102, Error, "'delete' cannot be called on an identifier in strict mode.");
    pub const A_RETURN_STATEMENT_CAN_ONLY_BE_USED_WITHIN_A_FUNCTION_BODY: DiagnosticMessage = diag!(1108, Error, "A 'return' statement can only be used within a function body.");
    pub const EXPRESSION_EXPECTED: DiagnosticMessage = diag!(1109, Error, "Expression expected.");
    pub const DECLARATION_OR_STATEMENT_EXPECTED: DiagnosticMessage = diag!(1128, Error, "Declaration or statement expected.");
    pub const CATCH_OR_FINALLY_EXPECTED: DiagnosticMessage = diag!(1472, Error, "'catch' or 'finally' expected.");

    // ========================================================================
    // Binding errors (2300-2399)
    // ========================================================================
    pub const DUPLICATE_PARAMETER_0_IN_STRICT_MODE: DiagnosticMessage = diag!(2300, Error, "Duplicate parameter '{0}' in strict mode.");
    pub const INVALID_ASSIGNMENT_TARGET: DiagnosticMessage = diag!(2364, Error, "The left-hand side of an assignment expression must be a variable.");

    // ========================================================================
    // Scope reports (6000-6099)
    // ========================================================================
    pub const REFERENCE_TO_0_RESOLVED_DYNAMICALLY: DiagnosticMessage = diag!(6001, Message, "Reference to '{0}' is resolved by name at run time.");
    pub const DIRECT_EVAL_IN_0_MAY_DECLARE_VARIABLES: DiagnosticMessage = diag!(6002, Message, "Direct eval in '{0}' may declare variables in its scope; names not declared there are resolved by name.");
    pub const STRICT_DIRECT_EVAL_IN_0_USES_A_SEPARATE_SCOPE: DiagnosticMessage = diag!(6003, Message, "Strict direct eval in '{0}' declares its variables in a separate extensible scope.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        let result = format_message("'{0}' expected.", &[")"]);
        assert_eq!(result, "')' expected.");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::with_location(
            "main.js".to_string(),
            TextSpan::new(10, 5),
            &messages::INVALID_USE_OF_0_IN_STRICT_MODE,
            &["eval"],
        );
        let display = format!("{}", diag);
        assert!(display.contains("main.js(10)"));
        assert!(display.contains("RS1100"));
        assert!(display.contains("'eval'"));
    }

    #[test]
    fn test_diagnostic_collection() {
        let mut collection = DiagnosticCollection::new();
        assert!(collection.is_empty());

        collection.add(Diagnostic::new(&messages::REFERENCE_TO_0_RESOLVED_DYNAMICALLY, &["x"]));
        assert!(!collection.has_errors());

        collection.add(Diagnostic::new(&messages::UNEXPECTED_TOKEN, &[]));
        assert!(collection.has_errors());
        assert_eq!(collection.error_count(), 1);
        assert_eq!(collection.first_error().map(|d| d.code), Some(1012));
    }

    #[test]
    fn test_diagnostic_collection_sort() {
        let mut collection = DiagnosticCollection::new();
        collection.add(Diagnostic::with_location(
            "b.js".to_string(),
            TextSpan::new(10, 1),
            &messages::UNEXPECTED_TOKEN,
            &[],
        ));
        collection.add(Diagnostic::with_location(
            "a.js".to_string(),
            TextSpan::new(5, 1),
            &messages::IDENTIFIER_EXPECTED,
            &[],
        ));
        collection.sort();
        assert_eq!(collection.diagnostics()[0].file.as_deref(), Some("a.js"));
        assert_eq!(collection.diagnostics()[1].file.as_deref(), Some("b.js"));
    }
}
