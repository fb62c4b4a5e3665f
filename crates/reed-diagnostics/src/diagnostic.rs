//! Diagnostic types for compiler errors and warnings.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational hint
    Hint,
    /// Warning (compiles but may cause issues)
    Warning,
    /// Error (blocks compilation)
    Error,
}

impl Severity {
    /// Get the string representation for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Hint => "hint",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Resolution errors (R001-R099)
    /// Label reference that resolves to no enclosing construct
    UnresolvedLabel,
    /// Undefined variable reference
    UndefinedVariable,

    // Lowering errors (L001-L099)
    /// Iterated expression is not an iterator function
    NotAnIterator,
    /// Loop binding count disagrees with the callback signature
    LoopBindingArity,

    // Internal errors (I001-I099)
    /// Internal compiler error
    InternalError,
}

impl DiagnosticCode {
    /// Get the error code string (e.g., "R001").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedLabel => "R001",
            Self::UndefinedVariable => "R002",
            Self::NotAnIterator => "L001",
            Self::LoopBindingArity => "L002",
            Self::InternalError => "I001",
        }
    }

    /// Get the default severity for this error code.
    pub fn default_severity(&self) -> Severity {
        // Every code the compiler currently emits blocks compilation.
        Severity::Error
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Unique error code
    pub code: DiagnosticCode,
    /// Severity level
    pub severity: Severity,
    /// Short message (single line)
    pub message: String,
    /// Primary span (where the error is)
    pub span: Span,
    /// Optional help text
    pub help: Option<String>,
    /// Additional notes
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Warning, message)
    }

    /// Create a diagnostic with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, code.default_severity(), message)
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Builder for constructing diagnostics fluently.
pub struct DiagnosticBuilder {
    inner: Diagnostic,
}

impl DiagnosticBuilder {
    /// Create a new diagnostic builder.
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: Diagnostic {
                code,
                severity,
                message: message.into(),
                span: Span::DUMMY,
                help: None,
                notes: Vec::new(),
            },
        }
    }

    /// Set the primary span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.inner.span = span;
        self
    }

    /// Attach help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.help = Some(help.into());
        self
    }

    /// Attach an additional note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> Diagnostic {
        self.inner
    }
}

/// A collection of diagnostics gathered during a compilation stage.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Iterate over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of diagnostics collected.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if any collected diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.is_error())
    }
}
