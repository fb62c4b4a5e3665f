//! Translation faults raised by the push-iteration pass.
//!
//! Every fault here means the input was not something the pass can
//! rewrite: either resolution left a dangling label, or the type side
//! table disagrees with the loop shape. The pass collects faults and
//! keeps going so a single run reports everything it can.

use reed_diagnostics::{Diagnostic, DiagnosticCode, Span};
use reed_types::LabelId;
use thiserror::Error;

/// A condition that prevents rewriting a push-style loop.
#[derive(Debug, Clone, Error)]
pub enum TranslationFault {
    /// A `break`, `continue` or `goto` names a label with no resolvable
    /// target in scope of the statement.
    #[error("unresolved label {label} in function `{function}`")]
    UnresolvedLabel {
        function: String,
        label: LabelId,
        span: Span,
    },

    /// The iterated expression of a push-style loop is typed as something
    /// other than `func(func(T...) bool)`.
    #[error("iterated expression in function `{function}` is not an iterator function")]
    NotAnIterator { function: String, span: Span },

    /// Loop binding count disagrees with the callback parameter count the
    /// type table recorded for the iterated expression.
    #[error(
        "push-style loop in function `{function}` binds {found} values \
         but its iterator yields {expected}"
    )]
    LoopBindingArity {
        function: String,
        expected: usize,
        found: usize,
        span: Span,
    },
}

impl TranslationFault {
    /// The source position the fault should be reported at.
    pub fn span(&self) -> Span {
        match self {
            Self::UnresolvedLabel { span, .. }
            | Self::NotAnIterator { span, .. }
            | Self::LoopBindingArity { span, .. } => *span,
        }
    }

    /// Render the fault as a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::UnresolvedLabel { .. } => {
                Diagnostic::error(DiagnosticCode::UnresolvedLabel, self.to_string())
                    .with_span(self.span())
                    .with_help("labels must name an enclosing loop or a label marker in scope")
                    .build()
            }
            Self::NotAnIterator { .. } => {
                Diagnostic::error(DiagnosticCode::NotAnIterator, self.to_string())
                    .with_span(self.span())
                    .with_help("a push-style loop iterates a value of type `func(func(T...) bool)`")
                    .build()
            }
            Self::LoopBindingArity {
                expected, found, ..
            } => Diagnostic::error(DiagnosticCode::LoopBindingArity, self.to_string())
                .with_span(self.span())
                .with_note(format!("expected {expected} bindings, found {found}"))
                .build(),
        }
    }
}
