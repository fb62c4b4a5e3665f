//! Diagnostic infrastructure for the Reed compiler.
//!
//! This crate provides structured error reporting with:
//! - Source location tracking (file, line, column)
//! - Diagnostic types with stable error codes
//! - Text and JSON output formats

pub mod diagnostic;
pub mod emitter;
pub mod source_map;
pub mod span;

// Re-export commonly used types
pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Diagnostics, Severity};
pub use emitter::{DiagnosticEmitter, JsonEmitter, TextEmitter};
pub use source_map::{SourceFile, SourceMap};
pub use span::{FileId, Location, Span};
