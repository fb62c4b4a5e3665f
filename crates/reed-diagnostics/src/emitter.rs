//! Diagnostic emitters for different output formats.

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::source_map::SourceMap;
use serde_json::json;
use std::io::Write;

/// Trait for emitting diagnostics in various formats.
pub trait DiagnosticEmitter {
    /// Emit a single diagnostic.
    fn emit(&mut self, diagnostic: &Diagnostic, map: &SourceMap) -> std::io::Result<()>;

    /// Emit multiple diagnostics.
    fn emit_all(&mut self, diagnostics: &Diagnostics, map: &SourceMap) -> std::io::Result<()> {
        for diag in diagnostics.iter() {
            self.emit(diag, map)?;
        }
        Ok(())
    }
}

/// Plain text output: one header line plus location, help, and notes.
pub struct TextEmitter<W: Write> {
    writer: W,
}

impl<W: Write> TextEmitter<W> {
    /// Create a new text emitter.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for TextEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, map: &SourceMap) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{}[{}]: {}",
            diagnostic.severity.as_str(),
            diagnostic.code.as_str(),
            diagnostic.message
        )?;
        if let Some(loc) = map.location(diagnostic.span) {
            writeln!(self.writer, "  --> {}", loc)?;
        }
        if let Some(help) = &diagnostic.help {
            writeln!(self.writer, "  help: {}", help)?;
        }
        for note in &diagnostic.notes {
            writeln!(self.writer, "  note: {}", note)?;
        }
        Ok(())
    }
}

/// Machine-readable JSON output, one object per line.
pub struct JsonEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonEmitter<W> {
    /// Create a new JSON emitter.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for JsonEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, map: &SourceMap) -> std::io::Result<()> {
        let location = map.location(diagnostic.span).map(|loc| {
            json!({ "file": loc.file, "line": loc.line, "column": loc.column })
        });
        let value = json!({
            "code": diagnostic.code.as_str(),
            "severity": diagnostic.severity.as_str(),
            "message": diagnostic.message,
            "location": location,
            "help": diagnostic.help,
            "notes": diagnostic.notes,
        });
        writeln!(self.writer, "{}", value)
    }
}
