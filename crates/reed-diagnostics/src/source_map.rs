//! Source file registry for diagnostic rendering.

use crate::span::{FileId, Location, Span};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A registered source file with line information.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Unique identifier
    pub id: FileId,
    /// File path
    pub path: PathBuf,
    /// Source code content
    pub source: String,
    /// Byte offsets where each line starts
    line_starts: Vec<u32>,
}

impl SourceFile {
    fn new(id: FileId, path: PathBuf, source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            id,
            path,
            source,
            line_starts,
        }
    }

    /// Get the line and column for a byte offset (both 1-indexed).
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.source.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        ((line_idx + 1) as u32, (offset - line_start + 1).max(1))
    }
}

fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut starts = vec![0];
    for (i, c) in source.char_indices() {
        if c == '\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

/// Registry of source files, used to resolve spans when rendering.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: HashMap<FileId, SourceFile>,
    path_to_id: HashMap<PathBuf, FileId>,
    next_id: u32,
}

impl SourceMap {
    /// Create a new empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, returning its FileId.
    /// If the file was already added, returns the existing FileId.
    pub fn add_file(&mut self, path: impl AsRef<Path>, source: String) -> FileId {
        let path = path.as_ref().to_path_buf();
        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.files.insert(id, SourceFile::new(id, path.clone(), source));
        self.path_to_id.insert(path, id);
        id
    }

    /// Look up a registered file.
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(&id)
    }

    /// Resolve a span to a file/line/column location.
    pub fn location(&self, span: Span) -> Option<Location> {
        let file = self.get_file(span.file_id)?;
        let (line, column) = file.line_column(span.start);
        Some(Location {
            file: file.path.display().to_string(),
            line,
            column,
        })
    }
}
