//! Source location types
//!
//! Positions arrive from the external frontend; the analyzer only carries
//! them through to diagnostics and facts. A position may be absent (synthetic
//! nodes created by the preprocessor have none) and then renders as
//! `<no pos info>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a file within a [`FileSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// File names for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSet {
    names: Vec<String>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>) -> FileId {
        let id = FileId(self.names.len() as u32);
        self.names.push(name.into());
        id
    }

    pub fn name(&self, id: FileId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (FileId(i as u32), n.as_str()))
    }
}

/// Span in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Zero span (0:0-0:0)
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero()
    }
}

/// A resolved position: file plus starting line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(file: FileId, line: u32, col: u32) -> Self {
        Self { file, line, col }
    }

    /// Render as `file:line:col`, optionally stripping directories.
    pub fn render(&self, files: &FileSet, full_path: bool) -> String {
        let name = files.name(self.file);
        let name = if full_path {
            name
        } else {
            name.rsplit('/').next().unwrap_or(name)
        };
        format!("{}:{}:{}", name, self.line, self.col)
    }

    pub fn to_fact(&self, files: &FileSet) -> nilscan_facts::FactPos {
        nilscan_facts::FactPos {
            file: files.name(self.file).to_string(),
            line: self.line,
            col: self.col,
        }
    }
}

/// Rendering for a position that may be missing.
pub fn render_opt(pos: Option<Pos>, files: &FileSet, full_path: bool) -> String {
    match pos {
        Some(p) => p.render(files, full_path),
        None => "<no pos info>".to_string(),
    }
}

// Display without a FileSet falls back to the raw file index.
impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}:{}:{}", self.file.0, self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_set() {
        let mut files = FileSet::new();
        let a = files.add("pkg/a.go");
        let b = files.add("pkg/b.go");
        assert_eq!(files.name(a), "pkg/a.go");
        assert_eq!(files.name(b), "pkg/b.go");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_span_contains_line() {
        let span = Span::new(10, 0, 20, 0);
        assert!(span.contains_line(10));
        assert!(span.contains_line(20));
        assert!(!span.contains_line(21));
    }

    #[test]
    fn test_pos_render() {
        let mut files = FileSet::new();
        let f = files.add("example.com/pkg/main.go");
        let pos = Pos::new(f, 12, 3);
        assert_eq!(pos.render(&files, false), "main.go:12:3");
        assert_eq!(pos.render(&files, true), "example.com/pkg/main.go:12:3");
    }

    #[test]
    fn test_render_missing_pos() {
        let files = FileSet::new();
        assert_eq!(render_opt(None, &files, false), "<no pos info>");
    }
}
