//! Mapping from file ids to file paths and contents.

use super::{FileId, Span};

/// A registered source file.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Path as given by the caller; used verbatim in diagnostics.
    pub path: String,
    /// Full UTF-8 contents.
    pub text: String,
}

/// Registry of the source files belonging to one compilation.
///
/// Files are assigned sequential [`FileId`]s in registration order, which
/// is also the order diagnostics are sorted by.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id.
    pub fn add_file(&mut self, path: impl Into<String>, text: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            path: path.into(),
            text: text.into(),
        });
        id
    }

    /// Look up a file by id.
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    /// Path of a file, or `"<unknown>"` for dummy/unregistered ids.
    pub fn path(&self, id: FileId) -> &str {
        self.file(id).map(|f| f.path.as_str()).unwrap_or("<unknown>")
    }

    /// Extract the text under a span, if the span is in range.
    pub fn snippet(&self, span: Span) -> Option<&str> {
        let file = self.file(span.file)?;
        file.text.get(span.start as usize..span.end as usize)
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if no file has been registered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
