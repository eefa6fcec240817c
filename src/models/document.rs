use std::path::{Path, PathBuf};

use crate::utils::file::normalized_extension;

/// Supported kinds of source documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Paged binary document, extracted page by page
    Pdf,
    /// Plain UTF-8 text
    Text,
    /// Markdown, read as plain UTF-8 text
    Markdown,
}

impl DocumentKind {
    /// Map a lower-cased extension (without dot) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            "md" => Some(DocumentKind::Markdown),
            _ => None,
        }
    }
}

/// A document discovered in the data directory. Its ledger identifier is the
/// base name of `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

impl SourceFile {
    /// Returns `None` when the extension is not supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let kind = normalized_extension(path)
            .as_deref()
            .and_then(DocumentKind::from_extension)?;
        Some(Self {
            path: path.to_path_buf(),
            kind,
        })
    }
}

/// A token-bounded slice of one document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Identifier of the originating file
    pub file_id: String,
    /// 0-based position within the file
    pub index: usize,
    pub text: String,
    pub token_count: usize,
}
