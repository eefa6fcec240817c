//! Document-to-text extraction.

use std::path::Path;

use crate::error::ExtractError;
use crate::models::{DocumentKind, SourceFile};
use crate::utils::file::normalized_extension;

/// Capability that turns a supported file into raw text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Extracts text from PDF, plain text and markdown files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read_text(path: &Path) -> Result<String, ExtractError> {
        std::fs::read_to_string(path).map_err(|source| ExtractError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Concatenate page texts in page order. A page that fails to yield text
    /// contributes nothing; only a document that cannot be loaded is an error.
    fn read_pdf(path: &Path) -> Result<String, ExtractError> {
        let document = lopdf::Document::load(path).map_err(|e| ExtractError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut text = String::new();
        for page_number in document.get_pages().into_keys() {
            match document.extract_text(&[page_number]) {
                Ok(page_text) => text.push_str(&page_text),
                Err(e) => {
                    tracing::debug!(
                        "no text on page {page_number} of {}: {e}",
                        path.display()
                    );
                }
            }
        }

        Ok(text)
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let Some(file) = SourceFile::from_path(path) else {
            return Err(ExtractError::Unsupported {
                path: path.to_path_buf(),
                extension: normalized_extension(path)
                    .map(|ext| format!(".{ext}"))
                    .unwrap_or_default(),
            });
        };

        match file.kind {
            DocumentKind::Pdf => Self::read_pdf(&file.path),
            DocumentKind::Text | DocumentKind::Markdown => Self::read_text(&file.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a one-page PDF whose page draws `text` in Helvetica.
    fn make_test_pdf(text: &str) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Plain text body.\nSecond line.").unwrap();

        let text = DocumentExtractor::new().extract(&path).unwrap();
        assert_eq!(text, "Plain text body.\nSecond line.");
    }

    #[test]
    fn test_extract_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README.MD");
        std::fs::write(&path, "# Title\n\nBody").unwrap();

        let text = DocumentExtractor::new().extract(&path).unwrap();
        assert_eq!(text, "# Title\n\nBody");
    }

    #[test]
    fn test_extract_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        std::fs::write(&path, make_test_pdf("Hello World")).unwrap();

        let text = DocumentExtractor::new().extract(&path).unwrap();
        assert!(
            text.contains("Hello") || text.contains("World"),
            "unexpected PDF text: {text:?}"
        );
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let result = DocumentExtractor::new().extract(&path);
        assert!(matches!(result, Err(ExtractError::Pdf { .. })));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = DocumentExtractor::new().extract(Path::new("/tmp/slides.pptx"));
        match result {
            Err(ExtractError::Unsupported { extension, .. }) => assert_eq!(extension, ".pptx"),
            other => panic!("expected unsupported error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_text_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DocumentExtractor::new().extract(&dir.path().join("gone.txt"));
        assert!(matches!(result, Err(ExtractError::Read { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();

        let result = DocumentExtractor::new().extract(&path);
        assert!(matches!(result, Err(ExtractError::Read { .. })));
    }
}
