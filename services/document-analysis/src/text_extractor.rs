//! Text Extractor
//!
//! Pulls plain text out of uploaded documents.

use lexbid_models::FileKind;
use lexbid_utils::{LexbidError, LexbidResult};
use std::sync::Arc;

/// Extracted document text
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub char_count: usize,
}

impl ExtractedText {
    fn new(text: String) -> Self {
        let text = text.trim().to_string();
        let char_count = text.chars().count();
        Self { text, char_count }
    }

    pub fn is_empty(&self) -> bool {
        self.char_count == 0
    }
}

/// Text extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Text for PDFs and text files; images have none without OCR.
    pub fn extract(&self, kind: FileKind, data: &[u8]) -> LexbidResult<Option<ExtractedText>> {
        match kind {
            FileKind::Pdf => {
                let text = pdf_extract::extract_text_from_mem(data).map_err(|e| {
                    LexbidError::document_processing(format!("Failed to extract text from PDF: {}", e))
                })?;
                Ok(Some(ExtractedText::new(text)))
            }
            FileKind::Text => Ok(Some(ExtractedText::new(String::from_utf8_lossy(data).into_owned()))),
            FileKind::Image | FileKind::Unsupported => Ok(None),
        }
    }

    /// `extract` on the blocking pool; PDF parsing is CPU bound.
    pub async fn extract_blocking(&self, kind: FileKind, data: Arc<Vec<u8>>) -> LexbidResult<Option<ExtractedText>> {
        let extractor = *self;
        tokio::task::spawn_blocking(move || extractor.extract(kind, &data))
            .await
            .map_err(|e| LexbidError::internal(format!("Text extraction task failed: {}", e)))?
    }
}
