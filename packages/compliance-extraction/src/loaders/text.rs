//! Plain-text loader.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::traits::loader::DocumentLoader;
use crate::types::page::Page;

/// Page separator used by `pdftotext` and most text converters.
const FORM_FEED: char = '\u{0c}';

/// Extensions that need a real document parser.
const BINARY_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "xlsm", "ppt", "pptx"];

/// Loads UTF-8 text files, one page per form-feed separated section.
#[derive(Debug, Clone, Default)]
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if BINARY_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ExtractionError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExtractionError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let pages = split_pages(&text);
        debug!(path = %path.display(), pages = pages.len(), "Loaded text document");
        Ok(pages)
    }
}

/// Split text on form feeds into 1-based pages.
///
/// Blank pages keep their number so later page numbers stay aligned with
/// the source; the segmenter skips them.
pub fn split_pages(text: &str) -> Vec<Page> {
    let text = text.strip_suffix(FORM_FEED).unwrap_or(text);
    if text.trim().is_empty() {
        return Vec::new();
    }

    text.split(FORM_FEED)
        .enumerate()
        .map(|(i, body)| Page::new(i as u32 + 1, body.trim_end()))
        .collect()
}
