//! Document loader trait.
//!
//! Turning PDF/Word/Excel files into paginated text (including OCR for
//! scanned forms) happens outside the pipeline. A loader only has to hand
//! back `(page_number, text)` pairs.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::page::{Document, Page};

/// Loads one document into pages.
///
/// Any error returned here is fatal for that document only; sibling
/// documents in the same run keep processing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the pages of the document at `path`.
    async fn load(&self, path: &Path) -> Result<Vec<Page>>;

    /// Load and wrap in a [`Document`] named after the file.
    async fn load_document(&self, path: &Path) -> Result<Document> {
        let pages = self.load(path).await?;
        Ok(Document::new(Document::name_for(path), pages))
    }
}
