//! Mock loader for testing.
//!
//! Provides canned documents and failing paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{ExtractionError, Result};
use crate::traits::loader::DocumentLoader;
use crate::types::page::Page;

/// Mock loader for testing.
///
/// # Example
///
/// ```rust
/// use compliance_extraction::loaders::MockLoader;
///
/// let loader = MockLoader::new()
///     .with_document("rfp.txt", ["Offerors shall submit via SAM.gov."])
///     .with_failure("scan.pdf", "OCR failed");
/// ```
#[derive(Default, Clone)]
pub struct MockLoader {
    documents: Arc<RwLock<HashMap<PathBuf, Vec<Page>>>>,
    failures: Arc<RwLock<HashMap<PathBuf, String>>>,
    calls: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve these page texts (numbered from 1) for `path`.
    pub fn with_document(
        self,
        path: impl Into<PathBuf>,
        pages: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page::new(i as u32 + 1, text))
            .collect();
        self.documents.write().unwrap().insert(path.into(), pages);
        self
    }

    /// Fail loading `path` with `reason`.
    pub fn with_failure(self, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(path.into(), reason.into());
        self
    }

    /// Paths that were requested, in order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl DocumentLoader for MockLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        self.calls.write().unwrap().push(path.to_path_buf());

        if let Some(reason) = self.failures.read().unwrap().get(path) {
            return Err(ExtractionError::Load {
                path: path.to_path_buf(),
                reason: reason.clone(),
            });
        }

        self.documents
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ExtractionError::Load {
                path: path.to_path_buf(),
                reason: "no such mock document".into(),
            })
    }
}
