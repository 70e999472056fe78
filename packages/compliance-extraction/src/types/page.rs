//! Page types - loader output.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One page of extracted document text.
///
/// Page numbers are 1-based and ordered but not necessarily contiguous
/// (a loader may skip blank or unreadable pages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page number as printed by the loader
    pub number: u32,

    /// Page text
    pub text: String,
}

impl Page {
    /// Create a new page.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Whether the page holds no visible text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A loaded document: a display name plus its pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Name used in citations (usually the file name)
    pub name: String,

    /// Pages in page-number order
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new document.
    pub fn new(name: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    /// Build a document from raw page texts, numbering from 1.
    pub fn from_texts(name: impl Into<String>, texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page::new(i as u32 + 1, text))
            .collect();
        Self::new(name, pages)
    }

    /// Citation name for a path: the file name, or the full path if it has none.
    pub fn name_for(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    /// Total characters across all pages.
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}
