//! Chunk - the unit of work for extraction.

use serde::{Deserialize, Serialize};

/// A bounded span of document text with page-range and section metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk within its document (0-based)
    pub index: usize,

    /// Chunk text
    pub text: String,

    /// Most recent heading, or a page label
    pub section: String,

    /// First page the chunk touches
    pub start_page: u32,

    /// Last page the chunk touches
    pub end_page: u32,

    /// Leading characters repeated from the previous chunk
    #[serde(default)]
    pub overlap: usize,
}

impl Chunk {
    /// Create a chunk with no carried overlap.
    pub fn new(
        index: usize,
        text: impl Into<String>,
        section: impl Into<String>,
        start_page: u32,
        end_page: u32,
    ) -> Self {
        Self {
            index,
            text: text.into(),
            section: section.into(),
            start_page,
            end_page,
            overlap: 0,
        }
    }

    /// Set the carried overlap length.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Chunk length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Text that is new in this chunk (without the carried overlap).
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None if self.overlap == 0 => &self.text,
            None => "",
        }
    }
}
