//! Document loader implementations.
//!
//! # Available Loaders
//!
//! - `TextLoader` - UTF-8 text with form-feed page breaks (`pdftotext` output)
//! - `MockLoader` - For testing
//!
//! Binary formats (PDF, Word, Excel) and OCR are handled upstream; convert
//! them to text first.
//!
//! # Example
//!
//! ```rust,ignore
//! use compliance_extraction::loaders::TextLoader;
//!
//! let report = pipeline.run(&TextLoader::new(), &paths).await;
//! ```

mod mock;
mod text;

pub use mock::MockLoader;
pub use text::{split_pages, TextLoader};

// Re-export from traits for convenience
pub use crate::traits::loader::DocumentLoader;
