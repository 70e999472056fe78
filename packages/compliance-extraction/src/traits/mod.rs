//! Core trait abstractions for the extraction library.
//!
//! These traits define the collaborator boundaries that applications
//! implement: a completion service for LLM stages and a document loader.

pub mod completion;
pub mod loader;
