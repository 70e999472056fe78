//! Data types for the extraction pipeline.

pub mod chunk;
pub mod config;
pub mod hit;
pub mod page;
pub mod requirement;
