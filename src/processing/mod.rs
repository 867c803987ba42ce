//! # Processing Module
//!
//! Client-side preparation of uploads before they reach the inference client.

pub mod preprocess;

// Re-export commonly used types for convenience
pub use preprocess::{PreparedImage, PreprocessOptions, preprocess_bytes, preprocess_file};
