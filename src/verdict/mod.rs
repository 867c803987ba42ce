//! # Verdict Module
//!
//! The structured result the model returns, the schema that constrains it, and
//! the decoder that assembles it from streamed text.

pub mod partial;
pub mod schema;
pub mod types;

pub use partial::PartialObjectDecoder;
pub use schema::{response_format, response_schema};
pub use types::{PartialVerdict, Rating, Verdict, VerdictKind};
