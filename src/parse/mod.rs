pub mod doc_parser;
pub mod doc_serializer;

pub use doc_parser::{parse_document, parse_document_with_dropped};
pub use doc_serializer::serialize_document;

/// Top-level title written at the head of every serialized file.
pub const TITLE_LINE: &str = "# Tasks";
