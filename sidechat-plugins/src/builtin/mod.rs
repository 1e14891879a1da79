//! Builtin plugins: audio transcription, web search, document context.
//!
//! Each is a pure `process_request` transform behind an injected
//! collaborator trait, and each strips its trigger option after success so
//! the pipeline stays idempotent.

pub mod audio;
pub mod document;
pub mod search;

pub use audio::{AudioTranscriptionPlugin, Transcriber};
pub use document::{DocumentContextPlugin, DocumentFetcher};
pub use search::{SearchProvider, SearchResult, WebSearchPlugin};
