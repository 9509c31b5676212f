//! Transcript extraction for the dispatch backend.
//!
//! Sends a call transcript to a chat-completion model with a fixed,
//! scenario-specific instruction and returns the structured JSON object it
//! produces. Failures of any kind degrade to a default structure for the
//! scenario rather than an error, so a completed call always gets a result.

pub mod api_types;
pub mod config;
pub mod error;
pub mod extractor;
pub mod schema;

pub use config::ExtractionConfig;
pub use error::ExtractError;
pub use extractor::{parse_object, Extraction, OpenAiExtractor, TranscriptExtractor};
pub use schema::ExtractionSchema;
