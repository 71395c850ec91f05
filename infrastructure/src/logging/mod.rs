//! Logging infrastructure: structured request transcripts.
//!
//! Provides [`JsonlTranscriptLogger`], a JSONL file writer that implements
//! the [`TranscriptLogger`](ragline_application::TranscriptLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlTranscriptLogger;
