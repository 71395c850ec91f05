//! Application layer for ragline
//!
//! This crate contains use cases, port definitions, and pipeline parameters.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{MAX_RETRIES_CAP, PipelineParams};
pub use ports::{
    language_provider::{Embedder, GenerateRequest, LanguageProvider, ModelRole, ProviderError},
    transcript_logger::{NoTranscriptLogger, TranscriptEvent, TranscriptLogger},
    vector_store::{SearchFilter, StoreError, VectorStore},
};
pub use use_cases::classify_intent::{IntentClassifier, SubQuestionSource};
pub use use_cases::dispatch::{DispatchError, DispatchOutcome, TaskDispatcher};
pub use use_cases::emitter::EventEmitter;
pub use use_cases::plan_query::QueryPlanner;
pub use use_cases::rag_search::{RagError, RagSearchExecutor};
pub use use_cases::request::RequestContext;
pub use use_cases::run_ask::{AskError, AskPipeline, HealthReport};
pub use use_cases::shared::{RetryPolicy, RetryableError, call_with_retry};
