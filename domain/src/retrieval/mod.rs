//! Retrieval types and context assembly for the RAG path.

pub mod citation;
pub mod context;

pub use citation::Citation;
pub use context::{AssembledContext, ContextBudget, RetrievedChunk, build_context, estimate_tokens};
