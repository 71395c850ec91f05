//! Domain layer for ragline
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Pipeline
//!
//! A question flows through four stages:
//!
//! - **Classification**: [`Classification`] of the question's intent
//! - **Planning**: an [`ExecutionPlan`] of dependent steps
//! - **Resolution / retrieval**: [`StructuredResolver`] for table lookups,
//!   [`build_context`] for document search
//! - **Validation**: [`ResponseValidator`] scores a [`StepResult`] and decides
//!   whether to accept, retry or ask the user to clarify
//!
//! ## Determinism
//!
//! Everything in this crate is synchronous and deterministic. Reference data
//! ([`DatasetSnapshot`], [`RegionTable`]) is immutable once built.

pub mod config;
pub mod core;
pub mod event;
pub mod intent;
pub mod lookup;
pub mod plan;
pub mod prompt;
pub mod retrieval;
pub mod validation;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use core::{error::DomainError, question::Question};
pub use event::{AnswerCitation, AnswerMetadata, EventType, FinalAnswer, PipelineEvent};
pub use intent::{Classification, EntityType, IntentType, parse_classification, parse_sub_questions};
pub use lookup::{
    AliasMap, DatasetRecord, DatasetSnapshot, LookupCandidate, LookupFailure, LookupResult,
    MatchType, NormalizedQuery, RegionTable, ResolverConfig, StructuredResolver, normalize,
};
pub use plan::{ExecutionPlan, PlanStep, StepId, StepTarget, Strategy};
pub use prompt::PromptTemplate;
pub use retrieval::{
    AssembledContext, Citation, ContextBudget, RetrievedChunk, build_context, estimate_tokens,
};
pub use validation::{
    Clarification, Decision, ResponseValidator, ScoreBreakdown, StepPayload, StepResult,
    ValidationPolicy, ValidationResult,
};
