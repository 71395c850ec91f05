//! RAG search executor.
//!
//! Embedding, search and generation are delegated to the ports; only the
//! context assembly between them happens here (see
//! [`ragline_domain::build_context`]).

use crate::config::PipelineParams;
use crate::ports::language_provider::{Embedder, GenerateRequest, LanguageProvider, ProviderError};
use crate::ports::vector_store::{SearchFilter, StoreError, VectorStore};
use crate::use_cases::shared::{RetryPolicy, call_with_retry};
use ragline_domain::{
    AssembledContext, ContextBudget, PromptTemplate, RetrievedChunk, StepResult, build_context,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl RagError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RagError::Provider(ProviderError::Cancelled) | RagError::Store(StoreError::Cancelled)
        )
    }
}

#[derive(Clone)]
pub struct RagSearchExecutor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LanguageProvider>,
    budget: ContextBudget,
    retry: RetryPolicy,
}

impl RagSearchExecutor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LanguageProvider>,
        params: &PipelineParams,
    ) -> Self {
        Self {
            embedder,
            store,
            provider,
            budget: params.context_budget(),
            retry: params.retry_policy(),
        }
    }

    /// Ranked chunks for `query`, best first.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let vector = call_with_retry(&self.retry, cancel, "embedding", || {
            self.embedder.embed(query)
        })
        .await?;
        let chunks = call_with_retry(&self.retry, cancel, "vector search", || {
            self.store.search(&vector, filter, top_k)
        })
        .await?;
        debug!("Search returned {} chunk(s) for top_k={}", chunks.len(), top_k);
        Ok(chunks)
    }

    pub fn build_context(&self, chunks: &[RetrievedChunk]) -> AssembledContext {
        build_context(chunks, &self.budget)
    }

    pub async fn generate(
        &self,
        query: &str,
        context: &AssembledContext,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest::text(PromptTemplate::rag_answer(query, &context.text));
        call_with_retry(&self.retry, cancel, "generation", || {
            self.provider.generate(&request)
        })
        .await
    }

    /// Search, assemble and generate; failures become a failed step.
    ///
    /// `prior` holds answers of earlier steps this one depends on; they are
    /// appended to the retrieved context.
    pub async fn run(
        &self,
        query: &str,
        top_k: usize,
        prior: &[String],
        cancel: &CancellationToken,
    ) -> StepResult {
        let chunks = match self.search(query, top_k, &SearchFilter::default(), cancel).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Search failed: {}", e);
                return StepResult::failure(format!("search failed: {}", e));
            }
        };
        if chunks.is_empty() && prior.is_empty() {
            return StepResult::failure("no documents matched the question").with_parameter("topic");
        }

        let mut context = self.build_context(&chunks);
        if !prior.is_empty() {
            let notes = prior
                .iter()
                .map(|p| format!("- {}", p))
                .collect::<Vec<_>>()
                .join("\n");
            context.text = if context.text.is_empty() {
                format!("Earlier findings:\n{}", notes)
            } else {
                format!("{}\n\nEarlier findings:\n{}", context.text, notes)
            };
        }
        info!(
            "Context: {} chunk(s), {} citation(s), {} duplicate(s) dropped",
            context.used_chunks.len(),
            context.citations.len(),
            context.duplicates_dropped
        );

        match self.generate(query, &context, cancel).await {
            Ok(answer) if !answer.trim().is_empty() => {
                StepResult::text(answer.trim(), context.top_score, context.citations)
            }
            Ok(_) => StepResult::failure("generator returned an empty answer"),
            Err(e) => {
                warn!("Generation failed: {}", e);
                StepResult::failure(format!("generation failed: {}", e))
            }
        }
    }
}
