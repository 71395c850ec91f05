//! Task dispatch use case.
//!
//! Executes an [`ExecutionPlan`] layer by layer. Steps inside a layer are
//! independent and run concurrently on a [`JoinSet`]; a layer starts only
//! after the previous one has fully joined. Every step runs under the step
//! timeout, and a timeout is reported exactly like a provider failure:
//! `success = false`, `confidence = 0`.

use crate::config::PipelineParams;
use crate::ports::language_provider::{GenerateRequest, LanguageProvider};
use crate::ports::vector_store::VectorStore;
use crate::use_cases::rag_search::RagSearchExecutor;
use crate::use_cases::request::RequestContext;
use crate::use_cases::shared::{RetryPolicy, call_with_retry};
use ragline_domain::{
    Citation, DatasetSnapshot, DomainError, EntityType, ExecutionPlan, LookupFailure,
    LookupResult, PlanStep, PromptTemplate, StepId, StepResult, StepTarget, StructuredResolver,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    InvalidPlan(#[from] DomainError),
}

/// Results of one plan execution.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Every step's result, in plan order.
    pub steps: Vec<StepResult>,
    /// The plan's answer, taken from its sink step(s).
    pub output: StepResult,
}

#[derive(Clone)]
pub struct TaskDispatcher {
    resolver: StructuredResolver,
    rag: RagSearchExecutor,
    provider: Arc<dyn LanguageProvider>,
    store: Option<Arc<dyn VectorStore>>,
    retry: RetryPolicy,
    step_timeout: Duration,
    default_top_k: usize,
}

impl TaskDispatcher {
    pub fn new(
        rag: RagSearchExecutor,
        provider: Arc<dyn LanguageProvider>,
        params: &PipelineParams,
    ) -> Self {
        Self {
            resolver: StructuredResolver::new(params.resolver),
            rag,
            provider,
            store: None,
            retry: params.retry_policy(),
            step_timeout: params.step_timeout,
            default_top_k: params.top_k,
        }
    }

    /// Re-fetch resolved records from `store` before answering.
    pub fn with_hydration(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn dispatch(
        &self,
        plan: &ExecutionPlan,
        ctx: &RequestContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let layers = plan.layers()?;
        let mut results: BTreeMap<StepId, StepResult> = BTreeMap::new();

        for (depth, layer) in layers.iter().enumerate() {
            debug!("Dispatching layer {} with {} step(s)", depth, layer.len());
            let mut join_set = JoinSet::new();

            for step in layer {
                let dispatcher = self.clone();
                let step = (*step).clone();
                let prior = prior_for(&step, plan, &results);
                let snapshot = Arc::clone(&ctx.snapshot);
                let cancel = ctx.cancel.clone();
                let timeout = self.step_timeout;

                join_set.spawn(async move {
                    let id = step.id.clone();
                    let run = dispatcher.execute_step(&step, &snapshot, &prior, &cancel);
                    let result = match tokio::time::timeout(timeout, run).await {
                        Ok(result) => result,
                        Err(_) => StepResult::failure(format!(
                            "step timed out after {}s",
                            timeout.as_secs_f32()
                        )),
                    };
                    (id, result)
                });
            }

            loop {
                let joined = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        join_set.abort_all();
                        return Err(DispatchError::Cancelled);
                    }
                    joined = join_set.join_next() => joined,
                };
                let Some(joined) = joined else {
                    break;
                };
                match joined {
                    Ok((id, result)) => {
                        info!(
                            "Step {} finished: success={}, confidence={:.2}",
                            id, result.success, result.confidence
                        );
                        results.insert(id.clone(), result.with_step_id(id));
                    }
                    Err(e) => warn!("Step task join error: {}", e),
                }
            }

            for step in layer {
                results
                    .entry(step.id.clone())
                    .or_insert_with(|| StepResult::failure("step task aborted").with_step_id(step.id.clone()));
            }
        }

        let steps: Vec<StepResult> = plan
            .steps
            .iter()
            .filter_map(|s| results.get(&s.id).cloned())
            .collect();
        let output = combine_sinks(plan, &results);
        Ok(DispatchOutcome { steps, output })
    }

    async fn execute_step(
        &self,
        step: &PlanStep,
        snapshot: &DatasetSnapshot,
        prior: &[(String, StepResult)],
        cancel: &CancellationToken,
    ) -> StepResult {
        match step.target {
            StepTarget::Resolver => self.run_lookup(step, snapshot, cancel).await,
            StepTarget::RagExecutor => {
                let query = step.param("query").unwrap_or_default();
                let top_k = step
                    .param("top_k")
                    .and_then(|k| k.parse().ok())
                    .unwrap_or(self.default_top_k);
                let notes: Vec<String> = prior
                    .iter()
                    .filter(|(_, r)| r.success)
                    .map(|(_, r)| r.answer_text())
                    .collect();
                self.rag.run(query, top_k, &notes, cancel).await
            }
            StepTarget::Synthesizer => {
                let question = step.param("question").unwrap_or_default();
                self.synthesize(question, prior, cancel).await
            }
        }
    }

    async fn run_lookup(
        &self,
        step: &PlanStep,
        snapshot: &DatasetSnapshot,
        cancel: &CancellationToken,
    ) -> StepResult {
        let entity_type = EntityType::new(step.param("entity_type").unwrap_or_default());
        let location = step.param("location").unwrap_or_default();

        match self.resolver.resolve(snapshot, &entity_type, location) {
            Ok(result) => {
                info!(
                    "Resolved '{}' to {} ({}, score {:.1})",
                    location,
                    result.candidate.canonical_key,
                    result.candidate.match_type,
                    result.candidate.score
                );
                StepResult::lookup(self.hydrate(result, cancel).await)
            }
            Err(failure) => {
                warn!("Lookup failed: {}", failure);
                let parameter = match failure {
                    LookupFailure::UnknownEntityType(_) => "entity_type",
                    LookupFailure::NotFound { .. } | LookupFailure::EmptyInput => "location",
                };
                StepResult::failure(failure.to_string()).with_parameter(parameter)
            }
        }
    }

    /// Replace snapshot fields with the store's copy when hydration is on.
    async fn hydrate(&self, mut result: LookupResult, cancel: &CancellationToken) -> LookupResult {
        let Some(store) = &self.store else {
            return result;
        };
        let key = result.candidate.canonical_key.clone();
        match call_with_retry(&self.retry, cancel, "record fetch", || store.get(&key)).await {
            Ok(record) => {
                if !record.fields.is_empty() {
                    result.payload = record.fields;
                }
                if record.source_excerpt.is_some() {
                    result.source_excerpt = record.source_excerpt;
                }
                if let Some(citation) = record.citation.filter(Citation::is_valid) {
                    result.citations = vec![citation];
                }
            }
            Err(e) => debug!("Hydration of {} skipped: {}", key, e),
        }
        result
    }

    async fn synthesize(
        &self,
        question: &str,
        prior: &[(String, StepResult)],
        cancel: &CancellationToken,
    ) -> StepResult {
        let successful: Vec<&(String, StepResult)> = prior.iter().filter(|(_, r)| r.success).collect();
        if successful.is_empty() {
            return StepResult::failure("no sub-step produced an answer");
        }

        let partials: Vec<(String, String)> = successful
            .iter()
            .map(|(label, r)| (label.clone(), r.answer_text()))
            .collect();
        let request = GenerateRequest::text(PromptTemplate::synthesis(question, &partials));
        let answer = match call_with_retry(&self.retry, cancel, "synthesis", || {
            self.provider.generate(&request)
        })
        .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => return StepResult::failure("synthesizer returned an empty answer"),
            Err(e) => return StepResult::failure(format!("synthesis failed: {}", e)),
        };

        let coverage = successful.len() as f64 / prior.len() as f64;
        let mean = successful.iter().map(|(_, r)| r.confidence).sum::<f64>() / successful.len() as f64;
        StepResult::text(
            answer.trim(),
            mean * coverage,
            merge_citations(successful.iter().map(|(_, r)| r)),
        )
    }
}

/// Dependency results of `step`, labelled by the question each answered.
fn prior_for(
    step: &PlanStep,
    plan: &ExecutionPlan,
    results: &BTreeMap<StepId, StepResult>,
) -> Vec<(String, StepResult)> {
    step.depends_on
        .iter()
        .filter_map(|id| {
            let result = results.get(id)?.clone();
            let label = plan
                .step(id)
                .and_then(|s| s.param("question").or_else(|| s.param("query")))
                .unwrap_or(id.as_str())
                .to_string();
            Some((label, result))
        })
        .collect()
}

fn merge_citations<'a>(results: impl Iterator<Item = &'a StepResult>) -> Vec<Citation> {
    let mut merged: Vec<Citation> = Vec::new();
    for citation in results.flat_map(|r| r.citations.iter()) {
        if !merged.iter().any(|c| c.source_url == citation.source_url) {
            merged.push(citation.clone());
        }
    }
    merged
}

/// One sink: its result. Several: the most confident success, carrying
/// every sink's citations.
fn combine_sinks(plan: &ExecutionPlan, results: &BTreeMap<StepId, StepResult>) -> StepResult {
    let sinks: Vec<&StepResult> = plan
        .sinks()
        .into_iter()
        .filter_map(|s| results.get(&s.id))
        .collect();
    match sinks.as_slice() {
        [] => StepResult::failure("plan produced no output"),
        [only] => (*only).clone(),
        many => {
            let best = many
                .iter()
                .filter(|r| r.success)
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .copied()
                .unwrap_or(many[0]);
            let mut output = best.clone();
            output.citations = merge_citations(std::iter::once(best).chain(many.iter().copied()));
            output
        }
    }
}
