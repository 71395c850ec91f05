//! Ask use case
//!
//! Orchestrates one question end to end:
//!
//! 1. Classify the question (confidence gate may short-circuit to a
//!    clarification)
//! 2. Plan, dispatch and validate
//! 3. On a retry decision, re-plan with escalation while the request's retry
//!    budget lasts; otherwise emit the best attempt
//!
//! Every stage is reported through an [`EventEmitter`], and exactly one
//! terminal event closes each request.

use crate::config::PipelineParams;
use crate::ports::language_provider::{Embedder, LanguageProvider};
use crate::ports::transcript_logger::{NoTranscriptLogger, TranscriptLogger};
use crate::ports::vector_store::VectorStore;
use crate::use_cases::classify_intent::IntentClassifier;
use crate::use_cases::dispatch::{DispatchError, TaskDispatcher};
use crate::use_cases::emitter::EventEmitter;
use crate::use_cases::plan_query::QueryPlanner;
use crate::use_cases::rag_search::RagSearchExecutor;
use crate::use_cases::request::RequestContext;
use ragline_domain::{
    AnswerMetadata, Clarification, Classification, DatasetSnapshot, Decision, ExecutionPlan,
    FinalAnswer, IntentType, PipelineEvent, Question, ResponseValidator, StepResult, Strategy,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const EVENT_BUFFER: usize = 64;

/// Errors that end a request with an `error` event
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AskError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reachability of the external collaborators.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Model names on success.
    pub provider: Result<Vec<String>, String>,
    pub store: Result<(), String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.provider.is_ok() && self.store.is_ok()
    }

    pub fn status(&self) -> &'static str {
        if self.is_healthy() { "healthy" } else { "degraded" }
    }
}

struct Attempt {
    score: f64,
    strategy: Strategy,
    result: StepResult,
}

/// The full question-answering pipeline.
///
/// Cheap to clone; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct AskPipeline {
    classifier: IntentClassifier,
    planner: QueryPlanner,
    dispatcher: TaskDispatcher,
    validator: ResponseValidator,
    provider: Arc<dyn LanguageProvider>,
    store: Arc<dyn VectorStore>,
    snapshot: Arc<DatasetSnapshot>,
    transcript: Arc<dyn TranscriptLogger>,
    max_retries: u32,
}

impl AskPipeline {
    pub fn new(
        provider: Arc<dyn LanguageProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        snapshot: Arc<DatasetSnapshot>,
        params: &PipelineParams,
    ) -> Self {
        let classifier = IntentClassifier::new(provider.clone(), params)
            .with_entity_types(snapshot.entity_types().cloned().collect());
        let planner = QueryPlanner::new(Arc::new(classifier.clone()), params.top_k);
        let rag = RagSearchExecutor::new(embedder, store.clone(), provider.clone(), params);
        let mut dispatcher = TaskDispatcher::new(rag, provider.clone(), params);
        if params.hydrate_lookups {
            dispatcher = dispatcher.with_hydration(store.clone());
        }

        Self {
            classifier,
            planner,
            dispatcher,
            validator: ResponseValidator::new(params.validation_policy()),
            provider,
            store,
            snapshot,
            transcript: Arc::new(NoTranscriptLogger),
            max_retries: params.effective_max_retries(),
        }
    }

    pub fn with_transcript(mut self, transcript: Arc<dyn TranscriptLogger>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    pub fn snapshot(&self) -> &Arc<DatasetSnapshot> {
        &self.snapshot
    }

    /// Synchronous mode: run to completion and return the final answer.
    pub async fn ask(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<FinalAnswer, AskError> {
        let mut ctx = self.request_context(question, &cancel);
        let mut emitter = EventEmitter::silent(
            ctx.cancel.clone(),
            self.transcript.clone(),
            ctx.request_id.clone(),
        )
        .with_session(ctx.session_id.clone());
        self.execute(question, &mut ctx, &mut emitter).await
    }

    /// Streaming mode: events arrive on the returned receiver as stages
    /// complete. Dropping the receiver cancels the request.
    pub fn ask_streaming(
        &self,
        question: Question,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut ctx = self.request_context(&question, &cancel);
        let done = CancellationToken::new();

        let watcher_tx = tx.clone();
        let watcher_cancel = ctx.cancel.clone();
        let watcher_done = done.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watcher_tx.closed() => watcher_cancel.cancel(),
                _ = watcher_done.cancelled() => {}
            }
        });

        let pipeline = self.clone();
        tokio::spawn(async move {
            let mut emitter = EventEmitter::channel(
                tx,
                ctx.cancel.clone(),
                pipeline.transcript.clone(),
                ctx.request_id.clone(),
            )
            .with_session(ctx.session_id.clone());
            let _ = pipeline.execute(&question, &mut ctx, &mut emitter).await;
            done.cancel();
        });

        rx
    }

    pub async fn health(&self) -> HealthReport {
        let (provider, store) = tokio::join!(self.provider.health(), self.store.health());
        HealthReport {
            provider: provider.map_err(|e| e.to_string()),
            store: store.map_err(|e| e.to_string()),
        }
    }

    fn request_context(&self, question: &Question, cancel: &CancellationToken) -> RequestContext {
        RequestContext::new(Arc::clone(&self.snapshot), self.max_retries)
            .with_session(question.session_id().map(str::to_string))
            .with_cancellation(cancel.child_token())
    }

    async fn execute(
        &self,
        question: &Question,
        ctx: &mut RequestContext,
        emitter: &mut EventEmitter,
    ) -> Result<FinalAnswer, AskError> {
        let result = self.run(question, ctx, emitter).await;
        match &result {
            Ok(answer) => emitter.emit(PipelineEvent::final_answer(answer)).await,
            Err(e) => {
                warn!("Request {} ended with error: {}", ctx.request_id, e);
                emitter.emit(PipelineEvent::error(e.to_string())).await
            }
        }
        result
    }

    async fn run(
        &self,
        question: &Question,
        ctx: &mut RequestContext,
        emitter: &mut EventEmitter,
    ) -> Result<FinalAnswer, AskError> {
        emitter.emit(PipelineEvent::thought("Classifying the question")).await;
        let classification = self.classifier.classify(question, &ctx.cancel).await;
        ensure_live(ctx)?;
        emitter
            .emit(
                PipelineEvent::observation(format!(
                    "Intent {} (confidence {:.2})",
                    classification.intent_type, classification.confidence
                ))
                .with_data(to_data(&classification)),
            )
            .await;

        let mut metadata = AnswerMetadata {
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            intent: classification.intent_type.as_str().to_string(),
            ..AnswerMetadata::default()
        };

        if classification.needs_clarification() {
            let parameter = clarification_parameter(&classification);
            let text = classification
                .clarification_question
                .clone()
                .unwrap_or_else(|| Clarification::for_parameter(parameter, question.content()).question);
            metadata.elapsed_ms = ctx.elapsed_ms();
            let clarification = Clarification {
                parameter: parameter.to_string(),
                question: text,
            };
            return Ok(clarification_answer(clarification, classification.confidence, metadata));
        }

        let mut previous: Option<ExecutionPlan> = None;
        let mut best: Option<Attempt> = None;
        let mut attempts = 0;

        loop {
            let plan = self
                .planner
                .plan(question, &classification, previous.as_ref(), &ctx.cancel)
                .await;
            ensure_live(ctx)?;
            attempts += 1;
            emitter
                .emit(
                    PipelineEvent::action(format!(
                        "Running {} plan with {} step(s)",
                        plan.strategy,
                        plan.steps.len()
                    ))
                    .with_data(to_data(&plan)),
                )
                .await;

            let outcome = self.dispatcher.dispatch(&plan, ctx).await.map_err(|e| match e {
                DispatchError::Cancelled => AskError::Cancelled,
                DispatchError::InvalidPlan(e) => AskError::Internal(e.to_string()),
            })?;
            for step in &outcome.steps {
                let id = step.step_id.as_ref().map(|id| id.as_str()).unwrap_or("?");
                let status = if step.success { "succeeded" } else { "failed" };
                emitter
                    .emit(
                        PipelineEvent::observation(format!(
                            "Step {} {} (confidence {:.2})",
                            id, status, step.confidence
                        ))
                        .with_data(to_data(step)),
                    )
                    .await;
            }

            let validation = self.validator.validate(question, &outcome.output);
            info!(
                "Attempt {} scored {:.3} -> {}",
                attempts, validation.score, validation.decision
            );
            emitter
                .emit(
                    PipelineEvent::validation(format!(
                        "Score {:.2}: {}",
                        validation.score, validation.decision
                    ))
                    .with_data(json!({
                        "score": validation.score,
                        "breakdown": validation.breakdown,
                        "issues": validation.issues,
                        "decision": validation.decision,
                    })),
                )
                .await;

            metadata.attempts = attempts;
            metadata.strategy = Some(plan.strategy.to_string());
            metadata.validation_score = validation.score;

            match validation.decision {
                Decision::Accept => {
                    metadata.elapsed_ms = ctx.elapsed_ms();
                    let answer = validation
                        .final_answer
                        .unwrap_or_else(|| attempt_answer(&outcome.output, validation.score));
                    return Ok(answer.with_metadata(metadata));
                }
                Decision::Retry => {
                    if best.as_ref().is_none_or(|b| validation.score > b.score) {
                        best = Some(Attempt {
                            score: validation.score,
                            strategy: plan.strategy,
                            result: outcome.output,
                        });
                    }
                    if ctx.try_consume_retry() {
                        emitter
                            .emit(PipelineEvent::thought(format!(
                                "Score below the accept threshold; retrying with an escalated plan ({}/{})",
                                ctx.retries_used(),
                                self.max_retries
                            )))
                            .await;
                        previous = Some(plan);
                        continue;
                    }
                    info!("Retry budget spent after {} attempt(s)", attempts);
                    return Ok(best_answer(best, metadata, ctx));
                }
                Decision::Clarify => {
                    if best.is_some() {
                        return Ok(best_answer(best, metadata, ctx));
                    }
                    metadata.elapsed_ms = ctx.elapsed_ms();
                    let clarification = validation.clarification.unwrap_or_else(|| {
                        Clarification::for_parameter("topic", question.content())
                    });
                    return Ok(clarification_answer(clarification, validation.score, metadata));
                }
            }
        }
    }
}

fn ensure_live(ctx: &RequestContext) -> Result<(), AskError> {
    if ctx.is_cancelled() {
        Err(AskError::Cancelled)
    } else {
        Ok(())
    }
}

fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn clarification_parameter(classification: &Classification) -> &'static str {
    match classification.original_intent.unwrap_or(classification.intent_type) {
        IntentType::StructuredLookup => "location",
        _ => "topic",
    }
}

fn attempt_answer(result: &StepResult, score: f64) -> FinalAnswer {
    FinalAnswer::new(result.answer_text(), score).with_citations(&result.citations)
}

fn best_answer(best: Option<Attempt>, mut metadata: AnswerMetadata, ctx: &RequestContext) -> FinalAnswer {
    metadata.elapsed_ms = ctx.elapsed_ms();
    match best {
        Some(best) => {
            metadata.strategy = Some(best.strategy.to_string());
            metadata.validation_score = best.score;
            attempt_answer(&best.result, best.score).with_metadata(metadata)
        }
        None => FinalAnswer::new("No answer could be produced.", 0.0).with_metadata(metadata),
    }
}

fn clarification_answer(
    clarification: Clarification,
    confidence: f64,
    mut metadata: AnswerMetadata,
) -> FinalAnswer {
    metadata.clarification = true;
    metadata.parameter = Some(clarification.parameter);
    FinalAnswer::new(clarification.question, confidence).with_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::language_provider::ProviderError;
    use crate::testing::{MockEmbedder, MockProvider, MockStore, chunk, classification_json};
    use ragline_domain::{AliasMap, Citation, DatasetRecord, EventType};
    use std::time::Duration;

    fn snapshot() -> Arc<DatasetSnapshot> {
        Arc::new(
            DatasetSnapshot::new(
                vec![
                    DatasetRecord::new("location_rate", "Denver, CO")
                        .with_field("lodging", 199)
                        .with_excerpt("Denver | CO | 199")
                        .with_citation(Citation::new("https://gsa.example/co", "Colorado rates"))
                        .as_representative(),
                    DatasetRecord::new("location_rate", "Boulder, CO")
                        .with_field("lodging", 219)
                        .with_excerpt("Boulder | CO | 219")
                        .with_citation(Citation::new("https://gsa.example/co", "Colorado rates")),
                ],
                AliasMap::default(),
            )
            .unwrap(),
        )
    }

    fn params() -> PipelineParams {
        PipelineParams::default().with_provider_retry(1, Duration::from_millis(1))
    }

    fn lookup_reply(location: &str, confidence: f64) -> String {
        classification_json(
            "structured_lookup",
            confidence,
            &format!(
                r#", "entity_type": "location_rate", "extracted_params": {{"location": "{}"}}"#,
                location
            ),
        )
    }

    fn provider(classification: String, answer: &'static str) -> Arc<MockProvider> {
        Arc::new(MockProvider::responding(move |req| {
            if req.expect_structured {
                Ok(classification.clone())
            } else {
                Ok(answer.to_string())
            }
        }))
    }

    fn pipeline(provider: Arc<MockProvider>, store: MockStore) -> AskPipeline {
        AskPipeline::new(
            provider,
            Arc::new(MockEmbedder),
            Arc::new(store),
            snapshot(),
            &params(),
        )
    }

    async fn collect(mut rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn question(text: &str) -> Question {
        Question::try_new(text).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_question_streams_ordered_events() {
        let provider = provider(lookup_reply("Denver, CO", 0.92), "unused");
        let pipeline = pipeline(provider, MockStore::default());
        let events = collect(
            pipeline.ask_streaming(question("What is the lodging rate in Denver, CO?"), CancellationToken::new()),
        )
        .await;

        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::Thought,
                EventType::Observation,
                EventType::Action,
                EventType::Observation,
                EventType::Validation,
                EventType::FinalAnswer,
            ]
        );
        let last = events.last().unwrap();
        assert!(last.content.contains("Denver, CO"));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_sync_answer_carries_metadata() {
        let provider = provider(lookup_reply("Denver, CO", 0.92), "unused");
        let pipeline = pipeline(provider, MockStore::default());
        let q = question("lodging rate in Denver, CO").with_session("s-42");
        let answer = pipeline.ask(&q, CancellationToken::new()).await.unwrap();

        assert!((answer.confidence - 0.9).abs() < 1e-9);
        assert_eq!(answer.citations.len(), 1);
        let metadata = answer.metadata.unwrap();
        assert_eq!(metadata.intent, "structured_lookup");
        assert_eq!(metadata.strategy.as_deref(), Some("direct_lookup"));
        assert_eq!(metadata.attempts, 1);
        assert_eq!(metadata.session_id.as_deref(), Some("s-42"));
        assert!(!metadata.clarification);
    }

    #[tokio::test]
    async fn test_low_confidence_lookup_asks_for_clarification() {
        let provider = provider(lookup_reply("Denver", 0.5), "unused");
        let pipeline = pipeline(provider.clone(), MockStore::default());
        let answer = pipeline
            .ask(&question("rate for denver?"), CancellationToken::new())
            .await
            .unwrap();

        assert!(answer.is_clarification());
        assert_eq!(answer.metadata.unwrap().parameter.as_deref(), Some("location"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_lookup_retries_then_emits_best_attempt() {
        let provider = provider(lookup_reply("Pueblo, CO", 0.9), "unused");
        let pipeline = pipeline(provider, MockStore::default());
        let answer = pipeline
            .ask(&question("rate in Pueblo, CO"), CancellationToken::new())
            .await
            .unwrap();

        assert!(!answer.is_clarification());
        assert!(answer.answer.contains("Denver, CO"));
        assert!((answer.confidence - 0.575).abs() < 1e-9);
        let metadata = answer.metadata.unwrap();
        assert_eq!(metadata.attempts, 2);
        assert_eq!(metadata.strategy.as_deref(), Some("direct_lookup"));
    }

    #[tokio::test]
    async fn test_provider_down_ends_with_clarification() {
        let provider = Arc::new(MockProvider::responding(|_| {
            Err(ProviderError::Unreachable("connection refused".to_string()))
        }));
        let store = MockStore::with_chunks(vec![chunk("a", "per diem guidance", 0.9)]);
        let pipeline = pipeline(provider, store);
        let events = collect(
            pipeline.ask_streaming(question("What are per diem rules?"), CancellationToken::new()),
        )
        .await;

        let last = events.last().unwrap();
        assert_eq!(last.event_type, EventType::FinalAnswer);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        let data = last.data.as_ref().unwrap();
        assert_eq!(data["metadata"]["clarification"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_cancelled_request_ends_with_error_event() {
        let provider = provider(lookup_reply("Denver, CO", 0.92), "unused");
        let pipeline = pipeline(provider, MockStore::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events = collect(pipeline.ask_streaming(question("rate in Denver"), cancel)).await;
        assert_eq!(events.last().unwrap().event_type, EventType::Error);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let token = CancellationToken::new();
        token.cancel();
        let q = question("rate in Denver");
        assert_eq!(pipeline.ask(&q, token).await, Err(AskError::Cancelled));
    }

    #[tokio::test]
    async fn test_health_reports_degraded_store() {
        let provider = provider(String::new(), "unused");
        let store = MockStore {
            down: true,
            ..MockStore::default()
        };
        let report = pipeline(provider, store).health().await;
        assert!(report.provider.is_ok());
        assert!(report.store.is_err());
        assert_eq!(report.status(), "degraded");
    }
}
