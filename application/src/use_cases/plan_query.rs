//! Query planning use case.
//!
//! Maps a [`Classification`] to an [`ExecutionPlan`]:
//!
//! | Intent | Strategy |
//! |--------|----------|
//! | structured_lookup | direct_lookup (one Resolver step) |
//! | comparison | parallel (independent sub-steps + synthesis) |
//! | multi_step | multi_step (chained sub-steps + synthesis) |
//! | everything else | vector_search (one RAG step) |
//!
//! A plan never contains a step whose required parameters are missing; when
//! the classification cannot support its strategy, the plan is downgraded to
//! vector search and the reason recorded.

use crate::use_cases::classify_intent::SubQuestionSource;
use futures::future::join_all;
use ragline_domain::{
    Classification, ExecutionPlan, IntentType, PlanStep, Question, StepTarget, Strategy,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_SUB_QUESTIONS: usize = 4;
pub const LOOKUP_STEP: &str = "lookup";
pub const SEARCH_STEP: &str = "search";
pub const SYNTHESIS_STEP: &str = "synthesize";

#[derive(Clone)]
pub struct QueryPlanner {
    source: Arc<dyn SubQuestionSource>,
    top_k: usize,
}

impl QueryPlanner {
    pub fn new(source: Arc<dyn SubQuestionSource>, top_k: usize) -> Self {
        Self {
            source,
            top_k: top_k.max(1),
        }
    }

    /// Plan for `classification`, or the escalation of `previous` on retry.
    pub async fn plan(
        &self,
        question: &Question,
        classification: &Classification,
        previous: Option<&ExecutionPlan>,
        cancel: &CancellationToken,
    ) -> ExecutionPlan {
        let plan = match previous {
            Some(previous) => self.escalate(question, classification, previous),
            None => self.initial(question, classification, cancel).await,
        };
        let plan = self.ensure_executable(question, plan);
        info!(
            "Planned {} with {} step(s){}",
            plan.strategy,
            plan.steps.len(),
            plan.downgrade_reason
                .as_deref()
                .map(|r| format!(" (downgraded: {})", r))
                .unwrap_or_default()
        );
        plan
    }

    async fn initial(
        &self,
        question: &Question,
        classification: &Classification,
        cancel: &CancellationToken,
    ) -> ExecutionPlan {
        match classification.intent_type {
            IntentType::StructuredLookup => match lookup_step(LOOKUP_STEP, classification) {
                Ok(step) => ExecutionPlan::new(Strategy::DirectLookup).with_step(step),
                Err(missing) => self
                    .vector_search(question.content(), self.top_k)
                    .with_downgrade(format!("structured_lookup without {}", missing)),
            },
            IntentType::Comparison | IntentType::MultiStep => {
                self.decomposed(question, classification, cancel).await
            }
            IntentType::ClarificationNeeded => self
                .vector_search(question.content(), self.top_k)
                .with_downgrade("clarification_needed has no executable plan"),
            IntentType::GeneralRag
            | IntentType::Definition
            | IntentType::HowTo
            | IntentType::Troubleshooting => self.vector_search(question.content(), self.top_k),
        }
    }

    async fn decomposed(
        &self,
        question: &Question,
        classification: &Classification,
        cancel: &CancellationToken,
    ) -> ExecutionPlan {
        let intent = classification.intent_type;
        let mut sub_questions = classification.sub_questions.clone();
        if sub_questions.len() < 2 {
            sub_questions = self.source.decompose(question.content(), intent, cancel).await;
        }
        sub_questions.retain(|s| !s.trim().is_empty());
        sub_questions.dedup();
        sub_questions.truncate(MAX_SUB_QUESTIONS);

        if sub_questions.len() < 2 {
            return self
                .vector_search(question.content(), self.top_k)
                .with_downgrade(format!("{} produced fewer than 2 sub-questions", intent));
        }
        debug!("Decomposed into {} sub-questions", sub_questions.len());

        let sub_classifications = join_all(
            sub_questions
                .iter()
                .map(|s| self.source.classify_text(s, cancel)),
        )
        .await;

        let (strategy, chained) = match intent {
            IntentType::Comparison => (Strategy::Parallel, false),
            _ => (Strategy::MultiStep, true),
        };

        let mut plan = ExecutionPlan::new(strategy);
        let mut synthesis = PlanStep::new(SYNTHESIS_STEP, StepTarget::Synthesizer)
            .with_param("question", question.content());
        for (i, (text, sub)) in sub_questions.iter().zip(&sub_classifications).enumerate() {
            let id = format!("s{}", i + 1);
            let mut step = self.sub_step(&id, text, sub, classification);
            if chained && i > 0 {
                step = step.with_dependency(format!("s{}", i));
            }
            synthesis = synthesis.with_dependency(id.as_str());
            plan = plan.with_step(step);
        }
        plan.with_step(synthesis)
    }

    /// Resolver step when the sub-question is a lookup, RAG otherwise.
    fn sub_step(
        &self,
        id: &str,
        text: &str,
        sub: &Classification,
        parent: &Classification,
    ) -> PlanStep {
        if sub.intent_type == IntentType::StructuredLookup {
            let mut sub = sub.clone();
            if sub.entity_type.is_none() {
                sub.entity_type = parent.entity_type.clone();
            }
            if let Ok(step) = lookup_step(id, &sub) {
                return step.with_param("question", text);
            }
        }
        PlanStep::new(id, StepTarget::RagExecutor)
            .with_param("query", text)
            .with_param("top_k", self.top_k.to_string())
    }

    /// Retry plan after a result the validator sent back.
    pub fn escalate(
        &self,
        question: &Question,
        classification: &Classification,
        previous: &ExecutionPlan,
    ) -> ExecutionPlan {
        let reason = format!("escalated from {}", previous.strategy);
        let plan = match previous.strategy {
            Strategy::DirectLookup => self.vector_search(question.content(), self.top_k),
            Strategy::VectorSearch => match lookup_step(LOOKUP_STEP, classification) {
                Ok(lookup) => ExecutionPlan::new(Strategy::Hybrid)
                    .with_step(lookup)
                    .with_step(self.rag_step(SEARCH_STEP, question.content(), self.top_k))
                    .with_step(
                        PlanStep::new(SYNTHESIS_STEP, StepTarget::Synthesizer)
                            .with_param("question", question.content())
                            .with_dependency(LOOKUP_STEP)
                            .with_dependency(SEARCH_STEP),
                    ),
                Err(_) => {
                    let previous_k = previous
                        .steps
                        .iter()
                        .find_map(|s| s.param("top_k")?.parse::<usize>().ok())
                        .unwrap_or(self.top_k);
                    self.vector_search(question.content(), previous_k.saturating_mul(2))
                }
            },
            Strategy::Hybrid | Strategy::MultiStep | Strategy::Parallel => {
                self.vector_search(question.content(), self.top_k)
            }
        };
        debug!("{} to {}", reason, plan.strategy);
        plan
    }

    fn vector_search(&self, query: &str, top_k: usize) -> ExecutionPlan {
        ExecutionPlan::new(Strategy::VectorSearch).with_step(self.rag_step(SEARCH_STEP, query, top_k))
    }

    fn rag_step(&self, id: &str, query: &str, top_k: usize) -> PlanStep {
        PlanStep::new(id, StepTarget::RagExecutor)
            .with_param("query", query)
            .with_param("top_k", top_k.to_string())
    }

    /// Replace any plan that is invalid or has a step missing inputs.
    fn ensure_executable(&self, question: &Question, plan: ExecutionPlan) -> ExecutionPlan {
        if let Err(e) = plan.validate() {
            warn!("Discarding invalid plan: {}", e);
            return self
                .vector_search(question.content(), self.top_k)
                .with_downgrade(e.to_string());
        }
        if let Some(step) = plan.steps.iter().find(|s| !s.missing_params().is_empty()) {
            let reason = format!(
                "step '{}' missing {}",
                step.id,
                step.missing_params().join(", ")
            );
            warn!("Discarding plan: {}", reason);
            return self
                .vector_search(question.content(), self.top_k)
                .with_downgrade(reason);
        }
        plan
    }
}

/// Resolver step, or the name of the first missing parameter.
fn lookup_step(id: &str, classification: &Classification) -> Result<PlanStep, &'static str> {
    let entity_type = classification
        .entity_type
        .as_ref()
        .ok_or("entity_type")?;
    let location = classification.param("location").ok_or("location")?;
    Ok(PlanStep::new(id, StepTarget::Resolver)
        .with_param("entity_type", entity_type.as_str())
        .with_param("location", location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragline_domain::{EntityType, StepId};
    use std::sync::Mutex;

    struct FixedSource {
        subs: Vec<String>,
        decompose_calls: Mutex<usize>,
    }

    impl FixedSource {
        fn new(subs: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                subs: subs.iter().map(|s| s.to_string()).collect(),
                decompose_calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl SubQuestionSource for FixedSource {
        async fn decompose(&self, _: &str, _: IntentType, _: &CancellationToken) -> Vec<String> {
            *self.decompose_calls.lock().unwrap() += 1;
            self.subs.clone()
        }

        async fn classify_text(&self, question: &str, _: &CancellationToken) -> Classification {
            if let Some(city) = question.strip_prefix("rate in ") {
                Classification::new(IntentType::StructuredLookup, 0.9)
                    .with_entity_type(EntityType::new("location_rate"))
                    .with_param("location", city)
            } else {
                Classification::new(IntentType::GeneralRag, 0.9)
            }
        }
    }

    fn q(text: &str) -> Question {
        Question::try_new(text).unwrap()
    }

    fn lookup_classification(location: Option<&str>) -> Classification {
        let mut c = Classification::new(IntentType::StructuredLookup, 0.9)
            .with_entity_type(EntityType::new("location_rate"));
        if let Some(l) = location {
            c = c.with_param("location", l);
        }
        c
    }

    async fn plan_for(source: Arc<FixedSource>, c: &Classification) -> ExecutionPlan {
        QueryPlanner::new(source, 8)
            .plan(&q("question"), c, None, &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_lookup_plan() {
        let plan = plan_for(FixedSource::new(&[]), &lookup_classification(Some("Denver"))).await;
        assert_eq!(plan.strategy, Strategy::DirectLookup);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].target, StepTarget::Resolver);
        assert_eq!(plan.steps[0].param("location"), Some("Denver"));
        assert!(!plan.is_downgraded());
    }

    #[tokio::test]
    async fn test_lookup_without_location_downgrades() {
        let plan = plan_for(FixedSource::new(&[]), &lookup_classification(None)).await;
        assert_eq!(plan.strategy, Strategy::VectorSearch);
        assert_eq!(plan.steps[0].target, StepTarget::RagExecutor);
        assert_eq!(
            plan.downgrade_reason.as_deref(),
            Some("structured_lookup without location")
        );
    }

    #[tokio::test]
    async fn test_general_rag_plan() {
        for intent in [IntentType::GeneralRag, IntentType::HowTo, IntentType::Definition] {
            let plan = plan_for(FixedSource::new(&[]), &Classification::new(intent, 0.9)).await;
            assert_eq!(plan.strategy, Strategy::VectorSearch);
            assert_eq!(plan.steps[0].param("query"), Some("question"));
            assert_eq!(plan.steps[0].param("top_k"), Some("8"));
        }
    }

    #[tokio::test]
    async fn test_comparison_is_parallel() {
        let source = FixedSource::new(&["rate in Denver, CO", "rate in Boulder, CO"]);
        let plan = plan_for(source.clone(), &Classification::new(IntentType::Comparison, 0.9)).await;
        assert_eq!(plan.strategy, Strategy::Parallel);
        assert_eq!(plan.steps.len(), 3);
        assert!(plan.has_parallel_steps());
        assert_eq!(plan.steps[0].target, StepTarget::Resolver);
        let layers = plan.layers().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].len(), 2);
        let sinks = plan.sinks();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].id, StepId::new(SYNTHESIS_STEP));
        assert_eq!(*source.decompose_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_multi_step_is_chained() {
        let source = FixedSource::new(&["what is per diem", "how is it paid", "who approves it"]);
        let plan = plan_for(source, &Classification::new(IntentType::MultiStep, 0.9)).await;
        assert_eq!(plan.strategy, Strategy::MultiStep);
        assert_eq!(plan.layers().unwrap().len(), 4);
        assert_eq!(plan.steps[2].depends_on, vec![StepId::new("s2")]);
    }

    #[tokio::test]
    async fn test_classifier_sub_questions_used_first() {
        let source = FixedSource::new(&[]);
        let c = Classification::new(IntentType::Comparison, 0.9)
            .with_sub_questions(vec!["a?".into(), "b?".into()]);
        let plan = plan_for(source.clone(), &c).await;
        assert_eq!(plan.strategy, Strategy::Parallel);
        assert_eq!(*source.decompose_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_decomposition_downgrades() {
        let plan = plan_for(FixedSource::new(&["only one"]), &Classification::new(IntentType::Comparison, 0.9)).await;
        assert_eq!(plan.strategy, Strategy::VectorSearch);
        assert!(plan.is_downgraded());
    }

    #[test]
    fn test_escalation_policy() {
        let planner = QueryPlanner::new(FixedSource::new(&[]), 8);
        let question = q("lodging in denver");
        let with_location = lookup_classification(Some("Denver"));
        let general = Classification::new(IntentType::GeneralRag, 0.9);

        let direct = ExecutionPlan::new(Strategy::DirectLookup);
        assert_eq!(
            planner.escalate(&question, &with_location, &direct).strategy,
            Strategy::VectorSearch
        );

        let search = planner.vector_search("lodging in denver", 8);
        let hybrid = planner.escalate(&question, &with_location, &search);
        assert_eq!(hybrid.strategy, Strategy::Hybrid);
        assert!(hybrid.validate().is_ok());

        let wider = planner.escalate(&question, &general, &search);
        assert_eq!(wider.strategy, Strategy::VectorSearch);
        assert_eq!(wider.steps[0].param("top_k"), Some("16"));

        assert_eq!(
            planner.escalate(&question, &general, &hybrid).strategy,
            Strategy::VectorSearch
        );
    }

    #[tokio::test]
    async fn test_every_plan_has_required_params() {
        let intents = IntentType::ALL;
        for intent in intents {
            let plan = plan_for(FixedSource::new(&["rate in Denver", "x"]), &Classification::new(intent, 0.9)).await;
            assert!(plan.steps.iter().all(|s| s.missing_params().is_empty()), "{}", intent);
        }
    }
}
