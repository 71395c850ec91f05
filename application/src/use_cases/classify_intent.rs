//! Intent classification use case.
//!
//! Flow:
//! 1. Ask the provider with the classification prompt (bounded retries)
//! 2. If the reply does not parse or cannot be decoded, ask once more with a
//!    stricter prompt
//! 3. If that fails too, or the provider is unreachable, degrade to the
//!    fallback classification
//! 4. Apply the confidence gate
//!
//! [`IntentClassifier::classify`] never fails; every failure path ends in a
//! usable [`Classification`].

use crate::config::PipelineParams;
use crate::ports::language_provider::{GenerateRequest, LanguageProvider, ProviderError};
use crate::use_cases::shared::{RetryPolicy, call_with_retry};
use async_trait::async_trait;
use ragline_domain::{
    Classification, EntityType, IntentType, PromptTemplate, Question, parse_classification,
    parse_sub_questions,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Splits a decomposable question into sub-questions.
#[async_trait]
pub trait SubQuestionSource: Send + Sync {
    /// Empty when nothing usable came back.
    async fn decompose(
        &self,
        question: &str,
        intent: IntentType,
        cancel: &CancellationToken,
    ) -> Vec<String>;

    /// Classification for a sub-question, used to pick its step target.
    /// Passes the same confidence gate as a top-level question.
    async fn classify_text(&self, question: &str, cancel: &CancellationToken) -> Classification;
}

#[derive(Clone)]
pub struct IntentClassifier {
    provider: Arc<dyn LanguageProvider>,
    entity_types: Vec<EntityType>,
    retry: RetryPolicy,
    threshold: f64,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn LanguageProvider>, params: &PipelineParams) -> Self {
        Self {
            provider,
            entity_types: Vec::new(),
            retry: params.retry_policy(),
            threshold: params.classification_threshold,
        }
    }

    /// Entity types offered to the provider in the prompt.
    pub fn with_entity_types(mut self, entity_types: Vec<EntityType>) -> Self {
        self.entity_types = entity_types;
        self
    }

    pub async fn classify(&self, question: &Question, cancel: &CancellationToken) -> Classification {
        let classification = self.classify_ungated(question.content(), cancel).await;
        let gated = classification.apply_confidence_threshold(self.threshold);
        info!(
            "Classified as {} (confidence {:.2}{})",
            gated.intent_type,
            gated.confidence,
            if gated.degraded { ", degraded" } else { "" }
        );
        gated
    }

    async fn classify_ungated(&self, question: &str, cancel: &CancellationToken) -> Classification {
        let prompt = PromptTemplate::classification(question, &self.entity_types);
        match self.ask(prompt, cancel).await {
            Ok(reply) => {
                if let Some(classification) = parse_classification(&reply) {
                    return classification;
                }
                debug!("Unparsable classification reply, retrying with strict prompt");
            }
            Err(ProviderError::Malformed(detail)) => {
                debug!("Undecodable classification reply ({}), retrying with strict prompt", detail);
            }
            Err(e) => {
                warn!("Classification provider failed: {}", e);
                return Classification::fallback(format!("provider error: {}", e));
            }
        }

        let strict = PromptTemplate::classification_strict(question, &self.entity_types);
        match self.ask(strict, cancel).await {
            Ok(reply) => parse_classification(&reply).unwrap_or_else(|| {
                warn!("Classification reply unparsable after strict retry");
                Classification::fallback("malformed provider output")
            }),
            Err(e) => {
                warn!("Classification provider failed on strict retry: {}", e);
                Classification::fallback(format!("provider error: {}", e))
            }
        }
    }

    async fn ask(&self, prompt: String, cancel: &CancellationToken) -> Result<String, ProviderError> {
        let request = GenerateRequest::structured(prompt);
        call_with_retry(&self.retry, cancel, "classification", || {
            self.provider.generate(&request)
        })
        .await
    }
}

#[async_trait]
impl SubQuestionSource for IntentClassifier {
    async fn decompose(
        &self,
        question: &str,
        intent: IntentType,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let request = GenerateRequest::structured(PromptTemplate::decomposition(question, intent));
        match call_with_retry(&self.retry, cancel, "decomposition", || {
            self.provider.generate(&request)
        })
        .await
        {
            Ok(reply) => parse_sub_questions(&reply),
            Err(e) => {
                warn!("Decomposition failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn classify_text(&self, question: &str, cancel: &CancellationToken) -> Classification {
        self.classify_ungated(question, cancel)
            .await
            .apply_confidence_threshold(self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, classification_json};
    use crate::use_cases::plan_query::QueryPlanner;
    use ragline_domain::StepTarget;
    use std::time::Duration;

    fn params() -> PipelineParams {
        PipelineParams::default().with_provider_retry(2, Duration::from_millis(1))
    }

    fn classifier(provider: Arc<MockProvider>) -> IntentClassifier {
        IntentClassifier::new(provider, &params())
            .with_entity_types(vec![EntityType::new("location_rate")])
    }

    fn q(text: &str) -> Question {
        Question::try_new(text).unwrap()
    }

    #[tokio::test]
    async fn test_confident_lookup() {
        let reply = classification_json(
            "structured_lookup",
            0.92,
            r#", "entity_type": "location_rate", "extracted_params": {"location": "Denver"}"#,
        );
        let provider = Arc::new(MockProvider::scripted(vec![Ok(reply)]));
        let c = classifier(provider.clone())
            .classify(&q("lodging rate in denver"), &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::StructuredLookup);
        assert_eq!(c.param("location"), Some("Denver"));
        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].expect_structured);
        assert!(requests[0].prompt.contains("location_rate"));
    }

    #[tokio::test]
    async fn test_low_confidence_lookup_becomes_clarification() {
        let reply = classification_json(
            "structured_lookup",
            0.5,
            r#", "entity_type": "location_rate""#,
        );
        let provider = Arc::new(MockProvider::scripted(vec![Ok(reply)]));
        let c = classifier(provider)
            .classify(&q("rate there?"), &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::ClarificationNeeded);
        assert_eq!(c.original_intent, Some(IntentType::StructuredLookup));
    }

    #[tokio::test]
    async fn test_malformed_then_strict_prompt_succeeds() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Ok("I think it is a definition".to_string()),
            Ok(classification_json("definition", 0.9, "")),
        ]));
        let c = classifier(provider.clone())
            .classify(&q("what is per diem"), &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::Definition);
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("ONLY the JSON"));
    }

    #[tokio::test]
    async fn test_malformed_twice_degrades() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Ok("nope".to_string()),
            Ok("still nope".to_string()),
        ]));
        let c = classifier(provider.clone())
            .classify(&q("anything"), &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::GeneralRag);
        assert_eq!(c.confidence, 0.0);
        assert!(c.degraded);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades_after_retries() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Err(ProviderError::Unreachable("refused".into())),
            Err(ProviderError::Unreachable("refused".into())),
        ]));
        let c = classifier(provider.clone())
            .classify(&q("anything"), &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::GeneralRag);
        assert!(c.degraded);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_decompose_parses_sub_questions() {
        let provider = Arc::new(MockProvider::scripted(vec![Ok(
            r#"{"sub_questions": ["Rate in Denver?", "Rate in Boulder?"]}"#.to_string(),
        )]));
        let subs = classifier(provider)
            .decompose("Denver vs Boulder", IntentType::Comparison, &CancellationToken::new())
            .await;
        assert_eq!(subs, vec!["Rate in Denver?", "Rate in Boulder?"]);
    }

    #[tokio::test]
    async fn test_decompose_failure_is_empty() {
        let provider = Arc::new(MockProvider::scripted(vec![Err(ProviderError::Http {
            status: 400,
            body: "bad".into(),
        })]));
        let subs = classifier(provider)
            .decompose("x", IntentType::MultiStep, &CancellationToken::new())
            .await;
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_body_then_strict_prompt_succeeds() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Err(ProviderError::Malformed("expected value at line 1".into())),
            Ok(classification_json("definition", 0.9, "")),
        ]));
        let c = classifier(provider.clone())
            .classify(&q("what is per diem"), &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::Definition);
        assert!(!c.degraded);
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("ONLY the JSON"));
    }

    #[tokio::test]
    async fn test_sub_question_classification_is_gated() {
        let reply = classification_json(
            "structured_lookup",
            0.3,
            r#", "entity_type": "location_rate", "extracted_params": {"location": "Denver"}"#,
        );
        let provider = Arc::new(MockProvider::scripted(vec![Ok(reply)]));
        let c = classifier(provider)
            .classify_text("lodging in denver?", &CancellationToken::new())
            .await;
        assert_eq!(c.intent_type, IntentType::ClarificationNeeded);
        assert_eq!(c.original_intent, Some(IntentType::StructuredLookup));
    }

    #[tokio::test]
    async fn test_low_confidence_sub_questions_never_become_lookups() {
        let sub_reply = |location: &str| {
            classification_json(
                "structured_lookup",
                0.3,
                &format!(
                    r#", "entity_type": "location_rate", "extracted_params": {{"location": "{}"}}"#,
                    location
                ),
            )
        };
        let provider = Arc::new(MockProvider::scripted(vec![
            Ok(sub_reply("Denver")),
            Ok(sub_reply("Boulder")),
        ]));
        let planner = QueryPlanner::new(Arc::new(classifier(provider)), 8);
        let parent = Classification::new(IntentType::Comparison, 0.9)
            .with_entity_type(EntityType::new("location_rate"))
            .with_sub_questions(vec![
                "Lodging rate in Denver?".to_string(),
                "Lodging rate in Boulder?".to_string(),
            ]);

        let plan = planner
            .plan(&q("Denver vs Boulder lodging"), &parent, None, &CancellationToken::new())
            .await;

        let targets: Vec<StepTarget> = plan.steps.iter().map(|s| s.target).collect();
        assert_eq!(
            targets,
            vec![StepTarget::RagExecutor, StepTarget::RagExecutor, StepTarget::Synthesizer]
        );
    }
}
