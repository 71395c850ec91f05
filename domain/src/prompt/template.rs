//! Prompt templates for each pipeline stage

use crate::intent::{EntityType, IntentType};

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// Classification prompt enumerating every intent.
    pub fn classification(question: &str, entity_types: &[EntityType]) -> String {
        let intents = IntentType::ALL
            .iter()
            .map(|i| format!("- {}: {}", i.as_str(), i.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let entities = if entity_types.is_empty() {
            "(none loaded)".to_string()
        } else {
            entity_types
                .iter()
                .map(EntityType::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            r#"Classify the user's question into exactly one intent.

Intents:
{intents}

Structured entity types available: {entities}

Reply with a JSON object:
{{
  "intent_type": "<one of the intents above>",
  "entity_type": "<entity type, required for structured_lookup, otherwise null>",
  "extracted_params": {{"location": "...", "...": "..."}},
  "confidence": <number between 0 and 1>,
  "reasoning": "<one sentence>",
  "clarification_question": "<only for clarification_needed>"
}}

Question: {question}"#
        )
    }

    /// Retry prompt used after an unparsable classification reply.
    pub fn classification_strict(question: &str, entity_types: &[EntityType]) -> String {
        format!(
            "{}\n\nIMPORTANT: your previous reply could not be parsed. Respond with ONLY the JSON \
             object. No prose, no markdown fences, no comments. Use double quotes for every key \
             and string value.",
            Self::classification(question, entity_types)
        )
    }

    /// Splits a comparison or multi-step question into sub-questions.
    pub fn decomposition(question: &str, intent: IntentType) -> String {
        let guidance = match intent {
            IntentType::Comparison => {
                "Produce one self-contained sub-question per item being compared. \
                 Each must be answerable on its own."
            }
            _ => {
                "Produce the sub-questions in the order they must be answered. \
                 A later sub-question may rely on earlier answers."
            }
        };
        format!(
            r#"Break the question below into 2 to 4 simpler sub-questions.
{guidance}

Reply with JSON only: {{"sub_questions": ["...", "..."]}}

Question: {question}"#
        )
    }

    /// System prompt for answer generation.
    pub fn rag_system() -> &'static str {
        r#"You answer questions using only the numbered sources provided.
Cite sources inline as [n]. If the sources do not contain the answer, say that the
information is not available rather than guessing. Be concise and factual."#
    }

    /// Generation prompt over an assembled context.
    pub fn rag_answer(question: &str, context: &str) -> String {
        format!(
            r#"{}

Sources:
{}

Question: {}

Answer:"#,
            Self::rag_system(),
            context,
            question
        )
    }

    /// Combines sub-answers into one reply.
    pub fn synthesis(question: &str, partials: &[(String, String)]) -> String {
        let mut prompt = format!(
            "Combine the partial answers below into a single answer to the original question.\n\
             Keep any [n] citations and figures exactly as given. Do not add new facts.\n\n\
             Original question: {}\n",
            question
        );
        for (sub_question, answer) in partials {
            prompt.push_str(&format!("\n--- {} ---\n{}\n", sub_question, answer));
        }
        prompt.push_str("\nFinal answer:");
        prompt
    }
}
