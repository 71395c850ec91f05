//! Classification parsing from provider replies.
//!
//! Extracts a structured [`Classification`] from a language model reply.
//! Providers are asked for bare JSON, but replies routinely arrive wrapped in
//! prose or a fenced block, so three shapes are accepted:
//!
//! 1. ` ```json` (or bare ` ``` `) fenced block containing an object
//! 2. The entire reply as a JSON object
//! 3. The first balanced `{ ... }` span inside the reply

use super::classification::{Classification, EntityType, IntentType, clamp_unit};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse a classification from a provider reply.
///
/// Returns `None` when no JSON object with a recognizable intent is found;
/// callers treat that as malformed output.
///
/// A `structured_lookup` reply that omits `entity_type` is downgraded to
/// `general_rag` rather than rejected.
pub fn parse_classification(reply: &str) -> Option<Classification> {
    let json = extract_json(reply)?;
    parse_classification_json(&json)
}

/// Parse a classification from an already-decoded JSON value.
pub fn parse_classification_json(json: &Value) -> Option<Classification> {
    let intent_str = json
        .get("intent_type")
        .or_else(|| json.get("intent"))?
        .as_str()?;
    let intent: IntentType = intent_str.parse().ok()?;

    let confidence = json.get("confidence").map(parse_confidence).unwrap_or(0.0);
    let reasoning = json
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut classification = Classification::new(intent, confidence).with_reasoning(reasoning);

    if let Some(params) = json.get("extracted_params").and_then(Value::as_object) {
        let mut map = BTreeMap::new();
        for (key, value) in params {
            if let Some(s) = json_value_to_string(value) {
                map.insert(key.clone(), s);
            }
        }
        classification.extracted_params = map;
    }

    if let Some(entity) = json
        .get("entity_type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null")
    {
        classification.entity_type = Some(EntityType::new(entity));
    }

    if let Some(subs) = json.get("sub_questions") {
        classification.sub_questions = string_list(subs);
    }

    classification.clarification_question = json
        .get("clarification_question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if classification.intent_type == IntentType::StructuredLookup
        && classification.entity_type.is_none()
    {
        classification.intent_type = IntentType::GeneralRag;
        classification.reasoning = format!(
            "{} [downgraded: structured_lookup without entity_type]",
            classification.reasoning
        )
        .trim()
        .to_string();
    }

    Some(classification)
}

/// Parse a decomposition reply into a list of sub-questions.
///
/// Accepts a JSON array of strings or an object with a `sub_questions`
/// array. Blank entries are dropped.
pub fn parse_sub_questions(reply: &str) -> Vec<String> {
    if let Some(json) = extract_json(reply)
        && let Some(subs) = json.get("sub_questions")
    {
        return string_list(subs);
    }

    let trimmed = strip_fence(reply).unwrap_or(reply).trim();
    if let Some(start) = trimmed.find('[')
        && let Some(end) = trimmed.rfind(']')
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end])
    {
        return string_list(&value);
    }

    Vec::new()
}

fn extract_json(reply: &str) -> Option<Value> {
    if let Some(block) = strip_fence(reply)
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(block.trim())
    {
        return Some(value);
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(reply.trim()) {
        return Some(value);
    }

    let span = first_object_span(reply)?;
    match serde_json::from_str::<Value>(span) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Contents of the first fenced code block, if any.
fn strip_fence(reply: &str) -> Option<&str> {
    let start = reply.find("```")?;
    let after = &reply[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// The first balanced `{ ... }` span, honoring string literals.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_confidence(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    // Some models answer in percent.
    let scaled = if raw > 1.0 && raw <= 100.0 { raw / 100.0 } else { raw };
    clamp_unit(scaled)
}

fn json_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_json() {
        let reply = r#"{"intent_type": "structured_lookup", "entity_type": "location_rate",
            "extracted_params": {"location": "Denver", "year": 2025},
            "confidence": 0.92, "reasoning": "asks for a rate"}"#;
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.intent_type, IntentType::StructuredLookup);
        assert_eq!(c.entity_type, Some(EntityType::new("location_rate")));
        assert_eq!(c.param("location"), Some("Denver"));
        assert_eq!(c.param("year"), Some("2025"));
        assert!((c.confidence - 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let reply = "Sure! Here is the classification:\n```json\n{\"intent_type\": \"how_to\", \"confidence\": 0.8}\n```\nHope that helps.";
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.intent_type, IntentType::HowTo);
    }

    #[test]
    fn test_parse_embedded_object() {
        let reply = r#"Classification: {"intent": "definition", "confidence": "85%", "reasoning": "uses {braces} in text"} done"#;
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.intent_type, IntentType::Definition);
        assert!((c.confidence - 0.85).abs() < 1e-9);
        assert_eq!(c.reasoning, "uses {braces} in text");
    }

    #[test]
    fn test_lookup_without_entity_type_downgraded() {
        let reply = r#"{"intent_type": "structured_lookup", "confidence": 0.9}"#;
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.intent_type, IntentType::GeneralRag);
        assert!(c.reasoning.contains("downgraded"));
    }

    #[test]
    fn test_unknown_intent_is_malformed() {
        assert!(parse_classification(r#"{"intent_type": "weather"}"#).is_none());
        assert!(parse_classification("I think this is a lookup").is_none());
    }

    #[test]
    fn test_missing_confidence_is_zero() {
        let c = parse_classification(r#"{"intent_type": "general_rag"}"#).unwrap();
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_sub_questions_from_object_and_array() {
        let object = r#"{"sub_questions": ["Rate for Denver?", " ", "Rate for Boulder?"]}"#;
        assert_eq!(
            parse_sub_questions(object),
            vec!["Rate for Denver?", "Rate for Boulder?"]
        );

        let array = "```json\n[\"What is X?\", \"How does X work?\"]\n```";
        assert_eq!(parse_sub_questions(array), vec!["What is X?", "How does X work?"]);

        assert!(parse_sub_questions("no list here").is_empty());
    }
}
