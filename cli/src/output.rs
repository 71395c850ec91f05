//! Console output formatting

use chrono::Local;
use colored::Colorize;
use ragline_application::HealthReport;
use ragline_domain::{
    Classification, ConfigIssue, Decision, EventType, FinalAnswer, LookupResult, PipelineEvent, Severity,
    ValidationResult,
};

/// Formats pipeline results for the terminal
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One line per event: `HH:MM:SS type content`
    pub fn format_event(event: &PipelineEvent) -> String {
        let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
        let label = format!("{:<12}", event.event_type.as_str());
        let label = match event.event_type {
            EventType::Thought => label.dimmed(),
            EventType::Action => label.cyan(),
            EventType::Observation => label.blue(),
            EventType::Validation => label.yellow(),
            EventType::FinalAnswer => label.green().bold(),
            EventType::Error => label.red().bold(),
        };
        let content = if event.event_type == EventType::FinalAnswer {
            "(see below)".dimmed().to_string()
        } else {
            event.content.clone()
        };
        format!("{} {} {}", time.to_string().dimmed(), label, content)
    }

    pub fn format_answer(answer: &FinalAnswer) -> String {
        let mut output = String::new();

        let title = if answer.is_clarification() {
            "Clarification needed".yellow().bold()
        } else {
            "Answer".green().bold()
        };
        output.push_str(&format!("\n{}\n{}\n", title, "-".repeat(40)));
        output.push_str(&answer.answer);
        output.push('\n');

        if !answer.citations.is_empty() {
            output.push_str(&format!("\n{}\n", "Sources:".cyan().bold()));
            for (i, citation) in answer.citations.iter().enumerate() {
                output.push_str(&format!("  [{}] {} <{}>\n", i + 1, citation.title, citation.url));
            }
        }

        let mut footer = format!("confidence {:.2}", answer.confidence);
        if let Some(meta) = &answer.metadata {
            footer.push_str(&format!(
                " | intent {} | attempts {} | {} ms | request {}",
                meta.intent, meta.attempts, meta.elapsed_ms, meta.request_id
            ));
        }
        output.push_str(&format!("\n{}\n", footer.dimmed()));
        output
    }

    pub fn format_answer_json(answer: &FinalAnswer) -> String {
        serde_json::to_string_pretty(answer).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn format_classification(classification: &Classification) -> String {
        let mut output = format!(
            "{} {} ({:.2})\n",
            "Intent:".cyan().bold(),
            classification.intent_type.as_str(),
            classification.confidence
        );
        if let Some(entity_type) = &classification.entity_type {
            output.push_str(&format!("{} {}\n", "Entity type:".cyan().bold(), entity_type));
        }
        for (key, value) in &classification.extracted_params {
            output.push_str(&format!("  {} = {}\n", key, value));
        }
        if !classification.sub_questions.is_empty() {
            output.push_str(&format!("{}\n", "Sub-questions:".cyan().bold()));
            for q in &classification.sub_questions {
                output.push_str(&format!("  - {}\n", q));
            }
        }
        if let Some(original) = classification.original_intent {
            output.push_str(&format!(
                "{}\n",
                format!("below the confidence gate, provider said {}", original.as_str()).yellow()
            ));
        }
        if classification.degraded {
            output.push_str(&format!("{}\n", "provider unavailable, fallback classification".red()));
        }
        if !classification.reasoning.is_empty() {
            output.push_str(&format!("{}\n", classification.reasoning.dimmed()));
        }
        output
    }

    pub fn format_lookup(result: &LookupResult) -> String {
        let mut output = format!(
            "{} {} ({}, score {:.1})\n",
            "Match:".green().bold(),
            result.candidate.canonical_key,
            result.candidate.match_type.as_str(),
            result.candidate.score
        );
        for (field, value) in &result.payload {
            output.push_str(&format!("  {}: {}\n", field, value));
        }
        if let Some(note) = &result.note {
            output.push_str(&format!("{}\n", note.yellow()));
        }
        for citation in &result.citations {
            output.push_str(&format!("  {} {}\n", "source".dimmed(), citation.source_url));
        }
        output
    }

    pub fn format_validation(result: &ValidationResult) -> String {
        let decision = match result.decision {
            Decision::Accept => result.decision.as_str().green().bold(),
            Decision::Retry => result.decision.as_str().yellow().bold(),
            Decision::Clarify => result.decision.as_str().red().bold(),
        };
        let b = &result.breakdown;
        let mut output = format!("{} {} (score {:.3})\n", "Decision:".cyan().bold(), decision, result.score);
        output.push_str(&format!(
            "  relevance {:.2} | completeness {:.2} | citation {:.2} | accuracy {:.2}\n",
            b.relevance, b.completeness, b.citation, b.accuracy
        ));
        for issue in &result.issues {
            output.push_str(&format!("  - {}\n", issue));
        }
        if let Some(clarification) = &result.clarification {
            output.push_str(&format!("{} {}\n", "Ask:".yellow().bold(), clarification.question));
        }
        output
    }

    pub fn format_health(report: &HealthReport) -> String {
        let status = if report.is_healthy() {
            report.status().green().bold()
        } else {
            report.status().red().bold()
        };
        let mut output = format!("{} {}\n", "Status:".cyan().bold(), status);
        match &report.provider {
            Ok(models) => output.push_str(&format!("  provider ok ({})\n", models.join(", "))),
            Err(e) => output.push_str(&format!("  provider {}: {}\n", "down".red(), e)),
        }
        match &report.store {
            Ok(()) => output.push_str("  store ok\n"),
            Err(e) => output.push_str(&format!("  store {}: {}\n", "down".red(), e)),
        }
        output
    }

    pub fn format_issue(issue: &ConfigIssue) -> String {
        match issue.severity {
            Severity::Error => format!("{} {}", "error:".red().bold(), issue.message),
            Severity::Warning => format!("{} {}", "warning:".yellow().bold(), issue.message),
        }
    }
}
