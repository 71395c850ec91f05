//! CLI entrypoint for ragline
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod cli;
mod logging;
mod output;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use output::ConsoleFormatter;
use ragline_application::{AskPipeline, PipelineParams, TranscriptLogger};
use ragline_domain::{
    Citation, ConfigIssue, DatasetSnapshot, EntityType, EventType, FinalAnswer, OutputFormat,
    PipelineEvent, Question, Severity, StepResult, StructuredResolver,
};
use ragline_infrastructure::{
    ConfigLoader, DatasetLoader, FileConfig, JsonlTranscriptLogger, OllamaProvider, QdrantStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };

    let _log_guard = logging::init(cli.verbose, config.logging.dir.as_deref());
    if !config.output.color {
        colored::control::set_override(false);
    }

    info!("Starting ragline");

    let issues = config.validate();
    if let Command::Config = cli.command {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        println!();
        if issues.is_empty() {
            println!("No configuration issues.");
        }
        for issue in &issues {
            println!("{}", ConsoleFormatter::format_issue(issue));
        }
        return Ok(());
    }
    check_issues(&issues)?;

    // === Dependency Injection ===
    let params = config.to_pipeline_params();
    let snapshot = Arc::new(DatasetLoader::load_optional(config.dataset.path.as_deref())?);

    if let Command::Resolve { entity_type, text } = &cli.command {
        let resolver = StructuredResolver::new(params.resolver);
        match resolver.resolve(&snapshot, &EntityType::new(entity_type.as_str()), text) {
            Ok(result) => print!("{}", ConsoleFormatter::format_lookup(&result)),
            Err(e) => bail!("{}", e),
        }
        return Ok(());
    }

    let pipeline = build_pipeline(&config, snapshot, &params)?;
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.command {
        Command::Ask {
            question,
            session,
            sse,
            sync,
            json,
        } => {
            let mut question = Question::try_new(question).context("Question must not be empty")?;
            if let Some(session) = session {
                question = question.with_session(session);
            }
            let format = if json {
                OutputFormat::Json
            } else if sse {
                OutputFormat::Sse
            } else {
                config.output.format.unwrap_or_default()
            };
            if sync || !format.is_streaming() {
                run_sync(&pipeline, &question, cancel, format).await
            } else {
                run_streaming(&pipeline, question, cancel, format).await
            }
        }
        Command::Classify { question } => {
            let question = Question::try_new(question).context("Question must not be empty")?;
            let classification = pipeline.classifier().classify(&question, &cancel).await;
            print!("{}", ConsoleFormatter::format_classification(&classification));
            Ok(())
        }
        Command::Validate {
            question,
            answer,
            citations,
            confidence,
        } => {
            let question = Question::try_new(question).context("Question must not be empty")?;
            let citations = citations
                .into_iter()
                .map(|url| Citation::new(url.clone(), url))
                .collect();
            let step = StepResult::text(answer, confidence, citations);
            let result = pipeline.validator().validate(&question, &step);
            print!("{}", ConsoleFormatter::format_validation(&result));
            Ok(())
        }
        Command::Health => {
            let report = pipeline.health().await;
            print!("{}", ConsoleFormatter::format_health(&report));
            Ok(())
        }
        Command::Resolve { .. } | Command::Config => Ok(()),
    }
}

fn check_issues(issues: &[ConfigIssue]) -> Result<()> {
    for issue in issues {
        match issue.severity {
            Severity::Warning => warn!("{}", issue.message),
            Severity::Error => eprintln!("{}", ConsoleFormatter::format_issue(issue)),
        }
    }
    if ConfigIssue::has_errors(issues) {
        bail!("Invalid configuration, run `ragline config` for details");
    }
    Ok(())
}

fn build_pipeline(
    config: &FileConfig,
    snapshot: Arc<DatasetSnapshot>,
    params: &PipelineParams,
) -> Result<AskPipeline> {
    let provider = Arc::new(OllamaProvider::new(&config.provider)?);
    let store = Arc::new(QdrantStore::new(&config.store)?);

    let mut pipeline = AskPipeline::new(provider.clone(), provider, store, snapshot, params);

    if let Some(path) = &config.logging.transcript {
        match JsonlTranscriptLogger::new(path) {
            Some(logger) => {
                let logger: Arc<dyn TranscriptLogger> = Arc::new(logger);
                pipeline = pipeline.with_transcript(logger);
            }
            None => warn!("Transcript disabled, could not open {}", path.display()),
        }
    }

    Ok(pipeline)
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            cancel.cancel();
        }
    });
}

async fn run_sync(
    pipeline: &AskPipeline,
    question: &Question,
    cancel: CancellationToken,
    format: OutputFormat,
) -> Result<()> {
    let answer = pipeline.ask(question, cancel).await?;
    match format {
        OutputFormat::Json => println!("{}", ConsoleFormatter::format_answer_json(&answer)),
        OutputFormat::Sse => print!("{}", PipelineEvent::final_answer(&answer).to_sse()),
        OutputFormat::Human => print!("{}", ConsoleFormatter::format_answer(&answer)),
    }
    Ok(())
}

async fn run_streaming(
    pipeline: &AskPipeline,
    question: Question,
    cancel: CancellationToken,
    format: OutputFormat,
) -> Result<()> {
    let mut events = pipeline.ask_streaming(question, cancel);
    let mut failed = false;

    while let Some(event) = events.recv().await {
        match format {
            OutputFormat::Sse => print!("{}", event.to_sse()),
            _ => {
                println!("{}", ConsoleFormatter::format_event(&event));
                if event.event_type == EventType::FinalAnswer
                    && let Some(answer) = event
                        .data
                        .clone()
                        .and_then(|data| serde_json::from_value::<FinalAnswer>(data).ok())
                {
                    print!("{}", ConsoleFormatter::format_answer(&answer));
                }
            }
        }
        if event.event_type == EventType::Error {
            failed = true;
        }
    }

    if failed {
        bail!("Request failed");
    }
    Ok(())
}
