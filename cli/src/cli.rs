//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for ragline
#[derive(Parser, Debug)]
#[command(name = "ragline")]
#[command(author, version, about = "Answer questions over crawled documents and rate tables")]
#[command(long_about = r#"
ragline classifies a question, plans how to answer it, runs structured
lookups and/or document search, and validates the result before answering.

Configuration files are loaded from (in priority order):
1. RAGLINE_<SECTION>__<KEY>   Environment overrides
2. --config <path>            Explicit config file
3. ./ragline.toml             Project-level config
4. ~/.config/ragline/config.toml   Global config

Example:
  ragline ask "What is the lodging rate in Denver, CO?"
  ragline ask --sse "Compare meal rates in Boulder and Aspen"
  ragline resolve location_rate "arapahoe county"
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a question through the full pipeline
    Ask {
        question: String,

        /// Session identifier echoed in the transcript and answer metadata
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Print events as `event:`/`data:` frames
        #[arg(long, conflicts_with = "sync")]
        sse: bool,

        /// Skip the event stream and print only the final answer
        #[arg(long)]
        sync: bool,

        /// Print the final answer as JSON (implies --sync)
        #[arg(long)]
        json: bool,
    },

    /// Classify a question without answering it
    Classify { question: String },

    /// Resolve a value against the loaded dataset
    Resolve {
        /// Table to search, e.g. location_rate
        entity_type: String,
        text: String,
    },

    /// Score an answer the way the pipeline would
    Validate {
        question: String,

        #[arg(long)]
        answer: String,

        /// Source URL backing the answer (repeatable)
        #[arg(long = "citation", value_name = "URL")]
        citations: Vec<String>,

        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
    },

    /// Check provider and store reachability
    Health,

    /// Show configuration sources and validation issues
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_flags() {
        let cli = Cli::try_parse_from(["ragline", "-vv", "ask", "--sse", "--session", "s1", "q?"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Ask {
                question,
                session,
                sse,
                sync,
                json,
            } => {
                assert_eq!(question, "q?");
                assert_eq!(session.as_deref(), Some("s1"));
                assert!(sse && !sync && !json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sse_conflicts_with_sync() {
        assert!(Cli::try_parse_from(["ragline", "ask", "--sse", "--sync", "q"]).is_err());
    }

    #[test]
    fn test_parse_validate_citations() {
        let cli = Cli::try_parse_from([
            "ragline",
            "validate",
            "rate in Denver?",
            "--answer",
            "$199",
            "--citation",
            "https://a.example",
            "--citation",
            "https://b.example",
            "--no-config",
        ])
        .unwrap();
        assert!(cli.no_config);
        let Command::Validate { citations, confidence, .. } = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(citations.len(), 2);
        assert_eq!(confidence, 1.0);
    }
}
