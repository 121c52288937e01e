//! # docchat CLI
//!
//! The `docchat` binary exposes the engine as an HTTP server or as
//! one-shot commands that index a document and run against it in a
//! single process (the index is in-memory only and does not persist).
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the HTTP API server |
//! | `docchat ask <file> <question>` | Index a document and answer a question |
//! | `docchat eval <file>` | Index a document and report retrieval quality |
//! | `docchat validate <query>` | Run the guardrail against a query |
//!
//! ## Examples
//!
//! ```bash
//! docchat --config docchat.toml serve
//! docchat ask report.pdf "What were the key findings?"
//! docchat ask notes.txt --strategy sentence "Who attended the meeting?"
//! docchat eval report.pdf --strategy medium
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use docchat::config::{self, Config};
use docchat::engine::Engine;
use docchat::server;

#[derive(Parser)]
#[command(name = "docchat", version, about = "Document question-answering with RAG")]
struct Cli {
    /// Path to the TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server.
    Serve,
    /// Index a document and answer a question about it.
    Ask {
        /// Document to index (pdf, txt, or md).
        file: PathBuf,
        /// The question to answer.
        question: String,
        /// Chunking strategy: fixed, medium, or sentence.
        #[arg(long, default_value = "fixed")]
        strategy: String,
    },
    /// Index a document and evaluate retrieval quality on it.
    Eval {
        /// Document to index (pdf, txt, or md).
        file: PathBuf,
        /// Chunking strategy: fixed, medium, or sentence.
        #[arg(long, default_value = "fixed")]
        strategy: String,
    },
    /// Check a query against the guardrail without running it.
    Validate {
        /// The query to validate.
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docchat=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Serve => {
            let engine = Arc::new(Engine::new(config)?);
            server::run_server(engine).await?;
        }
        Command::Ask {
            file,
            question,
            strategy,
        } => {
            let engine = Engine::new(config)?;
            let summary = engine.load_and_index(&file, &strategy).await?;
            eprintln!(
                "Indexed {} chunks ({} strategy).",
                summary.num_chunks, summary.strategy
            );

            let answer = engine.query(&question).await?;
            println!("{}", answer.answer);
            println!();
            for (i, source) in answer.sources.iter().enumerate() {
                let excerpt: String = source.content.chars().take(120).collect();
                println!(
                    "  [{}] page {}: \"{}\"",
                    i + 1,
                    source.page,
                    excerpt.replace('\n', " ").trim()
                );
            }
        }
        Command::Eval { file, strategy } => {
            let engine = Engine::new(config)?;
            let summary = engine.load_and_index(&file, &strategy).await?;
            eprintln!(
                "Indexed {} chunks ({} strategy).",
                summary.num_chunks, summary.strategy
            );

            let result = engine.run_evaluation().await?;
            println!("Hit Rate: {:.2}", result.hit_rate);
            println!("MRR:      {:.2}", result.mrr);
            println!("Queries:  {} ({} hits)", result.total_queries, result.hits);
            println!();
            for record in &result.details {
                let rank = record
                    .first_relevant_rank
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {} rank={} retrieved={} \"{}\"",
                    if record.hit { "hit " } else { "miss" },
                    rank,
                    record.num_chunks_retrieved,
                    record.question
                );
            }
        }
        Command::Validate { query } => {
            let engine = Engine::new(config)?;
            let verdict = engine.validate(&query);
            if verdict.is_safe {
                println!("safe");
            } else {
                println!("rejected: {}", verdict.reason);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
