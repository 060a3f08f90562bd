//! # Exam Prep CLI (`examprep`)
//!
//! Builds the passage and question indexes and queries them from the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! examprep --config ./config/examprep.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `examprep index corpus` | Chunk, embed and index the document corpus |
//! | `examprep index questions` | Embed and index the question bank |
//! | `examprep retrieve "<query>"` | Nearest passages for a query |
//! | `examprep recommend "<query>"` | Nearest practice questions with options |
//! | `examprep eval "<query>" --relevant "<q>"` | Score recommendations against known-relevant questions |
//! | `examprep stats` | Show what is indexed |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` level);
//! results go to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use examprep::chunk::TextChunker;
use examprep::config::{self, Config, OptionsPolicy};
use examprep::embedding::{self, EmbeddingProvider};
use examprep::eval;
use examprep::indexer::{ContentIndexer, QuestionIndexer};
use examprep::loader::DocumentLoader;
use examprep::questions::{CsvQuestionSource, QuestionSchema, QuestionTable};
use examprep::recommend::RecommendationService;
use examprep::retrieve::RetrievalService;
use examprep::stats;

/// Exam Prep: index textbooks and question banks, then retrieve passages
/// and recommend practice questions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/examprep.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "examprep",
    about = "Exam Prep: passage retrieval and practice-question recommendation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/examprep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index.
    ///
    /// Rebuilds replace the previous index atomically.
    Index {
        #[command(subcommand)]
        target: IndexTarget,
    },

    /// Retrieve the passages nearest to a query.
    Retrieve {
        query: String,

        /// Number of passages (defaults to `passages.top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Recommend practice questions for a query.
    Recommend {
        query: String,

        /// Number of questions (defaults to `questions.top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Score recommendations for a query against known-relevant questions.
    Eval {
        query: String,

        /// A question text that should be recommended. Repeatable.
        #[arg(long, required = true)]
        relevant: Vec<String>,

        #[arg(long)]
        k: Option<usize>,
    },

    /// Show index status.
    Stats,
}

#[derive(Subcommand)]
enum IndexTarget {
    /// Chunk, embed and index the document corpus.
    Corpus {
        /// Override `documents.root`.
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Embed and index the question bank.
    Questions {
        /// Override `questions.csv`.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { target } => match target {
            IndexTarget::Corpus { root } => {
                if let Some(root) = root {
                    cfg.documents.root = root;
                }
                run_index_corpus(&cfg)?;
            }
            IndexTarget::Questions { csv } => {
                if let Some(csv) = csv {
                    cfg.questions.csv = csv;
                }
                run_index_questions(&cfg)?;
            }
        },
        Commands::Retrieve { query, k } => {
            let k = k.unwrap_or(cfg.passages.top_k);
            let service = RetrievalService::new(cfg.passages.paths(), create_provider(&cfg)?);
            let passages = service.retrieve(&query, k)?;
            if passages.is_empty() {
                println!("No results.");
            }
            for (i, p) in passages.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {}",
                    i + 1,
                    p.distance,
                    p.source.as_deref().unwrap_or("-")
                );
                println!("   {}", p.text);
            }
        }
        Commands::Recommend { query, k } => {
            let k = k.unwrap_or(cfg.questions.top_k);
            let service = recommendation_service(&cfg, create_provider(&cfg)?);
            let recs = service.recommend(&query, k)?;
            if recs.is_empty() {
                println!("No results.");
            }
            for (i, r) in recs.iter().enumerate() {
                match &r.subject {
                    Some(subject) => {
                        println!("{}. [{:.4}] ({}) {}", i + 1, r.distance, subject, r.question)
                    }
                    None => println!("{}. [{:.4}] {}", i + 1, r.distance, r.question),
                }
                for (letter, choice) in ('a'..='z').zip(r.choices()) {
                    println!("   {}) {}", letter, choice);
                }
            }
        }
        Commands::Eval { query, relevant, k } => {
            let k = k.unwrap_or(cfg.questions.top_k);
            let provider = create_provider(&cfg)?;
            let service = recommendation_service(&cfg, Arc::clone(&provider));
            let recommended: Vec<String> = service
                .recommend(&query, k)?
                .into_iter()
                .map(|r| r.question)
                .collect();
            let report = eval::evaluate(provider.as_ref(), &recommended, &relevant, k)?;
            println!("eval (k={})", report.k);
            println!("  recommended: {}", recommended.len());
            println!("  precision@{}: {:.4}", report.k, report.precision);
            println!("  recall@{}: {:.4}", report.k, report.recall);
            println!("  similarity: {:.4}", report.similarity);
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
    }

    Ok(())
}

fn create_provider(cfg: &Config) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::from(embedding::create_provider(&cfg.embedding)?))
}

fn recommendation_service(
    cfg: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> RecommendationService {
    match cfg.questions.options {
        OptionsPolicy::Persisted => RecommendationService::new(cfg.questions.paths(), provider),
        OptionsPolicy::Reload => RecommendationService::with_reload(
            cfg.questions.paths(),
            provider,
            Arc::new(CsvQuestionSource::new(&cfg.questions.csv)),
            QuestionSchema::from_config(&cfg.questions),
        ),
    }
}

fn run_index_corpus(cfg: &Config) -> anyhow::Result<()> {
    let documents = DocumentLoader::from_config(&cfg.documents)?.load()?;
    let chunker = TextChunker::from_config(&cfg.chunking)?;
    let indexer = ContentIndexer::new(chunker, create_provider(cfg)?, cfg.passages.paths());
    let report = indexer.index_corpus(&documents)?;

    println!("index corpus");
    println!("  documents: {}", report.inputs);
    println!("  skipped: {}", report.skipped);
    println!("  chunks indexed: {}", report.indexed);
    println!("  model: {} ({} dims)", report.model, report.dims);
    println!("  output: {}", indexer.paths().dir().display());
    println!("ok");
    Ok(())
}

fn run_index_questions(cfg: &Config) -> anyhow::Result<()> {
    let table = QuestionTable::from_csv_path(&cfg.questions.csv)?;
    let indexer = QuestionIndexer::new(
        QuestionSchema::from_config(&cfg.questions),
        create_provider(cfg)?,
        cfg.questions.paths(),
    );
    let report = indexer.index_questions(&table)?;

    println!("index questions");
    println!("  rows: {}", report.inputs);
    println!("  skipped: {}", report.skipped);
    println!("  questions indexed: {}", report.indexed);
    println!("  model: {} ({} dims)", report.model, report.dims);
    println!("  output: {}", indexer.paths().dir().display());
    println!("ok");
    Ok(())
}
