//! quake: ask grounded questions about an earthquake catalog.
//!
//! Loads every catalog file in a directory, indexes it, and answers from the
//! indexed events only, refusing when they hold no evidence.

mod config;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use quake_rag::document::{SNIPPET_CHARS, snippet};
use quake_rag::{Answer, DistanceMetric, OpenAIChatModel, QuakeRag, SearchHit};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{FileConfig, LlmConfig, Overrides, Settings};

/// Grounded question answering over INGV-style event catalogs
#[derive(Parser, Debug)]
#[command(name = "quake", version, about, long_about = None)]
struct Cli {
    /// Directory of `.txt` / `.csv` catalog files
    #[arg(short, long, env = "QUAKE_DATA_DIR", global = true)]
    data: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "QUAKE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Number of chunks to retrieve
    #[arg(short, long, global = true)]
    k: Option<usize>,

    /// Maximum chunk length in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Overlap between consecutive chunks in characters
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Embedding model identity (`hashing-384`, `fastembed:all-MiniLM-L6-v2`, `openai:text-embedding-3-small`, ...)
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Distance metric: l2, cosine, dot
    #[arg(long, global = true)]
    metric: Option<DistanceMetric>,

    /// Minimum similarity a retrieved chunk needs to count as evidence
    #[arg(long, global = true)]
    relevance_floor: Option<f32>,

    /// Chat model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Answer one question and exit
    Ask {
        /// The question, in any language
        question: String,

        /// Print the full answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive question loop
    Chat,
    /// Show what retrieval returns for a query, without calling a model
    Inspect {
        /// The query
        query: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            data_dir: self.data.clone(),
            top_k: self.k,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            embedding_model: self.embedding_model.clone(),
            distance_metric: self.metric,
            relevance_floor: self.relevance_floor,
            model: self.model.clone(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn chat_model(llm: &LlmConfig) -> Result<OpenAIChatModel> {
    let mut model = OpenAIChatModel::from_env()?;
    if let Some(base_url) = &llm.base_url {
        model = model.with_base_url(base_url);
    }
    if let Some(name) = &llm.model {
        model = model.with_model(name);
    }
    if let Some(secs) = llm.timeout_secs {
        model = model.with_timeout(Duration::from_secs(secs))?;
    }
    Ok(model)
}

async fn open_engine(settings: &Settings, with_model: bool) -> Result<QuakeRag> {
    let mut builder = QuakeRag::builder().config(settings.rag.clone());
    if with_model {
        let model = chat_model(&settings.llm)?;
        info!(model = %model.model(), "language model configured");
        builder = builder.language_model(Arc::new(model));
    }
    let engine = builder.build()?;

    let report = engine
        .ingest_dir(&settings.data_dir)
        .await
        .with_context(|| format!("failed to index {}", settings.data_dir.display()))?;
    if !report.rejected.is_empty() {
        warn!(rejected = report.rejected_count(), "some catalog rows were skipped");
    }
    for file in &report.skipped_files {
        warn!(file = %file.display(), "not a catalog file");
    }
    Ok(engine)
}

pub(crate) fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);
    if !answer.cited_record_ids.is_empty() {
        println!("\nSources: {}", answer.cited_record_ids.join(", "));
    }
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {} (score {:.4}, distance {:.4})\n    {}",
            rank + 1,
            hit.chunk.record_id,
            hit.score,
            hit.distance,
            snippet(&hit.chunk.text, SNIPPET_CHARS).replace('\n', " | ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let file = cli.config.as_deref().map(FileConfig::load).transpose()?;
    let settings = Settings::resolve(file, cli.overrides())?;
    let k = settings.rag.top_k;

    match cli.command {
        Command::Ask { question, json } => {
            let engine = open_engine(&settings, true).await?;
            let answer = engine.ask_with_k(&question, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::Chat => {
            let engine = open_engine(&settings, true).await?;
            repl::run(&engine, k).await?;
        }
        Command::Inspect { query } => {
            let engine = open_engine(&settings, false).await?;
            let hits = engine.retrieve(&query, k).await?;
            print_hits(&hits);
        }
    }

    Ok(())
}
