//! `docqa` - ask questions about a local text file.
//!
//! ```bash
//! docqa ask manual.txt "how often should the filter be replaced?"
//! docqa search manual.txt "filter cartridge" --k 5
//! docqa chunks manual.txt
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docqa_core::config::{expand_path, Config, Settings};
use docqa_core::data_processor::DataProcessor;
use docqa_core::session::SessionStore;
use docqa_core::traits::Embedder;
use docqa_core::types::Retrieval;
use docqa_embed::embedder_from_settings;
use docqa_hybrid::{Ingestor, Retriever};
use docqa_text::Bm25Index;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Hybrid dense + BM25 retrieval over a document")]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a document and retrieve the passages for a question
    Ask {
        path: String,
        question: String,
        /// Print the retrieval as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// BM25-only ranking, for checking lexical matches
    Search {
        path: String,
        query: String,
        #[arg(short, long, default_value_t = 10)]
        k: usize,
    },
    /// Show how a document is split into chunks
    Chunks { path: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;

    match cli.command {
        Command::Ask {
            path,
            question,
            json,
            session,
        } => ask(&settings, &expand_path(path), &question, json, &session),
        Command::Search { path, query, k } => search(&settings, &expand_path(path), &query, k),
        Command::Chunks { path } => chunks(&settings, &expand_path(path)),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn ask(settings: &Settings, path: &Path, question: &str, json: bool, session: &str) -> Result<()> {
    let embedder = Arc::new(embedder_from_settings(&settings.embedding)?);
    let store = Arc::new(SessionStore::from_settings(&settings.session));
    let ingestor = Ingestor::new(
        Arc::clone(&embedder),
        DataProcessor::with_config(settings.chunking.clone()),
        Arc::clone(&store),
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks",
            )?
            .progress_chars("#>-"),
    );
    let document = ingestor
        .ingest_path(session, path, |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .with_context(|| format!("ingesting {}", path.display()))?;
    pb.finish_and_clear();
    info!(chunks = document.len(), version = %document.version, "document ready");

    let query_embedder: Arc<dyn Embedder> = embedder;
    let retriever = Retriever::new(query_embedder, settings.retrieval.clone())?;
    let retrieval = retriever.retrieve_session(store.as_ref(), session, question)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&retrieval)?);
    } else {
        print_retrieval(&retrieval);
    }
    Ok(())
}

fn print_retrieval(retrieval: &Retrieval) {
    if let Some(degraded) = &retrieval.degraded {
        println!("note: degraded retrieval ({degraded:?})");
    }
    if retrieval.passages.is_empty() {
        println!("No relevant passages found for: {}", retrieval.question);
        return;
    }
    println!("Passages for: {}\n", retrieval.question);
    for (rank, passage) in retrieval.passages.iter().enumerate() {
        let page = passage.page.map(|p| format!(" page {p}")).unwrap_or_default();
        println!(
            "#{} chunk {}{} (rrf {:.5})",
            rank + 1,
            passage.chunk_id,
            page,
            passage.fused_score
        );
        println!("{}\n", passage.text);
    }
}

fn search(settings: &Settings, path: &Path, query: &str, k: usize) -> Result<()> {
    let processor = DataProcessor::with_config(settings.chunking.clone());
    let chunks = processor.process_path(path)?;
    let index = Bm25Index::build(&chunks)?;
    for (rank, (id, score)) in index.search(query, k)?.into_iter().enumerate() {
        println!("{:>3}. [{id}] {score:.4}  {}", rank + 1, preview(&chunks[id].text, 80));
    }
    Ok(())
}

fn chunks(settings: &Settings, path: &Path) -> Result<()> {
    let processor = DataProcessor::with_config(settings.chunking.clone());
    let chunks = processor.process_path(path)?;
    for chunk in &chunks {
        let page = chunk
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] page {page}, {} chars: {}",
            chunk.id,
            chunk.text.chars().count(),
            preview(&chunk.text, 60)
        );
    }
    println!("{} chunks", chunks.len());
    Ok(())
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}
