use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use brief_chat::ChatConfig;

mod commands;

/// Ask questions about the articles in a news briefing.
#[derive(Debug, Parser)]
#[command(name = "brief", version)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "BRIEF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer a single question and exit.
    Ask {
        #[command(flatten)]
        store: StoreArgs,

        /// The question to ask.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive session reading questions from stdin.
    Chat {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Chunk and embed an article, appending its records to a JSON store.
    Index(IndexArgs),

    /// Summarize and categorize an article.
    Summarize(SummarizeArgs),
}

#[derive(Debug, Args)]
pub(crate) struct StoreArgs {
    /// Embedding store (`.csv`, `.json`, or a list literal).
    #[arg(long)]
    pub store: PathBuf,

    /// Number of article sections retrieved per question.
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Only use articles added within this many days.
    #[arg(long, requires = "articles")]
    pub recent_days: Option<i64>,

    /// `articles.csv` export holding `UUID` and `date_added` columns.
    #[arg(long)]
    pub articles: Option<PathBuf>,

    /// Print the retrieved sections with their scores.
    #[arg(long)]
    pub show_sources: bool,
}

#[derive(Debug, Args)]
pub(crate) struct IndexArgs {
    /// JSON store to create or extend.
    #[arg(long)]
    pub store: PathBuf,

    /// Identifier of the article.
    #[arg(long)]
    pub article_uuid: String,

    /// File with the article body.
    #[arg(long)]
    pub text: PathBuf,

    /// Article title, used when a summary is generated.
    #[arg(long)]
    pub title: Option<String>,

    /// File with the article summary. Without it a summary is generated.
    #[arg(long, conflicts_with = "no_summary")]
    pub summary: Option<PathBuf>,

    /// Index the article body only.
    #[arg(long)]
    pub no_summary: bool,

    /// Words per chunk.
    #[arg(long, default_value_t = brief_embeddings::chunker::DEFAULT_WORDS_PER_CHUNK)]
    pub words_per_chunk: usize,

    /// Words shared by consecutive chunks.
    #[arg(long, default_value_t = brief_embeddings::chunker::DEFAULT_OVERLAP)]
    pub overlap: usize,
}

#[derive(Debug, Args)]
pub(crate) struct SummarizeArgs {
    /// File with the article body.
    #[arg(long)]
    pub text: PathBuf,

    /// Article title.
    #[arg(long)]
    pub title: Option<String>,

    /// Length of the summary in sentences.
    #[arg(long, default_value_t = brief_chat::summarize::DEFAULT_SUMMARY_SENTENCES)]
    pub sentences: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ChatConfig::from_file(path)
            .await
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ChatConfig::default(),
    };
    let config = config
        .resolve(|name| std::env::var(name).ok())
        .context("failed to resolve configuration")?;

    match cli.command {
        Command::Ask { store, question } => {
            commands::ask(config, &store, &question.join(" ")).await
        }
        Command::Chat { store } => commands::chat(config, &store).await,
        Command::Index(args) => commands::index(config, &args).await,
        Command::Summarize(args) => commands::summarize(config, &args).await,
    }
}
