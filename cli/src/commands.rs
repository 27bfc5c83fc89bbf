use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use brief_chat::{
    ArticleSummarizer, CancellationToken, ChatConfig, ChatError, ChatPipeline, CompletionClient,
    OpenAiChatClient, Session, Turn,
};
use brief_embeddings::{
    ArticleIndexer, EmbeddingProvider, EmbeddingStore, OpenAIProvider, TokenCounter,
    filter_recent, load_publication_dates,
};

use crate::{IndexArgs, StoreArgs, SummarizeArgs};

/// Ctrl-C presses, one message per press.
type Interrupts = mpsc::UnboundedReceiver<()>;

/// Install one Ctrl-C handler for the rest of the process.
///
/// Once installed, Ctrl-C no longer terminates the process, so every await
/// point that should react to it must also poll the returned receiver.
fn listen_for_interrupts() -> Interrupts {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

async fn load_store(args: &StoreArgs) -> Result<EmbeddingStore> {
    let store = EmbeddingStore::load(&args.store)
        .await
        .with_context(|| format!("failed to load store {}", args.store.display()))?;

    let (Some(days), Some(articles)) = (args.recent_days, &args.articles) else {
        return Ok(store);
    };

    let file = std::fs::File::open(articles)
        .with_context(|| format!("failed to open {}", articles.display()))?;
    let dates = load_publication_dates(file)?;
    let total = store.len();
    let now = chrono::Local::now().naive_local();
    let recent = EmbeddingStore::from_records(filter_recent(store.into_records(), &dates, days, now))?;
    info!(
        "Kept {} of {total} records from the last {days} days",
        recent.len()
    );
    Ok(recent)
}

fn pipeline(
    config: &ChatConfig,
    args: &StoreArgs,
    store: EmbeddingStore,
) -> Result<ChatPipeline<OpenAIProvider, OpenAiChatClient>> {
    let mut config = config.clone();
    if let Some(top_n) = args.top_n {
        config = config.with_top_n(top_n);
    }
    if store.is_empty() {
        warn!("Embedding store is empty; answers will have no article context");
    }
    Ok(ChatPipeline::from_config(Arc::new(store), &config)?)
}

fn summarizer(
    config: &ChatConfig,
    tokens: TokenCounter,
) -> Result<ArticleSummarizer<OpenAiChatClient>> {
    let api_key = config.api_key.clone().context("no API key configured")?;
    let client = OpenAiChatClient::new(api_key)
        .with_base_url(config.base_url.clone())
        .with_model(config.chat_model.clone())
        .with_temperature(config.temperature);
    Ok(ArticleSummarizer::new(client, tokens))
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn write_turn<W>(output: &mut W, turn: &Turn, show_sources: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if show_sources {
        for source in &turn.sources {
            let line = format!(
                "[{:.3}] {}: {}\n",
                source.score, source.embedding_uuid, source.text
            );
            output.write_all(line.as_bytes()).await?;
        }
    }
    output.write_all(turn.reply.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

/// Run one turn, cancelling it when an interrupt arrives.
async fn run_turn<E, C>(
    pipeline: &ChatPipeline<E, C>,
    session: &Session,
    question: &str,
    interrupts: &mut Interrupts,
) -> brief_chat::Result<Turn>
where
    E: EmbeddingProvider,
    C: CompletionClient,
{
    let cancel = CancellationToken::new();
    let turn = pipeline.process_turn(session, question, &cancel);
    tokio::pin!(turn);

    tokio::select! {
        result = &mut turn => result,
        Some(()) = interrupts.recv() => {
            cancel.cancel();
            turn.await
        }
    }
}

/// Read questions line by line until EOF, `/quit`, or an interrupt at the
/// prompt. An interrupt during a turn only cancels that turn.
async fn repl<E, C, R, W>(
    pipeline: &ChatPipeline<E, C>,
    mut session: Session,
    input: R,
    output: &mut W,
    interrupts: &mut Interrupts,
    show_sources: bool,
) -> Result<Session>
where
    E: EmbeddingProvider,
    C: CompletionClient,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(()) = interrupts.recv() => break,
        };
        let Some(line) = line else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "/quit" | "/exit") {
            break;
        }

        match run_turn(pipeline, &session, question, interrupts).await {
            Ok(turn) => {
                write_turn(output, &turn, show_sources).await?;
                session = turn.session;
            }
            Err(ChatError::Cancelled { .. }) => output.write_all(b"(cancelled)\n").await?,
            Err(err) => output.write_all(format!("error: {err}\n").as_bytes()).await?,
        }
    }

    Ok(session)
}

pub(crate) async fn ask(config: ChatConfig, args: &StoreArgs, question: &str) -> Result<()> {
    let store = load_store(args).await?;
    let pipeline = pipeline(&config, args, store)?;
    let session = Session::new(&config.system_prompt, config.context_window);

    let mut interrupts = listen_for_interrupts();
    let turn = run_turn(&pipeline, &session, question, &mut interrupts).await?;
    write_turn(&mut tokio::io::stdout(), &turn, args.show_sources).await
}

pub(crate) async fn chat(config: ChatConfig, args: &StoreArgs) -> Result<()> {
    let store = load_store(args).await?;
    let pipeline = pipeline(&config, args, store)?;
    let session = Session::new(&config.system_prompt, config.context_window);

    let mut interrupts = listen_for_interrupts();
    let session = repl(
        &pipeline,
        session,
        BufReader::new(tokio::io::stdin()),
        &mut tokio::io::stdout(),
        &mut interrupts,
        args.show_sources,
    )
    .await?;

    info!(
        "Session ended after {} exchanges",
        session.messages().len().saturating_sub(1) / 2
    );
    Ok(())
}

pub(crate) async fn index(config: ChatConfig, args: &IndexArgs) -> Result<()> {
    if args.store.extension().and_then(|e| e.to_str()) != Some("json") {
        bail!("index writes JSON stores; use a path ending in .json");
    }

    let mut store = if tokio::fs::try_exists(&args.store).await? {
        EmbeddingStore::load(&args.store).await?
    } else {
        EmbeddingStore::new()
    };

    let text = read_text(&args.text).await?;
    let tokens = TokenCounter::cl100k()?;

    let summary = match &args.summary {
        Some(path) => Some(read_text(path).await?),
        None if args.no_summary => None,
        None => {
            let summarizer = summarizer(&config, tokens.clone())?;
            let condensed = summarizer.condense(&text).await?;
            let summary = summarizer
                .summarize(args.title.as_deref(), &condensed)
                .await?;
            info!("Generated summary for {}", args.article_uuid);
            Some(summary.summary)
        }
    };

    let api_key = config.api_key.clone().context("no API key configured")?;
    let provider = OpenAIProvider::new()
        .with_api_key(api_key)
        .with_base_url(config.base_url.clone())
        .with_model(config.embedding_model.clone());
    let indexer =
        ArticleIndexer::new(provider, tokens).with_chunking(args.words_per_chunk, args.overlap);

    let records = indexer
        .index_article(&args.article_uuid, &text, summary.as_deref())
        .await?;
    let added = records.len();
    for record in records {
        store.push(record)?;
    }
    store.save(&args.store).await?;

    info!(
        "Added {added} records for {}, store now holds {}",
        args.article_uuid,
        store.len()
    );
    Ok(())
}

pub(crate) async fn summarize(config: ChatConfig, args: &SummarizeArgs) -> Result<()> {
    let text = read_text(&args.text).await?;
    let summarizer = summarizer(&config, TokenCounter::cl100k()?)?.with_sentences(args.sentences);

    let condensed = summarizer.condense(&text).await?;
    let summary = summarizer
        .summarize(args.title.as_deref(), &condensed)
        .await?;
    let category = summarizer.categorize(&condensed).await?;

    println!(
        "Category: {category}\n\n{}\n\nAdvisor: {}",
        summary.summary, summary.advisor_note
    );
    Ok(())
}
