// ============================================================================
// lingua - Interactive sentence memory for language study
// ============================================================================
// Usage:
//   lingua                                  Interactive prompt (default)
//   lingua process "The cat sat." [--json]  Run one sentence
//   lingua recall "A cat is sitting" [-k 5] Find similar remembered sentences
//   lingua stats                            Show memory statistics
// ============================================================================

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lingua_core::translate::language_name;
use lingua_core::{LinguaConfig, SentencePipeline, StoreBackend};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Inputs that end the interactive loop
const QUIT_WORDS: &[&str] = &["q", "quit", "exit"];

/// Annotate, translate and remember sentences
#[derive(Parser)]
#[command(name = "lingua", version, about = "Annotate, translate and remember sentences for language study")]
struct Cli {
    /// Memory backend: memory, redb, qdrant (default: LINGUA_STORE or redb)
    #[arg(long, global = true)]
    store: Option<String>,

    /// Path to the redb file (default: LINGUA_DB_PATH or ~/.lingua/memory.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Memory namespace (default: LINGUA_NAMESPACE or lang-memory)
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read sentences from stdin until q/quit/exit or Ctrl-C
    Repl,

    /// Process one sentence
    Process {
        /// Sentence to process (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find remembered sentences similar to the given one
    Recall {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Maximum number of matches
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show memory statistics
    Stats,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,lingua_core={},lingua_cli={}", level, level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<LinguaConfig> {
    let mut config = LinguaConfig::from_env().context("Invalid configuration")?;

    if let Some(store) = &cli.store {
        config.store = store
            .parse::<StoreBackend>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(path) = &cli.db_path {
        config.db_path = Some(path.clone());
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    config.validate()?;
    Ok(config)
}

fn is_quit(input: &str) -> bool {
    QUIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    debug!(
        "Store: {}, namespace: {}, translator: {:?}",
        config.store, config.namespace, config.translator
    );

    let command = cli.command.unwrap_or(Commands::Repl);
    // Sentences can still be annotated and translated without a persistent store
    let allow_fallback = matches!(command, Commands::Repl | Commands::Process { .. });
    let pipeline = open_pipeline(&config, allow_fallback).await?;

    let outcome = match command {
        Commands::Repl => cmd_repl(&pipeline).await,
        Commands::Process { text, json } => cmd_process(&pipeline, &text.join(" "), json).await,
        Commands::Recall { text, top_k } => {
            cmd_recall(&pipeline, &text.join(" "), top_k.unwrap_or(config.top_k)).await
        }
        Commands::Stats => cmd_stats(&pipeline, &config).await,
    };

    pipeline
        .shutdown()
        .await
        .context("Failed to close sentence memory")?;
    outcome
}

async fn try_open(config: &LinguaConfig) -> Result<SentencePipeline> {
    let pipeline = config.build_pipeline()?;
    pipeline
        .initialize()
        .await
        .context("Failed to initialize sentence memory")?;
    Ok(pipeline)
}

/// Open the configured pipeline, falling back to an in-memory store when allowed
async fn open_pipeline(config: &LinguaConfig, allow_fallback: bool) -> Result<SentencePipeline> {
    match try_open(config).await {
        Ok(pipeline) => Ok(pipeline),
        Err(e) if allow_fallback && config.store != StoreBackend::Memory => {
            warn!("Sentence memory unavailable, using in-memory store: {:#}", e);
            eprintln!(
                "Warning: {} memory unavailable ({:#}); sentences will not be saved this session",
                config.store, e
            );
            let mut fallback = config.clone();
            fallback.store = StoreBackend::Memory;
            try_open(&fallback).await
        }
        Err(e) => Err(e),
    }
}

/// Next input line, or None on EOF or interrupt.
///
/// `interrupt` lives for the whole session, so a Ctrl-C received while a
/// sentence was being processed ends the loop at the next prompt.
async fn next_line<R, F>(lines: &mut Lines<R>, interrupt: Pin<&mut F>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => Ok(None),
        line = lines.next_line() => line.context("Failed to read from stdin"),
    }
}

async fn cmd_repl(pipeline: &SentencePipeline) -> Result<()> {
    println!("Language Learning Assistant");
    let source = language_name(&pipeline.languages().source).to_string();

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nEnter an {} sentence (or 'q' to quit):\n> ", source);
        std::io::stdout().flush()?;

        let Some(line) = next_line(&mut lines, interrupt.as_mut()).await? else {
            println!();
            break;
        };

        let sentence = line.trim();
        if is_quit(sentence) {
            break;
        }

        match pipeline.process(sentence).await {
            Ok(result) => output::print_result(&result, pipeline.languages()),
            Err(e) => {
                debug!("Sentence not processed: {}", e);
                println!("{}", e.user_message());
            }
        }
    }

    info!("Interactive session ended");
    Ok(())
}

async fn cmd_process(pipeline: &SentencePipeline, text: &str, json: bool) -> Result<()> {
    let result = match pipeline.process(text).await {
        Ok(result) => result,
        Err(e) => anyhow::bail!("{}", e.user_message()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::print_result(&result, pipeline.languages());
    }
    Ok(())
}

async fn cmd_recall(pipeline: &SentencePipeline, text: &str, top_k: usize) -> Result<()> {
    let hits = pipeline
        .recall(text, top_k)
        .await
        .context("Recall failed")?;

    if hits.is_empty() {
        println!("No remembered sentences yet.");
        return Ok(());
    }

    output::print_recall(&hits);
    Ok(())
}

async fn cmd_stats(pipeline: &SentencePipeline, config: &LinguaConfig) -> Result<()> {
    let count = pipeline
        .count()
        .await
        .context("Failed to count remembered sentences")?;

    println!("=== Lingua Sentence Memory ===");
    println!("Backend:   {}", pipeline.backend());
    if config.store == StoreBackend::Redb {
        let path = match &config.db_path {
            Some(p) => p.clone(),
            None => lingua_core::memory::default_db_path()?,
        };
        println!("Database:  {}", path.display());
    }
    println!("Namespace: {}", pipeline.namespace());
    println!(
        "Languages: {} -> {}",
        pipeline.languages().source,
        pipeline.languages().target
    );
    println!("Sentences: {}", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_words_case_insensitive() {
        assert!(is_quit("q"));
        assert!(is_quit("QUIT"));
        assert!(is_quit("Exit"));
        assert!(!is_quit("quit now"));
        assert!(!is_quit("The cat sat."));
    }

    #[test]
    fn test_cli_parses_process_words() {
        let cli = Cli::parse_from(["lingua", "--store", "memory", "process", "The", "cat", "sat."]);
        assert_eq!(cli.store.as_deref(), Some("memory"));
        match cli.command {
            Some(Commands::Process { text, json }) => {
                assert_eq!(text.join(" "), "The cat sat.");
                assert!(!json);
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_cli_defaults_to_repl() {
        let cli = Cli::parse_from(["lingua", "-vv"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
    }

    #[tokio::test]
    async fn test_interrupt_between_prompts_ends_loop() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let interrupt = async move {
            let _ = rx.await;
        };
        tokio::pin!(interrupt);

        let input: &[u8] = b"The cat sat.\nI like green tea.\n";
        let mut lines = BufReader::new(input).lines();

        let first = next_line(&mut lines, interrupt.as_mut()).await.unwrap();
        assert_eq!(first.as_deref(), Some("The cat sat."));

        // Arrives while the first sentence is being processed
        tx.send(()).unwrap();

        let second = next_line(&mut lines, interrupt.as_mut()).await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_eof_ends_loop() {
        let interrupt = std::future::pending::<()>();
        tokio::pin!(interrupt);
        let input: &[u8] = b"q\n";
        let mut lines = BufReader::new(input).lines();

        assert_eq!(
            next_line(&mut lines, interrupt.as_mut()).await.unwrap().as_deref(),
            Some("q")
        );
        assert_eq!(next_line(&mut lines, interrupt.as_mut()).await.unwrap(), None);
    }

    fn unopenable_redb_config(dir: &tempfile::TempDir) -> LinguaConfig {
        let mut config = LinguaConfig::default();
        config.store = StoreBackend::Redb;
        // A directory cannot be opened as a database file
        config.db_path = Some(dir.path().to_path_buf());
        config
    }

    #[tokio::test]
    async fn test_unavailable_store_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let config = unopenable_redb_config(&dir);

        let pipeline = open_pipeline(&config, true).await.unwrap();
        assert_eq!(pipeline.backend(), "memory");
        assert_eq!(pipeline.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_fatal_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = unopenable_redb_config(&dir);

        assert!(open_pipeline(&config, false).await.is_err());
    }

    #[test]
    fn test_cli_recall_top_k() {
        let cli = Cli::parse_from(["lingua", "recall", "cats", "-k", "3"]);
        assert!(matches!(cli.command, Some(Commands::Recall { top_k: Some(3), .. })));
    }
}
