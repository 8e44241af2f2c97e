//! CLI definition and command dispatch for hoplite.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (e.g. `--max-chunks`, `--config`)
//! 2. Environment variables (`HOPLITE_CONFIG`, `HOPLITE_STORE`, `HOPLITE_COLOR`)
//! 3. Config file (`~/.hoplite/config.yaml` or the `--config` path)
//! 4. Built-in defaults
//!
//! Logging goes to stderr. `HOPLITE_LOG` takes a tracing filter directive and
//! overrides `--verbose`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hoplite_core::{
    AnalyticsDispatcher, DbVectorBackend, EngineConfig, JsonlAuditSink, KeywordLibrary,
    KeywordLibraryHandle, LexicalScorer, ModelEmbedder, ModelJudge, RetrievalContext,
    RetrievalEngine, RetrievalError, RetrieveRequest, SearchFilters,
};
use hoplite_db::vector::VectorIndexConfig;

use crate::ui::{format, table, ColorMode, MessageType, Style};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Width of the chunk text preview column.
const PREVIEW_WIDTH: usize = 60;

/// hoplite – hybrid multi-hop retrieval over tabletop wargame rules
#[derive(Parser, Debug)]
#[command(name = "hoplite")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "HOPLITE_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.hoplite/config.yaml)
    #[arg(long, global = true, env = "HOPLITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode
    #[arg(long, global = true, env = "HOPLITE_COLOR", value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve rules context for a question
    #[command(after_help = r#"EXAMPLES:
    # Ask against a chunk store
    hoplite retrieve "Can I overwatch after dashing?" --store rules.jsonl

    # Single hop, FAQ chunks only, JSON output
    hoplite retrieve "How far can a model move?" --store rules.jsonl \
        --no-multi-hop --doc-type faq --json

    # Bound the whole request to two seconds
    hoplite retrieve "Does cover stack?" --store rules.jsonl --timeout-ms 2000
"#)]
    Retrieve(RetrieveArgs),

    /// Inspect keyword normalization
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },

    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `hoplite retrieve`.
#[derive(Args, Debug)]
pub struct RetrieveArgs {
    /// The rules question
    pub query: String,

    /// Chunk store (JSONL file of embedded chunks)
    #[arg(long, env = "HOPLITE_STORE")]
    pub store: PathBuf,

    /// Keyword library (JSON); overrides `keywords.path` from the config
    #[arg(long)]
    pub keywords: Option<PathBuf>,

    /// Maximum chunks in the result
    #[arg(long)]
    pub max_chunks: Option<usize>,

    /// Minimum normalized relevance in [0, 1]
    #[arg(long)]
    pub min_relevance: Option<f32>,

    /// Maximum follow-up hops
    #[arg(long)]
    pub max_hops: Option<usize>,

    /// Run a single hop without consulting the judge
    #[arg(long)]
    pub no_multi_hop: bool,

    /// Only consider chunks of this document type
    #[arg(long)]
    pub doc_type: Option<String>,

    /// Only consider chunks from this source
    #[arg(long)]
    pub source: Option<String>,

    /// Deadline for the whole request, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Session or conversation key recorded in logs and audit records
    #[arg(long)]
    pub context_key: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Keyword subcommands
#[derive(Subcommand, Debug)]
pub enum KeywordsAction {
    /// Print the normalized tokens for a text
    #[command(after_help = r#"EXAMPLES:
    hoplite keywords normalize "Fire teams may use reaction fire" --keywords keywords.json
"#)]
    Normalize {
        /// Text to normalize
        text: String,

        /// Keyword library (JSON)
        #[arg(long)]
        keywords: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show {
        /// Output in JSON format instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and list warnings
    Validate,
}

// ============================================================================
// Entry point
// ============================================================================

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("HOPLITE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hoplite_core={0},hoplite_db={0},hoplite_model={0},hoplite_cli={0}",
            log_level
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let style = Style::new(cli.color);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your global config at ~/.hoplite/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context(
                    "Failed to load configuration",
                    Some(&format!("{e:#}")),
                    Some(&hint),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Retrieve(args) => handle_retrieve(&style, &config, args),
        Command::Keywords {
            action: KeywordsAction::Normalize { text, keywords, json },
        } => handle_keywords_normalize(&config, &text, &keywords, json),
        Command::Config { action } => match action {
            ConfigAction::Show { json } => handle_config_show(&config, json),
            ConfigAction::Validate => handle_config_validate(&style, &config, cli.config.as_deref()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context(&format!("{e:#}"), None, failure_hint(&e))
            );
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::load_default()?,
    };
    Ok(config)
}

/// Actionable next step for the common failures.
fn failure_hint(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<RetrievalError>() {
        Some(RetrievalError::Backend(_)) => {
            Some("Is the embedding server reachable at embedder.baseUrl?")
        }
        Some(RetrievalError::Timeout) => Some("Raise --timeout-ms or lower --max-hops"),
        Some(RetrievalError::InvalidRequest(_)) => Some("See `hoplite retrieve --help` for limits"),
        _ => None,
    }
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_retrieve(style: &Style, config: &EngineConfig, args: RetrieveArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(retrieve(style, config, args))
}

async fn retrieve(style: &Style, config: &EngineConfig, args: RetrieveArgs) -> Result<()> {
    let store = VectorIndexConfig::new(config.embedder.dimension, &args.store)
        .with_create_if_missing(false);
    let backend = DbVectorBackend::open(&store)
        .with_context(|| format!("Failed to open chunk store at {}", args.store.display()))?;
    let embedder = ModelEmbedder::from_config(config.embedder.clone())?;
    let judge = ModelJudge::from_config(config.judge.clone())?;

    let keywords_path = args.keywords.as_deref().or(config.keywords.path.as_deref());
    let keywords = match keywords_path {
        Some(path) => KeywordLibraryHandle::new(KeywordLibrary::load(path)?),
        None => KeywordLibraryHandle::default(),
    };

    let mut builder = RetrievalEngine::builder(Arc::new(embedder), Arc::new(backend), Arc::new(judge))
        .with_config(config)
        .with_keywords(keywords);
    if config.analytics.enabled {
        if let Some(path) = config.analytics.resolved_log_path() {
            tracing::debug!(path = %path.display(), "Audit log enabled");
            let sink = Arc::new(JsonlAuditSink::new(path));
            builder = builder.with_analytics(Arc::new(AnalyticsDispatcher::spawn(
                sink,
                config.analytics.queue_capacity,
            )));
        }
    }
    let engine = builder.build()?;

    let request = build_request(config, &args);
    let token = request.cancellation.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling retrieval");
            token.cancel();
        }
    });

    let result = engine.retrieve(request).await;
    interrupt.abort();
    engine.shutdown().await;
    let context = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else {
        print_context(style, config, &args, &context);
    }
    Ok(())
}

/// Config defaults overridden by flags.
fn build_request(config: &EngineConfig, args: &RetrieveArgs) -> RetrieveRequest {
    let mut request = config.retrieval.defaults.request(args.query.clone());

    if let Some(max_chunks) = args.max_chunks {
        request = request.with_max_chunks(max_chunks);
    }
    if let Some(min_relevance) = args.min_relevance {
        request = request.with_min_relevance(min_relevance);
    }
    if let Some(max_hops) = args.max_hops {
        request = request.with_max_hops(max_hops);
    }
    if args.no_multi_hop {
        request = request.with_multi_hop(false);
    }
    if let Some(key) = &args.context_key {
        request = request.with_context_key(key.clone());
    }

    let mut filters = SearchFilters::new();
    if let Some(doc_type) = &args.doc_type {
        filters = filters.with_doc_type(doc_type.clone());
    }
    if let Some(source) = &args.source {
        filters = filters.with_source(source.clone());
    }
    request = request.with_filters(filters);

    if let Some(ms) = args.timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }
    request
}

fn print_context(style: &Style, config: &EngineConfig, args: &RetrieveArgs, context: &RetrievalContext) {
    let min_relevance = args
        .min_relevance
        .unwrap_or(config.retrieval.defaults.min_relevance);

    println!("{}", style.section("QUERY"));
    println!();
    println!("  {}", style.key_value("Query", &args.query));
    println!("  {}", style.key_value("Context", &context.context_id));
    println!();

    if context.is_empty() {
        println!("{}", style.message(MessageType::Info, "No relevant chunks found."));
    } else {
        println!("{}", style.section("CHUNKS"));
        println!();
        println!("{}", table::render_chunks_table(&context.chunks, PREVIEW_WIDTH));
        if context.chunks.iter().any(|c| c.relaxed) {
            println!(
                "{}",
                style.muted("* admitted below the relevance gate because nothing else passed")
            );
        }
    }
    println!();

    if !context.hop_evaluations.is_empty() {
        println!("{}", style.section("EVALUATIONS"));
        println!();
        println!("{}", table::render_evaluations_table(&context.hop_evaluations));
        println!();
    }

    println!("{}", style.section("SUMMARY"));
    println!();
    println!(
        "  {}",
        style.key_value("Average relevance", &style.score(context.avg_relevance, min_relevance))
    );
    println!("  {}", style.key_value("Meets threshold", &style.flag(context.meets_threshold)));
    println!("  {}", style.key_value("Stopped", format::stop_reason(context.stop_reason)));
    println!(
        "  {}",
        style.key_value("Hops", &context.telemetry.hops_executed.to_string())
    );
    println!(
        "  {}",
        style.key_value(
            "Timing",
            &format!(
                "retrieval {}, judge {}",
                format::format_ms(context.telemetry.retrieval_latency_ms),
                format::format_ms(context.telemetry.judge_latency_ms)
            )
        )
    );
    if context.telemetry.judge_cost > 0.0 {
        println!(
            "  {}",
            style.key_value("Judge cost", &format!("{:.4}", context.telemetry.judge_cost))
        );
    }

    if !context.meets_threshold {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Warn,
                "Context is below the relevance threshold; caveat or refuse the answer"
            )
        );
    }
}

fn handle_keywords_normalize(
    config: &EngineConfig,
    text: &str,
    keywords: &Path,
    json: bool,
) -> Result<()> {
    let library = KeywordLibrary::load(keywords)?;
    let scorer = LexicalScorer::new(&config.retrieval.bm25);
    let tokens = scorer.normalize(text, &library);

    if json {
        println!("{}", serde_json::to_string(&tokens)?);
    } else {
        println!("{}", tokens.join(" "));
    }
    Ok(())
}

fn handle_config_show(config: &EngineConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", config.to_yaml()?);
    }
    Ok(())
}

fn handle_config_validate(style: &Style, config: &EngineConfig, path: Option<&Path>) -> Result<()> {
    let source = path
        .map(Path::to_path_buf)
        .or_else(EngineConfig::default_path);
    match source {
        Some(path) if path.exists() => println!(
            "{}",
            style.message(MessageType::Info, &format!("Checked {}", path.display()))
        ),
        Some(path) => println!(
            "{}",
            style.message(
                MessageType::Info,
                &format!("{} not found, checked built-in defaults", path.display())
            )
        ),
        None => println!(
            "{}",
            style.message(MessageType::Info, "Checked built-in defaults")
        ),
    }

    let warnings = config.validate()?;
    if warnings.is_empty() {
        println!("{}", style.message(MessageType::Ok, "Configuration is valid"));
    } else {
        println!(
            "{}",
            style.message(MessageType::Warn, &format!("{} warning(s):", warnings.len()))
        );
        for warning in &warnings {
            println!("  • {}", warning);
        }
        println!(
            "{}",
            style.message(MessageType::Ok, "Configuration is valid with warnings")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> RetrieveArgs {
        let mut argv = vec!["hoplite", "retrieve", "Can I overwatch?", "--store", "rules.jsonl"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Retrieve(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let config = EngineConfig::default();
        let request = build_request(&config, &args(&[]));
        assert_eq!(request.max_chunks, config.retrieval.defaults.max_chunks);
        assert_eq!(request.max_hops, config.retrieval.defaults.max_hops);
        assert!(request.use_multi_hop);
        assert!(request.filters.is_none());
        assert!(request.deadline.is_none());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = EngineConfig::default();
        let request = build_request(
            &config,
            &args(&[
                "--max-chunks",
                "3",
                "--min-relevance",
                "0.4",
                "--max-hops",
                "1",
                "--no-multi-hop",
                "--doc-type",
                "faq",
                "--timeout-ms",
                "500",
                "--context-key",
                "table-4",
            ]),
        );
        assert_eq!(request.max_chunks, 3);
        assert!((request.min_relevance - 0.4).abs() < f32::EPSILON);
        assert_eq!(request.max_hops, 1);
        assert!(!request.use_multi_hop);
        assert_eq!(
            request.filters.and_then(|f| f.doc_type),
            Some("faq".to_string())
        );
        assert!(request.deadline.is_some());
        assert_eq!(request.context_key, "table-4");
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
