use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dq_core::{DocumentStore, ModelClient, Provider, QueryHistoryStore, QueryService};
use dq_providers::{GeminiProvider, OpenAIProvider};

mod config;
mod documents;
mod history;
mod setup;

use config::Config;
use documents::DirectoryDocumentStore;
use history::JsonlHistoryStore;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: raw provider payloads
    Trace,
    /// Provider requests and responses
    Debug,
    /// Per-question and per-batch summaries
    Info,
    /// Quiet: retries, degraded answers, batch failures
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "dq")]
#[command(author, version, about = "docquery: ask questions about stored documents", long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/dq/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider type: gemini or openai (overrides config)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Base URL for the API (overrides config)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format) instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question about a document
    Ask {
        /// Document id
        document: String,
        /// Question to ask
        question: String,
    },
    /// Answer up to ten questions about a document
    Batch {
        /// Document id
        document: String,
        /// Questions to ask
        questions: Vec<String>,
        /// Read questions from a file, one per line
        #[arg(short, long, conflicts_with = "questions")]
        file: Option<PathBuf>,
    },
    /// Suggest questions worth asking about a document
    Recommend {
        /// Document id
        document: String,
    },
    /// Show previously answered questions for a document
    History {
        /// Document id
        document: String,
    },
    /// List stored document ids
    Documents,
    /// Initialize configuration in ~/.config/dq
    Setup,
}

/// Exit status for errors the caller can fix (bad input, missing or unready document).
const EXIT_CALLER_ERROR: i32 = 2;
const EXIT_FAILURE: i32 = 1;

#[tokio::main]
async fn main() {
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<dq_core::Error>() {
        Some(e) if e.is_caller_error() => EXIT_CALLER_ERROR,
        _ => EXIT_FAILURE,
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(&cli)?;

    if matches!(cli.command, Commands::Setup) {
        return setup::run();
    }

    let config = Config::load(cli.config.as_deref())?;
    let documents = Arc::new(DirectoryDocumentStore::new(config.documents_dir()?));

    match &cli.command {
        Commands::Documents => print_json(&documents.list().await?),
        Commands::History { document } => {
            let history = JsonlHistoryStore::new(config.history_file()?);
            print_json(&history.list(document).await?)
        }
        Commands::Ask { document, question } => {
            let service = build_service(&cli, &config, documents)?;
            print_json(&service.answer_one(document, question).await?)
        }
        Commands::Batch {
            document,
            questions,
            file,
        } => {
            let questions = match file {
                Some(path) => read_questions(path)?,
                None => questions.clone(),
            };
            let service = build_service(&cli, &config, documents)?;
            print_json(&service.answer_batch(document, &questions).await?)
        }
        Commands::Recommend { document } => {
            let service = build_service(&cli, &config, documents)?;
            print_json(&service.recommend_questions(document).await?)
        }
        Commands::Setup => Ok(()),
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    // --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };
    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One question per line; blank lines and `#` comments are skipped.
fn read_questions(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read questions file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn build_service(cli: &Cli, config: &Config, documents: Arc<dyn DocumentStore>) -> Result<QueryService> {
    let settings = resolve_settings(cli, config)?;
    debug!(
        provider = %settings.provider_type,
        model = ?settings.model,
        base_url = ?settings.base_url,
        "Resolved provider settings"
    );
    let provider = create_provider_from_settings(&settings);

    let client = ModelClient::new(provider)
        .with_policy(config.query.retry_policy()?)
        .with_temperature(config.query.temperature)
        .with_max_tokens(config.query.max_output_tokens);
    let history = Arc::new(JsonlHistoryStore::new(config.history_file()?));

    Ok(QueryService::new(client, documents, history)
        .with_batch_concurrency(config.query.batch_concurrency))
}

/// Resolved provider settings from CLI and config
#[derive(Debug)]
struct ResolvedSettings {
    provider_type: String,
    api_key: String,
    base_url: Option<String>,
    model: Option<String>,
}

fn resolve_settings(cli: &Cli, config: &Config) -> Result<ResolvedSettings> {
    resolve_settings_with(cli, config, |name| std::env::var(name).ok())
}

fn resolve_settings_with(
    cli: &Cli,
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedSettings> {
    let base_url = cli
        .base_url
        .clone()
        .or_else(|| config.provider.base_url.clone());

    let provider_type = resolve_provider_type(
        cli.provider
            .as_deref()
            .or(config.provider.provider_type.as_deref()),
        base_url.as_deref(),
    )?;

    let env_var = format!("{}_API_KEY", provider_type.to_uppercase());
    let api_key = config
        .provider
        .api_key
        .clone()
        .or_else(|| env(&env_var))
        // Local OpenAI-compatible servers usually take no key.
        .or_else(|| base_url.as_ref().map(|_| "none".to_string()))
        .with_context(|| {
            format!(
                "API key not found for provider '{}'. Set {} or configure [provider] api_key",
                provider_type, env_var
            )
        })?;

    let model = cli.model.clone().or_else(|| config.provider.model.clone());

    Ok(ResolvedSettings {
        provider_type,
        api_key,
        base_url,
        model,
    })
}

/// Resolve the provider type from an explicit setting or the base URL.
///
/// Priority:
/// 1. Explicit type always wins
/// 2. If no type but base_url is set → "openai" (OpenAI-compatible mode)
/// 3. Otherwise → "gemini"
fn resolve_provider_type(explicit_type: Option<&str>, base_url: Option<&str>) -> Result<String> {
    match explicit_type.map(str::to_lowercase).as_deref() {
        Some("gemini") | Some("google") => Ok("gemini".to_string()),
        Some("openai") => Ok("openai".to_string()),
        Some(other) => anyhow::bail!("Unknown provider type '{}' (expected gemini or openai)", other),
        None if base_url.is_some() => Ok("openai".to_string()),
        None => Ok("gemini".to_string()),
    }
}

fn create_provider_from_settings(settings: &ResolvedSettings) -> Arc<dyn Provider> {
    match settings.provider_type.as_str() {
        "gemini" => {
            let mut provider = GeminiProvider::new(&settings.api_key);
            if let Some(model) = &settings.model {
                provider = provider.with_default_model(model);
            }
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        _ => {
            let mut provider = OpenAIProvider::new(&settings.api_key);
            if let Some(model) = &settings.model {
                provider = provider.with_default_model(model);
            }
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dq_core::testing::MockProvider;
    use dq_core::BatchItemResult;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["dq"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_provider_type_explicit() {
        assert_eq!(resolve_provider_type(Some("gemini"), None).unwrap(), "gemini");
        assert_eq!(resolve_provider_type(Some("Google"), None).unwrap(), "gemini");
        assert_eq!(resolve_provider_type(Some("openai"), None).unwrap(), "openai");
        // Explicit type wins even with base_url
        assert_eq!(
            resolve_provider_type(Some("gemini"), Some("http://localhost:8080")).unwrap(),
            "gemini"
        );
        assert!(resolve_provider_type(Some("anthropic"), None).is_err());
    }

    #[test]
    fn test_resolve_provider_type_inferred() {
        assert_eq!(
            resolve_provider_type(None, Some("http://localhost:11434/v1")).unwrap(),
            "openai"
        );
        assert_eq!(resolve_provider_type(None, None).unwrap(), "gemini");
    }

    #[test]
    fn test_resolve_settings_env_key() {
        let config = Config::default();
        let settings = resolve_settings_with(&cli(&["documents"]), &config, |name| {
            (name == "GEMINI_API_KEY").then(|| "AIza-env".to_string())
        })
        .unwrap();

        assert_eq!(settings.provider_type, "gemini");
        assert_eq!(settings.api_key, "AIza-env");
        assert_eq!(settings.model, None);
    }

    #[test]
    fn test_resolve_settings_cli_overrides_config() {
        let config: Config = toml::from_str(
            r#"
            [provider]
            type = "gemini"
            api_key = "AIza-file"
            model = "gemini-1.5-flash"
            "#,
        )
        .unwrap();

        let settings = resolve_settings_with(
            &cli(&["--provider", "openai", "--model", "gpt-4o-mini", "documents"]),
            &config,
            no_env,
        )
        .unwrap();

        assert_eq!(settings.provider_type, "openai");
        assert_eq!(settings.api_key, "AIza-file");
        assert_eq!(settings.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_resolve_settings_missing_key() {
        let err = resolve_settings_with(&cli(&["documents"]), &Config::default(), no_env).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_resolve_settings_local_server_needs_no_key() {
        let settings = resolve_settings_with(
            &cli(&["--base-url", "http://localhost:11434/v1", "documents"]),
            &Config::default(),
            no_env,
        )
        .unwrap();
        assert_eq!(settings.provider_type, "openai");
        assert_eq!(settings.api_key, "none");
    }

    #[test]
    fn test_parse_batch_command() {
        let parsed = cli(&["batch", "notes", "What is it?", "Who wrote it?"]);
        match parsed.command {
            Commands::Batch {
                document,
                questions,
                file,
            } => {
                assert_eq!(document, "notes");
                assert_eq!(questions.len(), 2);
                assert!(file.is_none());
            }
            _ => panic!("expected batch command"),
        }
    }

    #[test]
    fn test_read_questions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.txt");
        std::fs::write(&path, "What is it?\n\n# skipped\n  Who wrote it?  \n").unwrap();

        assert_eq!(read_questions(&path).unwrap(), vec!["What is it?", "Who wrote it?"]);
    }

    #[test]
    fn test_exit_code_for_caller_errors() {
        let err = anyhow::Error::from(dq_core::Error::document_not_found("missing"));
        assert_eq!(exit_code(&err), EXIT_CALLER_ERROR);
        let err = anyhow::Error::from(dq_core::Error::invalid_input("question is empty"));
        assert_eq!(exit_code(&err), EXIT_CALLER_ERROR);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        let err = anyhow::Error::from(dq_core::Error::provider(502, "bad gateway"));
        assert_eq!(exit_code(&err), EXIT_FAILURE);
        assert_eq!(exit_code(&anyhow::anyhow!("config file is broken")), EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_missing_document_exits_as_caller_error() {
        let dir = tempfile::tempdir().unwrap();
        let documents = Arc::new(DirectoryDocumentStore::new(dir.path()));
        let history = Arc::new(JsonlHistoryStore::new(dir.path().join("history.jsonl")));
        let provider = Arc::new(MockProvider::new());
        let service = QueryService::new(ModelClient::new(provider.clone()), documents, history);

        let err: anyhow::Error = service
            .answer_one("absent", "What is it?")
            .await
            .unwrap_err()
            .into();

        assert_eq!(exit_code(&err), EXIT_CALLER_ERROR);
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_service_over_file_stores() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sky.txt"), "The sky is blue.").unwrap();
        let documents = Arc::new(DirectoryDocumentStore::new(dir.path()));
        let history = Arc::new(JsonlHistoryStore::new(dir.path().join("history.jsonl")));

        let provider = Arc::new(MockProvider::new());
        provider.queue_response(r#"{"answer":"Blue","canAnswer":true,"confidence":0.95,"reasoning":"stated"}"#);
        provider.queue_error(dq_core::Error::credentials("API key not valid"));

        let service = QueryService::new(ModelClient::new(provider), documents, history);

        let result = service.answer_one("sky", "What color is the sky?").await.unwrap();
        assert_eq!(result.answer.text, "Blue");

        let items = service
            .answer_batch("sky", &["Is it always blue?".to_string()])
            .await
            .unwrap();
        assert!(matches!(items[0], BatchItemResult::Failure { .. }));

        let records = service.history("sky").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "What color is the sky?");
    }
}
