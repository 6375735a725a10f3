use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use meilisearch_async_client::{MeiliClient, RequestBody, WaitOptions};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "meili-cli",
    version,
    about = "Small async CLI for querying a Meilisearch server"
)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, env = "MEILI_URL", default_value = "http://localhost:7700")]
    url: String,

    /// API key sent in the X-Meili-Api-Key header.
    #[arg(long, env = "MEILI_API_KEY")]
    api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show server health.
    Health,
    /// Show server version.
    Version,
    /// Show database and index statistics.
    Stats,
    /// List all indexes.
    Indexes,
    /// Manage one index.
    #[command(subcommand)]
    Index(IndexCommand),
    /// Show the settings of an index.
    Settings {
        /// Index uid.
        uid: String,
    },
    /// Wait for a task to finish and print it.
    Wait(WaitArgs),
    /// Send a raw HTTP request using method + path.
    Request(RequestArgs),
}

#[derive(Debug, Subcommand)]
enum IndexCommand {
    /// Show index metadata.
    Get { uid: String },
    /// Create an index and wait for it.
    Create {
        uid: String,
        /// Primary key of the documents.
        #[arg(long)]
        primary_key: Option<String>,
    },
    /// Delete an index if it exists.
    Delete { uid: String },
}

#[derive(Debug, Args)]
struct WaitArgs {
    /// Task uid.
    task_uid: u64,

    /// Give up after this many milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Initial delay between polls in milliseconds.
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    method: String,

    /// Request path (for example: indexes/movies/settings).
    path: String,

    /// Query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct BodyInput {
    /// JSON request body literal.
    #[arg(long, conflicts_with = "body_file")]
    body_json: Option<String>,

    /// Path to a file containing a JSON request body.
    #[arg(long, value_name = "PATH", conflicts_with = "body_json")]
    body_file: Option<PathBuf>,
}

/// Entry point for the async CLI.
///
/// Parses command-line arguments, builds a client, dispatches subcommands,
/// and prints JSON output.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut client = MeiliClient::new(&cli.url)
        .with_context(|| format!("failed to create client with base URL '{}'", cli.url))?;
    if let Some(key) = &cli.api_key {
        client = client.with_api_key(key.clone());
    }
    if let Some(seconds) = cli.timeout {
        client = client.with_timeout(Duration::from_secs(seconds));
    }

    let output = run(&client, &cli.command).await;
    client.close();

    print_json(&output?, cli.compact).context("failed to print JSON output")?;
    Ok(())
}

async fn run(client: &MeiliClient, command: &Command) -> Result<Value> {
    match command {
        Command::Health => to_json(client.health().await.context("health check failed")?),
        Command::Version => to_json(client.get_version().await.context("version failed")?),
        Command::Stats => to_json(client.get_all_stats().await.context("stats failed")?),
        Command::Indexes => to_json(client.get_indexes().await.context("listing indexes failed")?),
        Command::Index(index) => run_index(client, index).await,
        Command::Settings { uid } => to_json(
            client
                .index(uid.as_str())
                .get_settings()
                .await
                .with_context(|| format!("failed to read settings of index '{uid}'"))?,
        ),
        Command::Wait(args) => {
            let options = WaitOptions::default()
                .with_timeout(Duration::from_millis(args.timeout_ms))
                .with_interval(Duration::from_millis(args.interval_ms));
            to_json(
                client
                    .wait_for_task_with(args.task_uid, &options)
                    .await
                    .with_context(|| format!("waiting for task {} failed", args.task_uid))?,
            )
        }
        Command::Request(args) => send_request(client, args)
            .await
            .with_context(|| format!("request failed: {} {}", args.method, args.path)),
    }
}

async fn run_index(client: &MeiliClient, command: &IndexCommand) -> Result<Value> {
    match command {
        IndexCommand::Get { uid } => to_json(
            client
                .get_index(uid)
                .await
                .with_context(|| format!("failed to read index '{uid}'"))?,
        ),
        IndexCommand::Create { uid, primary_key } => to_json(
            client
                .create_and_fetch_index(uid, primary_key.as_deref())
                .await
                .with_context(|| format!("failed to create index '{uid}'"))?,
        ),
        IndexCommand::Delete { uid } => {
            let deleted = client
                .delete_index_if_exists(uid)
                .await
                .with_context(|| format!("failed to delete index '{uid}'"))?;
            Ok(serde_json::json!({ "uid": uid, "deleted": deleted }))
        }
    }
}

/// Sends a raw HTTP request using method + path.
async fn send_request(client: &MeiliClient, args: &RequestArgs) -> Result<Value> {
    // Validate method eagerly so CLI errors are explicit before any network call.
    let method = Method::from_str(&args.method)
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;
    let query = parse_pairs(&args.query, "--query").context("failed to parse --query arguments")?;
    let body = parse_body(&args.body).context("failed to parse request body input")?;
    let borrowed_query: Vec<(&str, &str)> = query
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    let value = client
        .api_client()
        .request(method, &args.path, &borrowed_query, body.map(RequestBody::Json))
        .await
        .with_context(|| format!("HTTP request failed for path '{}'", args.path))?;
    Ok(value)
}

/// Parses repeated `key=value` arguments into owned key/value pairs.
fn parse_pairs(values: &[String], flag_name: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(values.len());
    for item in values {
        let Some((key, value)) = item.split_once('=') else {
            bail!("invalid {flag_name} value '{item}': expected key=value");
        };
        if key.is_empty() {
            bail!("invalid {flag_name} value '{item}': empty key");
        }
        pairs.push((key.to_owned(), value.to_owned()));
    }
    Ok(pairs)
}

/// Parses an optional JSON body from inline text or a file path.
fn parse_body(body: &BodyInput) -> Result<Option<Value>> {
    match (&body.body_json, &body.body_file) {
        (Some(raw), None) => serde_json::from_str(raw)
            .context("failed to parse JSON from --body-json")
            .map(Some),
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read --body-file '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| {
                    format!("failed to parse JSON in --body-file '{}'", path.display())
                })
                .map(Some)
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => bail!("use only one of --body-json or --body-file"),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("failed to encode response as JSON")
}

/// Prints a JSON value either compact or pretty-formatted.
fn print_json(value: &Value, compact: bool) -> Result<()> {
    if compact {
        println!(
            "{}",
            serde_json::to_string(value).context("Failed to render JSON")?
        );
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to render JSON")?
        );
    }
    Ok(())
}
