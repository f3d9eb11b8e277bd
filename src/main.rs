//! folder_tree CLI - Print the folder/project hierarchy under one or more folders.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use folder_tree::config::{validate_page_size, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT};
use folder_tree::{
    parse_folder_list, Authenticator, ChildOrder, ResourceManagerClient, RetryPolicy,
    TraversalConfig, TreeBuilder,
};

/// Walk Google Cloud folders and print their sub-folders and projects as JSON.
#[derive(Parser)]
#[command(name = "folder_tree")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to service account JSON key file.
    #[arg(
        long,
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        required_unless_present = "access_token"
    )]
    key_file: Option<PathBuf>,

    /// Pre-issued OAuth access token, used instead of a key file.
    #[arg(long, env = "FOLDER_TREE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Comma-separated root folders (IDs, folders/<ID> names or Console URLs).
    #[arg(long, env = "FOLDER_TREE_FOLDERS")]
    folders: String,

    /// Maximum API calls in flight at once (unbounded when omitted).
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Sort children by folder ID and projects by project ID.
    #[arg(long)]
    sort_by_id: bool,

    /// Retries for rate-limited or unavailable API calls.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds, doubled on each retry.
    #[arg(long, default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Seconds before a single API request is abandoned and retried.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout_secs: u64,

    /// Page size for folder and project listings.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Print single-line JSON instead of pretty-printed JSON.
    #[arg(long)]
    compact: bool,

    /// Enable debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let root_ids = parse_folder_list(&cli.folders)
        .with_context(|| format!("Invalid --folders value: {}", cli.folders))?;

    let auth = match (&cli.access_token, &cli.key_file) {
        (Some(token), _) => Authenticator::from_access_token(token.clone()),
        (None, Some(key_file)) => Authenticator::from_file(key_file)
            .with_context(|| format!("Failed to load credentials from {:?}", key_file))?,
        (None, None) => anyhow::bail!("Either --key-file or --access-token is required"),
    };

    let page_size = validate_page_size(cli.page_size)?;
    let retry = RetryPolicy {
        max_retries: cli.max_retries,
        base_delay: Duration::from_millis(cli.retry_backoff_ms),
        ..RetryPolicy::default()
    };
    if cli.request_timeout_secs == 0 {
        anyhow::bail!("--request-timeout-secs must be at least 1");
    }
    let client = ResourceManagerClient::new(auth)?
        .with_page_size(page_size)
        .with_timeout(Duration::from_secs(cli.request_timeout_secs))
        .with_retry_policy(retry);

    let mut config = TraversalConfig::default();
    if let Some(limit) = cli.max_concurrency {
        config = config.with_max_concurrency(limit);
    }
    if cli.sort_by_id {
        config = config.with_child_order(ChildOrder::ById);
    }
    let builder = TreeBuilder::with_config(Arc::new(client), &config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling traversal");
            on_interrupt.cancel();
        }
    });

    let forest = builder
        .build_forest(&root_ids, &cancel)
        .await
        .with_context(|| format!("Failed to build folder tree for {}", root_ids.join(",")))?;

    let json = if cli.compact {
        serde_json::to_string(&forest)?
    } else {
        serde_json::to_string_pretty(&forest)?
    };
    println!("{}", json);

    info!(roots = forest.len(), "Done");
    Ok(())
}

/// Logs go to stderr so stdout stays valid JSON. `RUST_LOG` overrides the default.
fn setup_logging(verbose: bool) {
    let default = if verbose {
        "folder_tree=debug,warn"
    } else {
        "folder_tree=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
