//! Volley: batch HTTP request executor
//!
//! Reads line-delimited JSON request records, issues them against their
//! endpoints under the configured concurrency and rate ceilings, and writes
//! one result record per request in input order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use volley_common::auth::CredentialManager;
use volley_common::resilience::RateLimiter;
use volley_core::batch::Dispatcher;
use volley_domain::{BatchConfig, ResultRecord};
use volley_infra::auth::GoogleTokenSource;
use volley_infra::http::{build_header_map, HttpRequestExecutor};
use volley_infra::io::{self, BatchInput};

/// Issue a batch of HTTP requests described by line-delimited JSON records.
#[derive(Debug, Parser)]
#[command(name = "volley", version, about)]
struct Cli {
    /// Input JSONL file of request records ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output JSONL file for result records ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Authenticate requests with a Google-issued bearer token
    #[arg(long)]
    use_google_token: bool,

    /// OAuth scope requested during credential acquisition (repeatable)
    #[arg(long = "scope", value_name = "SCOPE")]
    scopes: Vec<String>,

    /// Extra header merged into every request, as NAME=VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Worker pool size
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Global requests-per-minute ceiling shared by all workers (0 disables)
    #[arg(long, default_value_t = 0)]
    rate_limit: u32,

    /// Per-request timeout in seconds (absent: transport defaults)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Seconds between progress reports
    #[arg(long, default_value_t = 10)]
    progress_interval_secs: u64,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}

impl Cli {
    fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            use_google_token: self.use_google_token,
            scopes: self.scopes.clone(),
            headers: self.headers.iter().cloned().collect::<BTreeMap<_, _>>(),
            concurrency: self.concurrency,
            rate_limit: self.rate_limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging first: results go to stdout, diagnostics to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "loaded environment from .env");
    }

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.batch_config();
    config.validate().context("invalid configuration")?;

    let batch = read_input(&cli.input)?;
    info!(requests = batch.descriptors.len(), skipped = batch.skipped, "processing requests");

    // The bearer header is resolved exactly once, before dispatch begins;
    // the manager's refresh capability stays available to callers but is not
    // wired into the request loop.
    let bearer = if config.use_google_token {
        info!("acquiring credentials from Google identity infrastructure");
        let source = GoogleTokenSource::from_env(config.scopes.clone())
            .context("failed to prepare credential source")?;
        let manager = CredentialManager::connect_with_defaults(source)
            .await
            .context("failed to acquire initial credential")?;
        Some(manager.token().await.context("failed to obtain bearer token")?)
    } else {
        None
    };

    let headers = build_header_map(&config.headers, bearer.as_deref())?;
    let executor = HttpRequestExecutor::new(headers, cli.timeout_secs.map(Duration::from_secs))?;
    let dispatcher = Dispatcher::new(
        Arc::new(executor),
        Arc::new(RateLimiter::per_minute(config.rate_limit)),
        config.concurrency,
    )
    .with_progress_interval(Duration::from_secs(cli.progress_interval_secs));

    let outcome = dispatcher.run(batch.descriptors).await;
    write_output(&cli.output, &outcome.results)?;

    let summary = outcome.summary;
    info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = batch.skipped,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        throughput_rps = summary.throughput(),
        "batch complete"
    );
    Ok(())
}

fn read_input(path: &str) -> anyhow::Result<BatchInput> {
    let batch = if path == "-" {
        io::read_descriptors(std::io::stdin().lock())
    } else {
        io::read_descriptors_from_path(Path::new(path))
    };
    batch.context("failed to read input records")
}

fn write_output(path: &str, results: &[ResultRecord]) -> anyhow::Result<()> {
    let written = if path == "-" {
        io::write_results(std::io::stdout().lock(), results)
    } else {
        io::write_results_to_path(Path::new(path), results)
    };
    written.context("failed to write result records")
}
