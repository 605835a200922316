//! followscout CLI: recommends accounts to follow from the two-hop follow graph
//!
//! Uses the followscout-sdk RemoteClient against the platform's REST API.

mod output;

use clap::Parser;
use followscout::{PipelineConfig, PipelineError, RecommendationPipeline, Recommendations, ReferenceUsers};
use followscout_sdk::{RemoteClient, DEFAULT_API_URL};
use output::OutputFormat;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Token variable read when `GITHUB_TOKEN` and `--token` are both absent
const LEGACY_TOKEN_ENV: &str = "git_token";

const RATE_LIMIT_DOCS: &str =
    "https://docs.github.com/en/rest/overview/resources-in-the-rest-api#rate-limiting";

#[derive(Parser)]
#[command(name = "followscout", version, about = "Find accounts followed by the people you follow")]
struct Cli {
    /// Personal access token (falls back to the `git_token` variable)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Recommend for this user instead of the authenticated one
    #[arg(long)]
    entry: Option<String>,

    /// Minimum number of shared followers, exclusive
    #[arg(long, default_value_t = 5)]
    threshold: u64,

    /// Expansion workers
    #[arg(long, default_value_t = 200)]
    concurrency: usize,

    /// Skip first-degree users following more accounts than this
    #[arg(long, default_value_t = 300)]
    fan_out_cap: u64,

    /// Followings pages fetched at once
    #[arg(long, default_value_t = 400)]
    page_budget: usize,

    /// Candidate profiles fetched at once
    #[arg(long, default_value_t = 32)]
    resolve_concurrency: usize,

    /// API base URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "FOLLOWSCOUT_API_URL")]
    api_url: String,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Print at most this many candidates, 0 for all
    #[arg(long, default_value_t = 0)]
    limit: usize,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            threshold: self.threshold,
            workers: self.concurrency,
            fan_out_cap: self.fan_out_cap,
            page_budget: self.page_budget,
            resolve_concurrency: self.resolve_concurrency,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        if let Some(PipelineError::RateLimited { .. }) = e.downcast_ref::<PipelineError>() {
            eprintln!("See {}", RATE_LIMIT_DOCS);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let token = resolve_token(cli.token.as_deref(), std::env::var(LEGACY_TOKEN_ENV).ok())
        .ok_or("an access token is required (--token, GITHUB_TOKEN or git_token)")?;

    let client = RemoteClient::new(&token)?.with_base_url(&cli.api_url);
    info!(api = client.base_url(), "Using remote API");

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            ctrl_c.cancel();
        }
    });

    let pipeline = RecommendationPipeline::new(Arc::new(client), cli.pipeline_config()).with_shutdown(shutdown);
    let refs = pipeline.resolve_reference_users(cli.entry.as_deref()).await?;
    if let OutputFormat::Table = cli.format {
        println!("{}", output::reference_table(&refs));
    }

    let mut recs = pipeline.run(&refs).await?;
    if cli.limit > 0 {
        recs.candidates.truncate(cli.limit);
    }

    print_recommendations(&refs, &recs, &cli.format)?;

    for failure in &recs.failures {
        eprintln!("Could not resolve {}: {}", failure.login, failure.message);
    }
    Ok(())
}

/// First non-blank of the flag/`GITHUB_TOKEN` value and the legacy variable
fn resolve_token(primary: Option<&str>, legacy: Option<String>) -> Option<String> {
    primary
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .or_else(|| {
            legacy
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
        })
}

fn print_recommendations(
    refs: &ReferenceUsers,
    recs: &Recommendations,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output::recommendations_json(refs, recs))?);
        }
        OutputFormat::Csv => {
            print!("{}", output::candidate_csv(&recs.candidates));
        }
        OutputFormat::Table => {
            if recs.candidates.is_empty() {
                println!("(no recommendations)");
                return Ok(());
            }
            println!("{}", output::candidate_table(&recs.candidates));
            println!("{} recommendation(s)", recs.candidates.len());
        }
    }

    Ok(())
}
