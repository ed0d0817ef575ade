use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use cache_manager::CacheManager;
use clap::{Parser, Subcommand};
use score_aggregator::{cache_config_from_env, portfolio_summary, AggregatorConfig, ScoreAggregator};
use serde::Serialize;

mod snapshot;

use snapshot::SnapshotProvider;

#[derive(Parser)]
#[command(name = "stock-advisor")]
#[command(about = "Cached fundamental + sentiment scoring with BUY/HOLD/SELL recommendations", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON snapshot of metrics and headlines per ticker
    #[arg(short, long, env = "SNAPSHOT_FILE", global = true)]
    snapshot: Option<PathBuf>,

    /// Durable cache directory (overrides CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Skip the durable tier entirely
    #[arg(long, global = true, default_value = "false")]
    memory_only: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true, default_value = "false")]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one or more tickers (every ticker in the snapshot if none given)
    Recommend {
        tickers: Vec<String>,

        /// Fraction of the final score given to sentiment (0.0 - 1.0)
        #[arg(short, long)]
        weight: Option<f64>,

        /// Append a portfolio summary
        #[arg(long, default_value = "false")]
        summary: bool,
    },

    /// Drop cached composites for a ticker and score it again
    Refresh {
        ticker: String,

        #[arg(short, long)]
        weight: Option<f64>,
    },

    /// Show the last record computed for a ticker, if still fresh
    Cached {
        ticker: String,

        #[arg(short, long)]
        weight: Option<f64>,
    },

    /// Remove expired and unreadable cache entries
    Purge,

    /// Remove every cache entry
    Clear,

    /// Cache usage
    Stats,
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // Logs go to stderr so stdout stays machine-readable
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

async fn open_cache(cli: &Cli) -> CacheManager {
    if cli.memory_only {
        return CacheManager::in_memory();
    }
    let mut config = cache_config_from_env();
    if let Some(dir) = &cli.cache_dir {
        config.dir = dir.clone();
    }
    CacheManager::open(&config).await
}

async fn load_snapshot(cli: &Cli) -> Result<SnapshotProvider> {
    match &cli.snapshot {
        Some(path) => SnapshotProvider::load(path).await,
        None => bail!("No snapshot file given (use --snapshot or SNAPSHOT_FILE)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AggregatorConfig::from_env()?;
    tracing::info!(
        "Configuration loaded: fundamentals TTL {}s, sentiment TTL {}s, upstream timeout {}s",
        config.fundamental_ttl.as_secs(),
        config.sentiment_ttl.as_secs(),
        config.upstream_timeout.as_secs()
    );
    let default_weight = config.default_weight;
    let cache = open_cache(&cli).await;

    match &cli.command {
        Commands::Purge => {
            let removed = cache.purge_expired().await;
            print_json(&serde_json::json!({ "removed": removed }), cli.pretty)?;
        }
        Commands::Clear => {
            cache.clear().await;
            print_json(&cache.stats().await, cli.pretty)?;
        }
        Commands::Stats => {
            print_json(&cache.stats().await, cli.pretty)?;
        }
        Commands::Cached { ticker, weight } => {
            let provider = Arc::new(SnapshotProvider::default());
            let aggregator = ScoreAggregator::new(config, cache, provider.clone(), provider);
            let record = aggregator
                .cached_record(ticker, weight.unwrap_or(default_weight))
                .await;
            print_json(&record, cli.pretty)?;
        }
        Commands::Refresh { ticker, weight } => {
            let provider = Arc::new(load_snapshot(&cli).await?);
            let aggregator = ScoreAggregator::new(config, cache, provider.clone(), provider);
            let record = aggregator.refresh(ticker, weight.unwrap_or(default_weight)).await;
            print_json(&record, cli.pretty)?;
        }
        Commands::Recommend {
            tickers,
            weight,
            summary,
        } => {
            let provider = Arc::new(load_snapshot(&cli).await?);
            let tickers = if tickers.is_empty() {
                provider.tickers()
            } else {
                tickers.clone()
            };
            let aggregator = ScoreAggregator::new(config, cache, provider.clone(), provider);
            let records = aggregator
                .recommend_batch(&tickers, weight.unwrap_or(default_weight))
                .await;

            if *summary {
                let report = serde_json::json!({
                    "records": records,
                    "summary": portfolio_summary(&records),
                });
                print_json(&report, cli.pretty)?;
            } else if records.len() == 1 {
                print_json(&records[0], cli.pretty)?;
            } else {
                print_json(&records, cli.pretty)?;
            }
        }
    }

    Ok(())
}
