use anyhow::{bail, Context, Result};
use cache_manager::CacheConfig;
use data_normalizer::BenchmarkSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    // Cache lifetimes per category
    pub fundamental_ttl: Duration, // 1 hour
    pub sentiment_ttl: Duration,   // 15 minutes

    /// Upper bound on each provider call
    pub upstream_timeout: Duration,

    /// Sentiment weight used when the caller passes NaN
    pub default_weight: f64,

    pub benchmarks: BenchmarkSet,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            fundamental_ttl: Duration::from_secs(3600),
            sentiment_ttl: Duration::from_secs(900),
            upstream_timeout: Duration::from_secs(10),
            default_weight: 0.5,
            benchmarks: BenchmarkSet::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; missing variables take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let secs = |name: &str, default: &str| -> Result<Duration> {
            let value: u64 = var(name, default)
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", name))?;
            Ok(Duration::from_secs(value))
        };

        let benchmarks = match lookup("BENCHMARKS_FILE") {
            Some(path) if !path.trim().is_empty() => load_benchmarks(path.trim())?,
            _ => BenchmarkSet::default(),
        };

        let config = Self {
            fundamental_ttl: secs("FUNDAMENTAL_CACHE_TTL_SECS", "3600")?,
            sentiment_ttl: secs("SENTIMENT_CACHE_TTL_SECS", "900")?,
            upstream_timeout: secs("UPSTREAM_TIMEOUT_SECS", "10")?,
            default_weight: var("DEFAULT_SENTIMENT_WEIGHT", "0.5")
                .trim()
                .parse()
                .context("DEFAULT_SENTIMENT_WEIGHT must be a number")?,
            benchmarks,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_weight) {
            bail!(
                "default sentiment weight must be within 0.0..=1.0, got {}",
                self.default_weight
            );
        }
        if self.upstream_timeout.is_zero() {
            bail!("upstream timeout must be greater than zero");
        }
        self.benchmarks
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(())
    }

    /// Lifetime of the advisory record cache: the shorter of the two category TTLs
    pub fn record_ttl(&self) -> Duration {
        self.fundamental_ttl.min(self.sentiment_ttl)
    }
}

fn load_benchmarks(path: &str) -> Result<BenchmarkSet> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read benchmarks file {}", path))?;
    BenchmarkSet::from_json(&json).map_err(|e| anyhow::anyhow!("{}: {}", path, e))
}

/// Durable cache location from `CACHE_DIR` / `CACHE_NAMESPACE`
pub fn cache_config_from_env() -> CacheConfig {
    cache_config_from_lookup(|name| env::var(name).ok())
}

pub fn cache_config_from_lookup<F>(lookup: F) -> CacheConfig
where
    F: Fn(&str) -> Option<String>,
{
    let dir = lookup("CACHE_DIR")
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::cache_dir().map(|d| d.join("stock-advisor")))
        .unwrap_or_else(|| PathBuf::from(".cache"));

    let config = CacheConfig::new(dir);
    match lookup("CACHE_NAMESPACE") {
        Some(ns) if !ns.trim().is_empty() => config.with_namespace(ns.trim()),
        _ => config,
    }
}
