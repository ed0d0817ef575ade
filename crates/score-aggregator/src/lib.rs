use analysis_core::{
    AnalysisError, CategoryStatus, DataQuality, FundamentalBreakdown, MarketDataProvider, Recommendation,
    SentimentBreakdown, SentimentProvider, StockScoreRecord,
};
use cache_manager::CacheManager;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use data_normalizer::{clamp_score, DataNormalizer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod config;
pub mod reasoning;
pub mod summary;

pub use config::{cache_config_from_env, AggregatorConfig};
pub use reasoning::build_reasoning;
pub use summary::{portfolio_summary, PortfolioSummary, TickerScore};

pub fn fundamental_key(ticker: &str) -> String {
    format!("{}:fundamental", ticker)
}

pub fn sentiment_key(ticker: &str) -> String {
    format!("{}:sentiment", ticker)
}

/// Weight bucket used in the record cache key (0..=100)
pub fn weight_bucket(weight: f64) -> u32 {
    (weight.clamp(0.0, 1.0) * 100.0).round() as u32
}

pub fn record_key(ticker: &str, weight: f64) -> String {
    format!("{}:record:{}", ticker, weight_bucket(weight))
}

fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// `(1 - weight) * fundamental + weight * sentiment`, clamped to [0, 100]
pub fn blend_scores(fundamental: f64, sentiment: f64, weight: f64) -> f64 {
    let weight = weight.clamp(0.0, 1.0);
    clamp_score((1.0 - weight) * fundamental + weight * sentiment)
}

fn category_status(has_data: bool, from_cache: bool) -> CategoryStatus {
    match (has_data, from_cache) {
        (false, _) => CategoryStatus::Empty,
        (true, true) => CategoryStatus::Cached,
        (true, false) => CategoryStatus::Fetched,
    }
}

/// Assemble a record from two category breakdowns. Indeterminate when neither
/// category carries any data.
pub fn assemble_record(
    ticker: &str,
    fundamental: FundamentalBreakdown,
    sentiment: SentimentBreakdown,
    data_quality: DataQuality,
    weight: f64,
    computed_at: DateTime<Utc>,
) -> StockScoreRecord {
    let final_score = if fundamental.has_data() || sentiment.has_data() {
        Some(blend_scores(fundamental.composite, sentiment.composite, weight))
    } else {
        None
    };
    let recommendation = final_score.map_or(Recommendation::InsufficientData, Recommendation::from_score);
    let reasoning = build_reasoning(&fundamental, &sentiment, data_quality, weight, final_score, recommendation);

    StockScoreRecord {
        ticker: ticker.to_string(),
        fundamental_composite: fundamental.composite,
        sentiment_composite: sentiment.composite,
        weight,
        final_score,
        recommendation,
        computed_at,
        reasoning,
        data_quality,
        fundamental,
        sentiment,
    }
}

/// Cache-through scoring of tickers.
///
/// Category composites are cached independently under `{ticker}:fundamental`
/// and `{ticker}:sentiment`; the final score is recomputed on every call so a
/// new weight never needs an upstream round trip.
pub struct ScoreAggregator {
    config: AggregatorConfig,
    normalizer: DataNormalizer,
    cache: CacheManager,
    metrics_provider: Arc<dyn MarketDataProvider>,
    sentiment_provider: Arc<dyn SentimentProvider>,
    /// One lock per cache key with a fetch in progress. Holds the error of a
    /// failed fetch so callers queued behind it do not fetch again.
    in_flight: DashMap<String, Arc<Mutex<Option<AnalysisError>>>>,
}

impl ScoreAggregator {
    pub fn new(
        config: AggregatorConfig,
        cache: CacheManager,
        metrics_provider: Arc<dyn MarketDataProvider>,
        sentiment_provider: Arc<dyn SentimentProvider>,
    ) -> Self {
        let normalizer = DataNormalizer::new(config.benchmarks.clone());
        Self {
            config,
            normalizer,
            cache,
            metrics_provider,
            sentiment_provider,
            in_flight: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn normalizer(&self) -> &DataNormalizer {
        &self.normalizer
    }

    /// Clamp a caller-supplied sentiment weight into [0, 1]; NaN falls back to the default
    pub fn effective_weight(&self, weight: f64) -> f64 {
        if weight.is_nan() {
            tracing::warn!(
                "Sentiment weight is NaN, using default {:.2}",
                self.config.default_weight
            );
            return self.config.default_weight.clamp(0.0, 1.0);
        }
        let clamped = weight.clamp(0.0, 1.0);
        if clamped != weight {
            tracing::warn!("Sentiment weight {} out of range, clamped to {:.2}", weight, clamped);
        }
        clamped
    }

    /// Score one ticker. Never fails: provider problems degrade to neutral
    /// category scores, and a ticker with no data at all comes back as an
    /// `InsufficientData` record.
    pub async fn recommend(&self, ticker: &str, weight: f64) -> StockScoreRecord {
        let ticker = normalize_ticker(ticker);
        let weight = self.effective_weight(weight);
        tracing::info!("Scoring {} (sentiment weight {:.2})", ticker, weight);

        let ((fundamental, fundamental_status), (sentiment, sentiment_status)) = tokio::join!(
            self.fundamental_breakdown(&ticker),
            self.sentiment_breakdown(&ticker),
        );

        let data_quality = DataQuality {
            fundamental: fundamental_status,
            sentiment: sentiment_status,
        };
        let record = assemble_record(&ticker, fundamental, sentiment, data_quality, weight, self.cache.now());

        match record.final_score {
            Some(score) => tracing::info!("{}: {:.1} -> {}", ticker, score, record.recommendation),
            None => tracing::warn!("{}: no data in either category", ticker),
        }

        // Records built on a neutral fallback stay out of the record cache
        if fundamental_status != CategoryStatus::Unavailable && sentiment_status != CategoryStatus::Unavailable {
            self.cache
                .set(&record_key(&ticker, weight), &record, self.config.record_ttl())
                .await;
        }

        record
    }

    /// Drop both category composites for `ticker` and score it again from the providers
    pub async fn refresh(&self, ticker: &str, weight: f64) -> StockScoreRecord {
        let ticker = normalize_ticker(ticker);
        tracing::info!("Forcing refresh of {}", ticker);
        self.cache.invalidate(&fundamental_key(&ticker)).await;
        self.cache.invalidate(&sentiment_key(&ticker)).await;
        self.recommend(&ticker, weight).await
    }

    /// Score several tickers concurrently. Results keep the input order.
    pub async fn recommend_batch(&self, tickers: &[String], weight: f64) -> Vec<StockScoreRecord> {
        let futures: Vec<_> = tickers.iter().map(|t| self.recommend(t, weight)).collect();
        futures::future::join_all(futures).await
    }

    /// Last record computed for this ticker and weight bucket, if still fresh
    pub async fn cached_record(&self, ticker: &str, weight: f64) -> Option<StockScoreRecord> {
        let ticker = normalize_ticker(ticker);
        let weight = self.effective_weight(weight);
        self.cache.get(&record_key(&ticker, weight)).await
    }

    async fn fundamental_breakdown(&self, ticker: &str) -> (FundamentalBreakdown, CategoryStatus) {
        let key = fundamental_key(ticker);
        let result = self
            .load_through_cache(&key, self.config.fundamental_ttl, || async move {
                let metrics = self.metrics_provider.fetch_metrics(ticker).await?;
                tracing::debug!("{} fundamentals: {} metrics populated", ticker, metrics.populated_count());
                Ok::<_, AnalysisError>(self.normalizer.fundamental(&metrics))
            })
            .await;

        match result {
            Ok((breakdown, from_cache)) => {
                let status = category_status(breakdown.has_data(), from_cache);
                (breakdown, status)
            }
            Err(e) => {
                tracing::warn!("Fundamentals for {} unavailable: {}", ticker, e);
                (self.normalizer.unavailable_fundamentals(), CategoryStatus::Unavailable)
            }
        }
    }

    async fn sentiment_breakdown(&self, ticker: &str) -> (SentimentBreakdown, CategoryStatus) {
        let key = sentiment_key(ticker);
        let result = self
            .load_through_cache(&key, self.config.sentiment_ttl, || async move {
                let set = self.sentiment_provider.fetch_sentiment(ticker).await?;
                tracing::debug!("{} sentiment: {} headlines", ticker, set.headlines.len());
                Ok::<_, AnalysisError>(self.normalizer.sentiment(&set))
            })
            .await;

        match result {
            Ok((breakdown, from_cache)) => {
                let status = category_status(breakdown.has_data(), from_cache);
                (breakdown, status)
            }
            Err(e) => {
                tracing::warn!("Sentiment for {} unavailable: {}", ticker, e);
                (self.normalizer.unavailable_sentiment(), CategoryStatus::Unavailable)
            }
        }
    }

    /// Cache hit, or a single bounded upstream fetch per key. Concurrent misses
    /// for the same key wait for the first fetch and then read its result from
    /// the cache, or share its error if it failed. Failed fetches are not stored,
    /// so the next call after the last waiter leaves tries upstream again.
    async fn load_through_cache<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<(T, bool), AnalysisError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
    {
        if let Some(hit) = self.cache.get::<T>(key).await {
            tracing::debug!("Cache hit for {}", key);
            return Ok((hit, true));
        }

        let lock = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut failure = lock.lock().await;

        let result = match self.cache.get::<T>(key).await {
            Some(hit) => Ok((hit, true)),
            None => {
                if let Some(e) = failure.clone() {
                    tracing::debug!("Fetch for {} already failed while waiting: {}", key, e);
                    Err(e)
                } else {
                    tracing::debug!("Cache miss for {}, fetching upstream", key);
                    let fetched = match tokio::time::timeout(self.config.upstream_timeout, fetch()).await {
                        Ok(result) => result,
                        Err(_) => Err(AnalysisError::Timeout(self.config.upstream_timeout)),
                    };
                    match fetched {
                        Ok(value) => {
                            self.cache.set(key, &value, ttl).await;
                            Ok((value, false))
                        }
                        Err(e) => {
                            *failure = Some(e.clone());
                            Err(e)
                        }
                    }
                }
            }
        };

        drop(failure);
        // Only the map and this task still hold the lock: nobody is waiting
        self.in_flight.remove_if(key, |_, l| Arc::strong_count(l) <= 2);
        result
    }
}
