use async_trait::async_trait;
use crate::{AnalysisError, RawMetricSet, RawSentimentSet};

/// Source of raw financial ratios for a ticker.
///
/// Implementations may return a partially populated set; callers never assume
/// every metric is present.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_metrics(&self, ticker: &str) -> Result<RawMetricSet, AnalysisError>;
}

/// Source of headline-level sentiment readings for a ticker.
///
/// An empty set (no headlines) is a valid answer, not an error.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn fetch_sentiment(&self, ticker: &str) -> Result<RawSentimentSet, AnalysisError>;
}
