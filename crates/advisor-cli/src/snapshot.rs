use analysis_core::{
    AnalysisError, HeadlineSentiment, MarketDataProvider, RawMetricSet, RawSentimentSet, SentimentProvider,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
struct TickerSnapshot {
    #[serde(default)]
    metrics: RawMetricSet,
    #[serde(default)]
    headlines: Vec<HeadlineSentiment>,
    #[serde(default)]
    entities: BTreeMap<String, u32>,
}

/// Market data and sentiment served from a JSON snapshot file:
///
/// ```json
/// { "TCS.NS": { "metrics": { "pe_ratio": 28.1, "roe": 0.46 },
///               "headlines": [{ "title": "...", "score": 0.4 }],
///               "entities": { "TCS": 3 } } }
/// ```
///
/// Ratios such as `roe` are fractions and `debt_to_equity` is a plain ratio.
/// A yfinance `debtToEquity` of 41.0 should be stored as 0.41.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProvider {
    tickers: HashMap<String, TickerSnapshot>,
}

impl SnapshotProvider {
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let provider = Self::from_json(&json).with_context(|| format!("Invalid snapshot {}", path.display()))?;
        if provider.is_empty() {
            tracing::warn!("Snapshot {} contains no tickers", path.display());
        } else {
            tracing::info!("Loaded snapshot with {} tickers from {}", provider.len(), path.display());
        }
        Ok(provider)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, TickerSnapshot> = serde_json::from_str(json)?;
        let tickers = raw
            .into_iter()
            .map(|(ticker, snapshot)| (ticker.trim().to_uppercase(), snapshot))
            .collect();
        Ok(Self { tickers })
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Every ticker in the snapshot, sorted
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.tickers.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    fn snapshot(&self, ticker: &str) -> Result<&TickerSnapshot, AnalysisError> {
        self.tickers
            .get(&ticker.trim().to_uppercase())
            .ok_or_else(|| AnalysisError::UnknownTicker(ticker.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for SnapshotProvider {
    async fn fetch_metrics(&self, ticker: &str) -> Result<RawMetricSet, AnalysisError> {
        Ok(self.snapshot(ticker)?.metrics.clone())
    }
}

#[async_trait]
impl SentimentProvider for SnapshotProvider {
    async fn fetch_sentiment(&self, ticker: &str) -> Result<RawSentimentSet, AnalysisError> {
        let snapshot = self.snapshot(ticker)?;
        Ok(RawSentimentSet::new(
            snapshot.headlines.clone(),
            snapshot.entities.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::MetricKind;

    const SNAPSHOT: &str = r#"{
        "reliance.ns": {
            "metrics": { "trailingPE": 24.3, "returnOnEquity": "0.09", "debtToEquity": null },
            "headlines": [
                { "title": "Jio tariff hike", "score": 0.6 },
                { "title": "Retail slowdown", "score": -0.2 }
            ],
            "entities": { "Jio": 2, "Reliance Retail": 1 }
        },
        "EMPTY": {}
    }"#;

    #[tokio::test]
    async fn test_serves_both_categories() {
        let provider = SnapshotProvider::from_json(SNAPSHOT).unwrap();
        assert_eq!(provider.tickers(), vec!["EMPTY", "RELIANCE.NS"]);

        let metrics = provider.fetch_metrics("RELIANCE.NS").await.unwrap();
        assert_eq!(metrics.get(MetricKind::PeRatio), Some(24.3));
        assert_eq!(metrics.get(MetricKind::Roe), Some(0.09));
        assert_eq!(metrics.get(MetricKind::DebtToEquity), None);

        let sentiment = provider.fetch_sentiment("reliance.ns").await.unwrap();
        assert_eq!(sentiment.headlines.len(), 2);
        assert_eq!(sentiment.entity_mentions.get("Jio"), Some(&2));

        let empty = provider.fetch_sentiment("EMPTY").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ticker() {
        let provider = SnapshotProvider::from_json(SNAPSHOT).unwrap();
        let err = provider.fetch_metrics("NOPE").await.unwrap_err();
        assert_eq!(err, AnalysisError::UnknownTicker("NOPE".to_string()));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("snapshot-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, SNAPSHOT).await.unwrap();
        let provider = SnapshotProvider::load(&path).await.unwrap();
        assert_eq!(provider.len(), 2);
        tokio::fs::remove_file(&path).await.ok();

        assert!(SnapshotProvider::load(&path).await.is_err());
        assert!(SnapshotProvider::from_json("[1, 2]").is_err());
    }
}
