use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Score given to any metric whose raw value is missing or unusable.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Final scores at or above this are BUY.
pub const BUY_THRESHOLD: f64 = 70.0;

/// Final scores at or above this (and below [`BUY_THRESHOLD`]) are HOLD.
pub const HOLD_THRESHOLD: f64 = 50.0;

/// Fundamental metrics understood by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    PeRatio,
    PbRatio,
    Roe,
    DebtToEquity,
    ProfitMargin,
    RevenueGrowth,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::PeRatio,
        MetricKind::PbRatio,
        MetricKind::Roe,
        MetricKind::DebtToEquity,
        MetricKind::ProfitMargin,
        MetricKind::RevenueGrowth,
    ];

    /// Human-readable label for the metric
    pub fn to_label(&self) -> &'static str {
        match self {
            MetricKind::PeRatio => "P/E Ratio",
            MetricKind::PbRatio => "P/B Ratio",
            MetricKind::Roe => "Return on Equity",
            MetricKind::DebtToEquity => "Debt to Equity",
            MetricKind::ProfitMargin => "Net Profit Margin",
            MetricKind::RevenueGrowth => "Revenue Growth",
        }
    }
}

/// Accepts numbers and numeric strings; anything else (null, text, objects) is a provider gap.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

/// Raw fundamental ratios as returned by a market-data provider.
///
/// Every field is optional. Provider-specific spellings (`trailingPE`,
/// `returnOnEquity`, ...) are accepted as aliases. ROE, margin and growth are
/// fractions (0.18 for 18%). Debt-to-equity is a plain ratio (0.41); values
/// reported as a percent need a `percent_to_fraction` scale on that benchmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetricSet {
    #[serde(default, deserialize_with = "lenient_f64", alias = "trailingPE", alias = "pe")]
    pub pe_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "priceToBook", alias = "pb")]
    pub pb_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "returnOnEquity")]
    pub roe: Option<f64>,
    /// Plain ratio. yfinance's `debtToEquity` is a percent (41.0 for 0.41).
    #[serde(default, deserialize_with = "lenient_f64", alias = "debtToEquity")]
    pub debt_to_equity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "profitMargins", alias = "net_margin")]
    pub profit_margin: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "revenueGrowth")]
    pub revenue_growth: Option<f64>,
}

impl RawMetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, used by providers while assembling a set
    pub fn with(mut self, metric: MetricKind, value: Option<f64>) -> Self {
        let slot = match metric {
            MetricKind::PeRatio => &mut self.pe_ratio,
            MetricKind::PbRatio => &mut self.pb_ratio,
            MetricKind::Roe => &mut self.roe,
            MetricKind::DebtToEquity => &mut self.debt_to_equity,
            MetricKind::ProfitMargin => &mut self.profit_margin,
            MetricKind::RevenueGrowth => &mut self.revenue_growth,
        };
        *slot = value;
        self
    }

    /// Raw value for `metric`, `None` when absent or not a finite number
    pub fn get(&self, metric: MetricKind) -> Option<f64> {
        let value = match metric {
            MetricKind::PeRatio => self.pe_ratio,
            MetricKind::PbRatio => self.pb_ratio,
            MetricKind::Roe => self.roe,
            MetricKind::DebtToEquity => self.debt_to_equity,
            MetricKind::ProfitMargin => self.profit_margin,
            MetricKind::RevenueGrowth => self.revenue_growth,
        };
        value.filter(|v| v.is_finite())
    }

    /// Number of metrics carrying a usable value
    pub fn populated_count(&self) -> usize {
        MetricKind::ALL.iter().filter(|m| self.get(**m).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_count() == 0
    }
}

/// One headline and its raw sentiment reading in [-1, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineSentiment {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: Option<f64>,
}

impl HeadlineSentiment {
    pub fn new(title: impl Into<String>, score: f64) -> Self {
        Self {
            title: title.into(),
            score: Some(score),
        }
    }
}

/// Headline-level sentiment for a ticker plus an entity-mention tally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSentimentSet {
    #[serde(default)]
    pub headlines: Vec<HeadlineSentiment>,
    #[serde(default)]
    pub entity_mentions: BTreeMap<String, u32>,
}

impl RawSentimentSet {
    pub fn new(headlines: Vec<HeadlineSentiment>, entity_mentions: BTreeMap<String, u32>) -> Self {
        Self {
            headlines,
            entity_mentions,
        }
    }

    /// Finite readings, clamped into [-1, 1], in headline order
    pub fn readings(&self) -> Vec<f64> {
        self.headlines
            .iter()
            .filter_map(|h| h.score)
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(-1.0, 1.0))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.readings().is_empty()
    }
}

/// Normalized score of a single fundamental metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: MetricKind,
    pub raw: Option<f64>,
    pub score: f64,
    pub weight: f64,
    pub populated: bool,
}

/// Fundamental composite together with its per-metric breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalBreakdown {
    pub composite: f64,
    pub metrics: Vec<MetricScore>,
    pub populated_metrics: usize,
    /// False when the provider failed or timed out
    pub available: bool,
}

impl FundamentalBreakdown {
    pub fn has_data(&self) -> bool {
        self.available && self.populated_metrics > 0
    }

    pub fn metric(&self, metric: MetricKind) -> Option<&MetricScore> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    pub entity: String,
    pub mentions: u32,
}

/// Sentiment composite together with the statistics it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub composite: f64,
    pub headline_count: usize,
    pub mean_sentiment: Option<f64>,
    /// 0.0 to 1.0, grows with headline volume
    pub coverage_confidence: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub volatility: f64,
    pub total_entity_mentions: u32,
    pub top_entities: Vec<EntityMention>,
    /// False when the provider failed or timed out
    pub available: bool,
}

impl SentimentBreakdown {
    pub fn has_data(&self) -> bool {
        self.available && self.headline_count > 0
    }
}

/// Discrete outcome of the scoring pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
    InsufficientData,
}

impl Recommendation {
    /// Classify a final score. 70 is BUY, exactly 50 is HOLD.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= BUY_THRESHOLD => Recommendation::Buy,
            s if s >= HOLD_THRESHOLD => Recommendation::Hold,
            _ => Recommendation::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Sell => "SELL",
            Recommendation::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a category composite came from on this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Served from the cache
    Cached,
    /// Fetched from the provider and normalized on this request
    Fetched,
    /// Provider answered but had nothing for this ticker
    Empty,
    /// Provider failed or timed out; neutral default used
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    pub fundamental: CategoryStatus,
    pub sentiment: CategoryStatus,
}

/// Scored recommendation for one ticker at one weight setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockScoreRecord {
    pub ticker: String,
    pub fundamental_composite: f64,
    pub sentiment_composite: f64,
    /// Fraction of the final score assigned to sentiment (0.0 to 1.0)
    pub weight: f64,
    /// `None` only when neither category had any data
    pub final_score: Option<f64>,
    pub recommendation: Recommendation,
    pub computed_at: DateTime<Utc>,
    pub reasoning: String,
    pub data_quality: DataQuality,
    pub fundamental: FundamentalBreakdown,
    pub sentiment: SentimentBreakdown,
}

impl StockScoreRecord {
    pub fn is_indeterminate(&self) -> bool {
        self.recommendation == Recommendation::InsufficientData
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recommendation_boundaries() {
        assert_eq!(Recommendation::from_score(70.0), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(69.999), Recommendation::Hold);
        assert_eq!(Recommendation::from_score(50.0), Recommendation::Hold);
        assert_eq!(Recommendation::from_score(49.999), Recommendation::Sell);
        assert_eq!(Recommendation::from_score(100.0), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(0.0), Recommendation::Sell);
    }

    #[test]
    fn test_recommendation_serializes_upper_case() {
        let value = serde_json::to_value(Recommendation::InsufficientData).unwrap();
        assert_eq!(value, json!("INSUFFICIENT_DATA"));
        assert_eq!(Recommendation::Buy.to_string(), "BUY");
    }

    #[test]
    fn test_raw_metrics_accept_provider_gaps() {
        let metrics: RawMetricSet = serde_json::from_value(json!({
            "trailingPE": 20.5,
            "priceToBook": "3.1",
            "returnOnEquity": "N/A",
            "debt_to_equity": null,
            "profitMargins": {"value": 0.1},
            "unrelated": 42
        }))
        .unwrap();

        assert_eq!(metrics.get(MetricKind::PeRatio), Some(20.5));
        assert_eq!(metrics.get(MetricKind::PbRatio), Some(3.1));
        assert_eq!(metrics.get(MetricKind::Roe), None);
        assert_eq!(metrics.get(MetricKind::DebtToEquity), None);
        assert_eq!(metrics.get(MetricKind::ProfitMargin), None);
        assert_eq!(metrics.populated_count(), 2);
    }

    #[test]
    fn test_non_finite_metrics_are_not_populated() {
        let metrics = RawMetricSet::new()
            .with(MetricKind::PeRatio, Some(f64::NAN))
            .with(MetricKind::Roe, Some(f64::INFINITY));
        assert!(metrics.is_empty());
        assert_eq!(metrics.get(MetricKind::PeRatio), None);
    }

    #[test]
    fn test_sentiment_readings_are_clamped_and_filtered() {
        let set = RawSentimentSet::new(
            vec![
                HeadlineSentiment::new("Record profits", 1.7),
                HeadlineSentiment::new("Plant fire", -0.4),
                HeadlineSentiment::new("Garbled", f64::NAN),
                HeadlineSentiment {
                    title: "No score".to_string(),
                    score: None,
                },
            ],
            BTreeMap::new(),
        );
        assert_eq!(set.readings(), vec![1.0, -0.4]);
        assert!(!set.is_empty());
        assert!(RawSentimentSet::default().is_empty());
    }
}
