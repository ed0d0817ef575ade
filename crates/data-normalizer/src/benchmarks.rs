use analysis_core::{AnalysisError, MetricKind};
use serde::{Deserialize, Serialize};

/// How a provider's raw value relates to the benchmark's units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputScale {
    /// Raw value is already in benchmark units
    #[default]
    Raw,
    /// Raw value is a fraction (0.18) and the benchmark is in percent (18)
    FractionToPercent,
    /// Raw value is a percent (41.0) and the benchmark is a plain ratio (0.41).
    /// yfinance reports `debtToEquity` this way.
    PercentToFraction,
}

impl InputScale {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            InputScale::Raw => value,
            InputScale::FractionToPercent => value * 100.0,
            InputScale::PercentToFraction => value / 100.0,
        }
    }
}

/// Linear curve between a "poor" raw value (score 0) and an "excellent" one (score 100).
///
/// `excellent > poor` means higher is better (ROE, margins); `excellent < poor`
/// means lower is better (debt-to-equity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonotonicBenchmark {
    pub excellent: f64,
    pub poor: f64,
    #[serde(default)]
    pub scale: InputScale,
}

/// Target range with a tolerance band on both sides (P/E, P/B)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBenchmark {
    pub lo: f64,
    pub hi: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum MetricCurve {
    Monotonic(MonotonicBenchmark),
    RangeOptimal(RangeBenchmark),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBenchmark {
    pub metric: MetricKind,
    pub weight: f64,
    #[serde(flatten)]
    pub curve: MetricCurve,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentBenchmark {
    /// Headline count at which the mean carries half its full weight
    pub coverage_half_saturation: f64,
    /// Readings at or above this count as positive
    pub positive_threshold: f64,
    /// Readings at or below this count as negative
    pub negative_threshold: f64,
    /// How many entities to keep in the breakdown
    pub top_entities: usize,
}

impl Default for SentimentBenchmark {
    fn default() -> Self {
        Self {
            coverage_half_saturation: 3.0,
            positive_threshold: 0.05,
            negative_threshold: -0.05,
            top_entities: 10,
        }
    }
}

/// Benchmark parameters for every metric plus the sentiment curve.
/// Supplied at construction time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSet {
    pub metrics: Vec<MetricBenchmark>,
    #[serde(default)]
    pub sentiment: SentimentBenchmark,
}

impl Default for BenchmarkSet {
    /// Benchmarks tuned for large-cap Indian equities. ROE, margin and growth
    /// are read as fractions and debt-to-equity as a plain ratio.
    fn default() -> Self {
        Self {
            metrics: vec![
                MetricBenchmark {
                    metric: MetricKind::PeRatio,
                    weight: 0.25,
                    curve: MetricCurve::RangeOptimal(RangeBenchmark {
                        lo: 15.0,
                        hi: 25.0,
                        tolerance: 10.0,
                    }),
                },
                MetricBenchmark {
                    metric: MetricKind::PbRatio,
                    weight: 0.15,
                    curve: MetricCurve::RangeOptimal(RangeBenchmark {
                        lo: 1.0,
                        hi: 3.0,
                        tolerance: 2.0,
                    }),
                },
                MetricBenchmark {
                    metric: MetricKind::Roe,
                    weight: 0.25,
                    curve: MetricCurve::Monotonic(MonotonicBenchmark {
                        excellent: 20.0,
                        poor: 5.0,
                        scale: InputScale::FractionToPercent,
                    }),
                },
                MetricBenchmark {
                    metric: MetricKind::DebtToEquity,
                    weight: 0.15,
                    curve: MetricCurve::Monotonic(MonotonicBenchmark {
                        excellent: 0.3,
                        poor: 1.5,
                        scale: InputScale::Raw,
                    }),
                },
                MetricBenchmark {
                    metric: MetricKind::ProfitMargin,
                    weight: 0.10,
                    curve: MetricCurve::Monotonic(MonotonicBenchmark {
                        excellent: 20.0,
                        poor: 2.0,
                        scale: InputScale::FractionToPercent,
                    }),
                },
                MetricBenchmark {
                    metric: MetricKind::RevenueGrowth,
                    weight: 0.10,
                    curve: MetricCurve::Monotonic(MonotonicBenchmark {
                        excellent: 30.0,
                        poor: -10.0,
                        scale: InputScale::FractionToPercent,
                    }),
                },
            ],
            sentiment: SentimentBenchmark::default(),
        }
    }
}

impl BenchmarkSet {
    /// Same curves, every metric weighted equally
    pub fn equal_weights(mut self) -> Self {
        for m in &mut self.metrics {
            m.weight = 1.0;
        }
        self
    }

    pub fn for_metric(&self, metric: MetricKind) -> Option<&MetricBenchmark> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let set: Self = serde_json::from_str(json)
            .map_err(|e| AnalysisError::InvalidConfig(format!("benchmarks: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        let mut seen = std::collections::HashSet::new();
        for m in &self.metrics {
            if !seen.insert(m.metric) {
                return invalid(format!("{:?} configured twice", m.metric));
            }
            if !m.weight.is_finite() || m.weight < 0.0 {
                return invalid(format!("{:?} weight must be a non-negative number", m.metric));
            }
            match m.curve {
                MetricCurve::Monotonic(b) => {
                    if !b.excellent.is_finite() || !b.poor.is_finite() {
                        return invalid(format!("{:?} thresholds must be finite", m.metric));
                    }
                }
                MetricCurve::RangeOptimal(b) => {
                    if !b.lo.is_finite() || !b.hi.is_finite() || !b.tolerance.is_finite() {
                        return invalid(format!("{:?} range must be finite", m.metric));
                    }
                    if b.lo > b.hi {
                        return invalid(format!("{:?} range has lo > hi", m.metric));
                    }
                    if b.tolerance < 0.0 {
                        return invalid(format!("{:?} tolerance must not be negative", m.metric));
                    }
                }
            }
        }

        if !self.metrics.is_empty() && self.metrics.iter().all(|m| m.weight == 0.0) {
            return invalid("at least one metric needs a positive weight".to_string());
        }

        let s = &self.sentiment;
        if !s.coverage_half_saturation.is_finite() || s.coverage_half_saturation < 0.0 {
            return invalid("coverage_half_saturation must be a non-negative number".to_string());
        }
        if s.negative_threshold > s.positive_threshold {
            return invalid("negative_threshold must not exceed positive_threshold".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_benchmarks_are_valid() {
        let set = BenchmarkSet::default();
        assert!(set.validate().is_ok());
        let total: f64 = set.metrics.iter().map(|m| m.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(set.metrics.len(), MetricKind::ALL.len());
    }

    #[test]
    fn test_input_scale() {
        assert_eq!(InputScale::Raw.apply(0.18), 0.18);
        assert!((InputScale::FractionToPercent.apply(0.18) - 18.0).abs() < 1e-9);
        assert!((InputScale::FractionToPercent.apply(-0.05) + 5.0).abs() < 1e-9);
        assert!((InputScale::PercentToFraction.apply(41.0) - 0.41).abs() < 1e-9);
    }

    #[test]
    fn test_scale_parses_from_config() {
        let parsed = BenchmarkSet::from_json(
            r#"{"metrics": [
                {"metric": "debt_to_equity", "weight": 1.0, "curve": "monotonic",
                 "excellent": 0.3, "poor": 1.5, "scale": "percent_to_fraction"}
            ]}"#,
        )
        .unwrap();
        match parsed.for_metric(MetricKind::DebtToEquity).unwrap().curve {
            MetricCurve::Monotonic(b) => assert_eq!(b.scale, InputScale::PercentToFraction),
            other => panic!("unexpected curve {:?}", other),
        }
    }

    #[test]
    fn test_benchmarks_round_trip_through_json() {
        let json = serde_json::to_string(&BenchmarkSet::default()).unwrap();
        assert!(json.contains("\"curve\":\"range_optimal\""));
        let parsed = BenchmarkSet::from_json(&json).unwrap();
        assert_eq!(parsed, BenchmarkSet::default());
    }

    #[test]
    fn test_parse_minimal_config() {
        let parsed = BenchmarkSet::from_json(
            r#"{"metrics": [
                {"metric": "pe_ratio", "weight": 1.0, "curve": "range_optimal", "lo": 10, "hi": 20, "tolerance": 5},
                {"metric": "roe", "weight": 1.0, "curve": "monotonic", "excellent": 25, "poor": 5}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.metrics.len(), 2);
        assert_eq!(parsed.sentiment, SentimentBenchmark::default());
        match parsed.for_metric(MetricKind::Roe).unwrap().curve {
            MetricCurve::Monotonic(b) => assert_eq!(b.scale, InputScale::Raw),
            other => panic!("unexpected curve {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let mut set = BenchmarkSet::default();
        set.metrics[0].curve = MetricCurve::RangeOptimal(RangeBenchmark {
            lo: 30.0,
            hi: 10.0,
            tolerance: 5.0,
        });
        assert!(set.validate().is_err());

        let mut set = BenchmarkSet::default();
        set.metrics[1].weight = f64::NAN;
        assert!(set.validate().is_err());

        let mut set = BenchmarkSet::default();
        for m in &mut set.metrics {
            m.weight = 0.0;
        }
        assert!(set.validate().is_err());

        let mut set = BenchmarkSet::default();
        let duplicate = set.metrics[0];
        set.metrics.push(duplicate);
        assert!(set.validate().is_err());

        assert!(BenchmarkSet::from_json("{\"metrics\": 3}").is_err());
    }
}
