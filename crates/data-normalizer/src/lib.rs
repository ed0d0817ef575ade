//! Turns raw provider data into 0-100 scores.
//!
//! Every missing or unusable value is replaced by [`analysis_core::NEUTRAL_SCORE`]
//! here, so callers never see a NaN or an out-of-range number.

pub mod benchmarks;
pub mod curves;
pub mod fundamental;
pub mod grade;
pub mod sentiment;
pub mod stats;

pub use benchmarks::*;
pub use curves::*;
pub use fundamental::*;
pub use grade::*;
pub use sentiment::*;

use analysis_core::{FundamentalBreakdown, RawMetricSet, RawSentimentSet, SentimentBreakdown};

/// Normalizer bound to one immutable [`BenchmarkSet`]
#[derive(Debug, Clone, Default)]
pub struct DataNormalizer {
    benchmarks: BenchmarkSet,
}

impl DataNormalizer {
    pub fn new(benchmarks: BenchmarkSet) -> Self {
        Self { benchmarks }
    }

    pub fn benchmarks(&self) -> &BenchmarkSet {
        &self.benchmarks
    }

    pub fn fundamental(&self, metrics: &RawMetricSet) -> FundamentalBreakdown {
        fundamental_composite(metrics, &self.benchmarks)
    }

    pub fn sentiment(&self, set: &RawSentimentSet) -> SentimentBreakdown {
        sentiment_composite(set, &self.benchmarks.sentiment)
    }

    pub fn unavailable_fundamentals(&self) -> FundamentalBreakdown {
        unavailable_fundamentals(&self.benchmarks)
    }

    pub fn unavailable_sentiment(&self) -> SentimentBreakdown {
        unavailable_sentiment()
    }
}
