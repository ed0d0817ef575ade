use analysis_core::{FundamentalBreakdown, MetricScore, RawMetricSet, NEUTRAL_SCORE};

use crate::benchmarks::{BenchmarkSet, MetricBenchmark};
use crate::curves::{clamp_score, curve_score};

fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

pub fn score_metric(metrics: &RawMetricSet, benchmark: &MetricBenchmark) -> MetricScore {
    let raw = metrics.get(benchmark.metric);
    MetricScore {
        metric: benchmark.metric,
        raw,
        score: curve_score(raw, &benchmark.curve),
        weight: effective_weight(benchmark.weight),
        populated: raw.is_some(),
    }
}

/// Weighted mean of every configured metric's score. Missing metrics contribute
/// the neutral default, so gaps pull the composite toward 50 instead of being
/// dropped. Computed as an offset from neutral so an empty set is exactly 50.
pub fn fundamental_composite(metrics: &RawMetricSet, benchmarks: &BenchmarkSet) -> FundamentalBreakdown {
    let scores: Vec<MetricScore> = benchmarks
        .metrics
        .iter()
        .map(|b| score_metric(metrics, b))
        .collect();

    let total_weight: f64 = scores.iter().map(|s| s.weight).sum();
    let composite = if total_weight > 0.0 {
        let offset: f64 = scores
            .iter()
            .map(|s| s.weight * (s.score - NEUTRAL_SCORE))
            .sum();
        NEUTRAL_SCORE + offset / total_weight
    } else {
        NEUTRAL_SCORE
    };

    FundamentalBreakdown {
        composite: clamp_score(composite),
        populated_metrics: scores.iter().filter(|s| s.populated).count(),
        metrics: scores,
        available: true,
    }
}

/// Neutral breakdown used when the market-data provider could not be reached
pub fn unavailable_fundamentals(benchmarks: &BenchmarkSet) -> FundamentalBreakdown {
    FundamentalBreakdown {
        available: false,
        ..fundamental_composite(&RawMetricSet::default(), benchmarks)
    }
}
