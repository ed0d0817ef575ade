use analysis_core::NEUTRAL_SCORE;

use crate::benchmarks::{MetricCurve, MonotonicBenchmark, RangeBenchmark};

/// Score at the outer edges of a range metric's tolerance band
pub const BAND_EDGE_SCORE: f64 = 40.0;

/// Force a score into [0, 100]. NaN becomes the neutral default.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        NEUTRAL_SCORE
    } else {
        score.clamp(0.0, 100.0)
    }
}

fn usable(raw: Option<f64>) -> Option<f64> {
    raw.filter(|v| v.is_finite())
}

/// Linear interpolation from `poor` (0) to `excellent` (100), clipped at both ends.
pub fn monotonic_score(raw: Option<f64>, benchmark: &MonotonicBenchmark) -> f64 {
    let Some(value) = usable(raw) else {
        return NEUTRAL_SCORE;
    };
    let (excellent, poor) = (benchmark.excellent, benchmark.poor);
    if !excellent.is_finite() || !poor.is_finite() {
        return NEUTRAL_SCORE;
    }

    let value = benchmark.scale.apply(value);
    let span = excellent - poor;
    if span == 0.0 {
        return if value >= excellent { 100.0 } else { 0.0 };
    }
    clamp_score((value - poor) / span * 100.0)
}

/// 100 at the midpoint of `[lo, hi]`, falling linearly to [`BAND_EDGE_SCORE`] at
/// `lo - tolerance` and `hi + tolerance`, then decaying as `edge * band / distance`
/// beyond the band. Strictly unimodal and never negative.
pub fn range_optimal_score(raw: Option<f64>, benchmark: &RangeBenchmark) -> f64 {
    let Some(value) = usable(raw) else {
        return NEUTRAL_SCORE;
    };
    let RangeBenchmark { lo, hi, tolerance } = *benchmark;
    if !lo.is_finite() || !hi.is_finite() || !tolerance.is_finite() {
        return NEUTRAL_SCORE;
    }

    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let midpoint = lo + (hi - lo) / 2.0;
    let band = (hi - lo) / 2.0 + tolerance.max(0.0);
    let distance = (value - midpoint).abs();

    if band <= 0.0 {
        return if distance == 0.0 { 100.0 } else { 0.0 };
    }

    let score = if distance <= band {
        100.0 - (100.0 - BAND_EDGE_SCORE) * (distance / band)
    } else {
        BAND_EDGE_SCORE * band / distance
    };
    clamp_score(score)
}

pub fn curve_score(raw: Option<f64>, curve: &MetricCurve) -> f64 {
    match curve {
        MetricCurve::Monotonic(b) => monotonic_score(raw, b),
        MetricCurve::RangeOptimal(b) => range_optimal_score(raw, b),
    }
}

/// Linearly rescale `value` from `[min, max]` onto `[target_min, target_max]`,
/// clamping to the source range first.
pub fn scale_to_range(value: f64, min: f64, max: f64, target_min: f64, target_max: f64) -> f64 {
    if !value.is_finite() || !min.is_finite() || !max.is_finite() || max == min {
        return target_min;
    }
    let (min, max) = if min < max { (min, max) } else { (max, min) };
    let normalized = (value.clamp(min, max) - min) / (max - min);
    target_min + normalized * (target_max - target_min)
}

/// Percentage of `peers` at or below `value` (0-100). Neutral when there is nothing to compare with.
pub fn percentile_score(value: Option<f64>, peers: &[Option<f64>]) -> f64 {
    let Some(value) = usable(value) else {
        return NEUTRAL_SCORE;
    };
    let clean: Vec<f64> = peers.iter().filter_map(|p| usable(*p)).collect();
    if clean.is_empty() {
        return NEUTRAL_SCORE;
    }
    let at_or_below = clean.iter().filter(|p| **p <= value).count();
    clamp_score(at_or_below as f64 / clean.len() as f64 * 100.0)
}
