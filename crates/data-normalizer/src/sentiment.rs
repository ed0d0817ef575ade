use analysis_core::{EntityMention, RawSentimentSet, SentimentBreakdown, NEUTRAL_SCORE};

use crate::benchmarks::SentimentBenchmark;
use crate::curves::clamp_score;
use crate::stats::{mean, population_std_dev};

/// Weight given to the headline mean: `n / (n + half_saturation)`.
/// 0 with no headlines, 0.5 at `half_saturation`, approaching 1 with volume.
pub fn coverage_confidence(headlines: usize, half_saturation: f64) -> f64 {
    if headlines == 0 {
        return 0.0;
    }
    let n = headlines as f64;
    let k = if half_saturation.is_finite() {
        half_saturation.max(0.0)
    } else {
        0.0
    };
    (n / (n + k)).clamp(0.0, 1.0)
}

fn top_entities(set: &RawSentimentSet, limit: usize) -> Vec<EntityMention> {
    let mut entities: Vec<EntityMention> = set
        .entity_mentions
        .iter()
        .filter(|(_, mentions)| **mentions > 0)
        .map(|(entity, mentions)| EntityMention {
            entity: entity.clone(),
            mentions: *mentions,
        })
        .collect();
    entities.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.entity.cmp(&b.entity)));
    entities.truncate(limit);
    entities
}

/// Coverage-weighted sentiment composite.
///
/// The mean reading in [-1, 1] maps to `(mean + 1) * 50`, then gets pulled
/// toward neutral by [`coverage_confidence`]. A thin news day therefore moves
/// the score less than a heavy one, but never flips it across 50.
pub fn sentiment_composite(set: &RawSentimentSet, benchmark: &SentimentBenchmark) -> SentimentBreakdown {
    let readings = set.readings();
    let n = readings.len();
    let coverage = coverage_confidence(n, benchmark.coverage_half_saturation);

    let (mean_sentiment, composite) = if n == 0 {
        (None, NEUTRAL_SCORE)
    } else {
        let m = mean(&readings);
        let base = (m + 1.0) * 50.0;
        (Some(m), NEUTRAL_SCORE + (base - NEUTRAL_SCORE) * coverage)
    };

    let positive_count = readings
        .iter()
        .filter(|r| **r >= benchmark.positive_threshold)
        .count();
    let negative_count = readings
        .iter()
        .filter(|r| **r <= benchmark.negative_threshold)
        .count();

    SentimentBreakdown {
        composite: clamp_score(composite),
        headline_count: n,
        mean_sentiment,
        coverage_confidence: coverage,
        positive_count,
        negative_count,
        neutral_count: n.saturating_sub(positive_count + negative_count),
        volatility: population_std_dev(&readings),
        total_entity_mentions: set
            .entity_mentions
            .values()
            .fold(0u32, |acc, m| acc.saturating_add(*m)),
        top_entities: top_entities(set, benchmark.top_entities),
        available: true,
    }
}

/// Neutral breakdown used when the sentiment provider could not be reached
pub fn unavailable_sentiment() -> SentimentBreakdown {
    SentimentBreakdown {
        available: false,
        ..sentiment_composite(&RawSentimentSet::default(), &SentimentBenchmark::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::HeadlineSentiment;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn headlines(scores: &[f64]) -> RawSentimentSet {
        RawSentimentSet::new(
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| HeadlineSentiment::new(format!("headline {}", i), *s))
                .collect(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_no_headlines_is_neutral() {
        let breakdown = sentiment_composite(&RawSentimentSet::default(), &SentimentBenchmark::default());
        assert_eq!(breakdown.composite, 50.0);
        assert_eq!(breakdown.mean_sentiment, None);
        assert_eq!(breakdown.coverage_confidence, 0.0);
        assert!(!breakdown.has_data());
    }

    #[test]
    fn test_coverage_confidence() {
        assert_eq!(coverage_confidence(0, 3.0), 0.0);
        assert_relative_eq!(coverage_confidence(3, 3.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(coverage_confidence(9, 3.0), 0.75, epsilon = 1e-12);
        assert_eq!(coverage_confidence(4, 0.0), 1.0);
        assert_eq!(coverage_confidence(4, f64::NAN), 1.0);
    }

    #[test]
    fn test_composite_uses_coverage() {
        // mean 0.6 -> base 80, coverage 3/6
        let breakdown = sentiment_composite(&headlines(&[0.6, 0.6, 0.6]), &SentimentBenchmark::default());
        assert_relative_eq!(breakdown.composite, 65.0, epsilon = 1e-9);
        assert_relative_eq!(breakdown.mean_sentiment.unwrap(), 0.6, epsilon = 1e-12);
        assert_eq!(breakdown.positive_count, 3);
        assert_relative_eq!(breakdown.volatility, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_more_headlines_move_further_from_neutral() {
        let benchmark = SentimentBenchmark::default();
        let few = sentiment_composite(&headlines(&[-0.5]), &benchmark).composite;
        let many = sentiment_composite(&headlines(&[-0.5; 12]), &benchmark).composite;
        assert!(few < 50.0);
        assert!(many < few);
        assert!(many > 25.0);
    }

    #[test]
    fn test_counts_and_volatility() {
        let breakdown = sentiment_composite(&headlines(&[0.5, -0.5, 0.01, 0.05]), &SentimentBenchmark::default());
        assert_eq!(breakdown.positive_count, 2);
        assert_eq!(breakdown.negative_count, 1);
        assert_eq!(breakdown.neutral_count, 1);
        assert!(breakdown.volatility > 0.0);
    }

    #[test]
    fn test_entity_tally() {
        let mut entities = BTreeMap::new();
        entities.insert("RBI".to_string(), 4);
        entities.insert("Jio".to_string(), 9);
        entities.insert("Adani".to_string(), 4);
        entities.insert("Nobody".to_string(), 0);
        entities.insert("Overflow".to_string(), u32::MAX);
        let set = RawSentimentSet::new(vec![HeadlineSentiment::new("x", 0.1)], entities);

        let benchmark = SentimentBenchmark {
            top_entities: 3,
            ..SentimentBenchmark::default()
        };
        let breakdown = sentiment_composite(&set, &benchmark);
        assert_eq!(breakdown.total_entity_mentions, u32::MAX);
        let names: Vec<&str> = breakdown.top_entities.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(names, vec!["Overflow", "Jio", "Adani"]);
    }

    #[test]
    fn test_unavailable_sentiment() {
        let breakdown = unavailable_sentiment();
        assert_eq!(breakdown.composite, 50.0);
        assert!(!breakdown.available);
    }

    proptest! {
        #[test]
        fn prop_composite_bounded_and_keeps_side(scores in proptest::collection::vec(-5.0f64..5.0, 0..40)) {
            let breakdown = sentiment_composite(&headlines(&scores), &SentimentBenchmark::default());
            prop_assert!((0.0..=100.0).contains(&breakdown.composite));
            if let Some(m) = breakdown.mean_sentiment {
                let base = (m + 1.0) * 50.0;
                prop_assert!((breakdown.composite - 50.0) * (base - 50.0) >= 0.0);
                prop_assert!((breakdown.composite - 50.0).abs() <= (base - 50.0).abs() + 1e-9);
            }
        }
    }
}
