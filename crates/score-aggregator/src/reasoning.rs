use analysis_core::{
    CategoryStatus, DataQuality, FundamentalBreakdown, MetricKind, Recommendation, SentimentBreakdown,
};
use data_normalizer::ScoreGrade;

fn confidence_desc(coverage: f64) -> &'static str {
    if coverage > 0.8 {
        "high"
    } else if coverage > 0.6 {
        "moderate"
    } else if coverage > 0.4 {
        "low"
    } else {
        "very low"
    }
}

fn fundamental_notes(fundamental: &FundamentalBreakdown) -> Vec<String> {
    let mut notes = Vec::new();

    if let Some(pe) = fundamental.metric(MetricKind::PeRatio).filter(|m| m.populated) {
        let raw = pe.raw.unwrap_or_default();
        if pe.score >= 80.0 {
            notes.push(format!("P/E of {:.1} is in the target range", raw));
        } else if pe.score < 40.0 {
            notes.push(format!("P/E of {:.1} is far from the target range", raw));
        }
    }

    if let Some(roe) = fundamental.metric(MetricKind::Roe).filter(|m| m.populated) {
        if roe.score >= 70.0 {
            notes.push("strong return on equity".to_string());
        } else if roe.score < 30.0 {
            notes.push("weak return on equity".to_string());
        }
    }

    if let Some(de) = fundamental.metric(MetricKind::DebtToEquity).filter(|m| m.populated) {
        if de.score >= 70.0 {
            notes.push("low leverage".to_string());
        } else if de.score < 30.0 {
            notes.push("high leverage".to_string());
        }
    }

    notes
}

/// Human-readable explanation of how a record's score came about
pub fn build_reasoning(
    fundamental: &FundamentalBreakdown,
    sentiment: &SentimentBreakdown,
    quality: DataQuality,
    weight: f64,
    final_score: Option<f64>,
    recommendation: Recommendation,
) -> String {
    let mut parts = Vec::new();

    match quality.fundamental {
        CategoryStatus::Unavailable => {
            parts.push("Fundamental data unavailable, neutral score used.".to_string())
        }
        _ if !fundamental.has_data() => {
            parts.push("No fundamental metrics reported, neutral score used.".to_string())
        }
        _ => {
            let grade = ScoreGrade::from_score(fundamental.composite);
            let mut line = format!(
                "Fundamentals {:.1}/100 ({}, {} of {} metrics)",
                fundamental.composite,
                grade.description(),
                fundamental.populated_metrics,
                fundamental.metrics.len()
            );
            let notes = fundamental_notes(fundamental);
            if !notes.is_empty() {
                line.push_str(": ");
                line.push_str(&notes.join("; "));
            }
            line.push('.');
            parts.push(line);
        }
    }

    match quality.sentiment {
        CategoryStatus::Unavailable => {
            parts.push("Sentiment data unavailable, neutral score used.".to_string())
        }
        _ if !sentiment.has_data() => parts.push("No recent headlines, neutral sentiment used.".to_string()),
        _ => parts.push(format!(
            "News sentiment {:.1}/100 from {} headlines ({} positive, {} negative; {} coverage confidence).",
            sentiment.composite,
            sentiment.headline_count,
            sentiment.positive_count,
            sentiment.negative_count,
            confidence_desc(sentiment.coverage_confidence)
        )),
    }

    match final_score {
        Some(score) => parts.push(format!(
            "Final score {:.1} with sentiment weight {:.2}: {}.",
            score, weight, recommendation
        )),
        None => parts.push(format!("Not enough data to score: {}.", recommendation)),
    }

    parts.join(" ")
}
