use analysis_core::{Recommendation, StockScoreRecord};
use data_normalizer::stats::{mean, population_std_dev};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerScore {
    pub ticker: String,
    pub final_score: f64,
}

/// Roll-up of a batch of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total: usize,
    /// Records that carry a final score
    pub scored: usize,
    pub average_score: Option<f64>,
    pub score_std_dev: f64,
    pub buy_count: usize,
    pub hold_count: usize,
    pub sell_count: usize,
    pub insufficient_data_count: usize,
    pub best: Option<TickerScore>,
    pub worst: Option<TickerScore>,
}

pub fn portfolio_summary(records: &[StockScoreRecord]) -> PortfolioSummary {
    let scored: Vec<(&str, f64)> = records
        .iter()
        .filter_map(|r| r.final_score.map(|s| (r.ticker.as_str(), s)))
        .collect();
    let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();

    let count = |rec: Recommendation| records.iter().filter(|r| r.recommendation == rec).count();
    let to_ticker_score = |(ticker, score): &(&str, f64)| TickerScore {
        ticker: ticker.to_string(),
        final_score: *score,
    };

    PortfolioSummary {
        total: records.len(),
        scored: scored.len(),
        average_score: if scores.is_empty() { None } else { Some(mean(&scores)) },
        score_std_dev: population_std_dev(&scores),
        buy_count: count(Recommendation::Buy),
        hold_count: count(Recommendation::Hold),
        sell_count: count(Recommendation::Sell),
        insufficient_data_count: count(Recommendation::InsufficientData),
        best: scored
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(to_ticker_score),
        worst: scored
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(to_ticker_score),
    }
}
