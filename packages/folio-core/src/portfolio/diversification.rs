//! Concentration and diversification of the current position set.

use super::stats::ratio_or_zero;
use crate::types::Position;
use serde::{Deserialize, Serialize};

/// Herfindahl-based diversification summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiversificationMetrics {
    /// Sum of squared position weights
    pub herfindahl_index: f64,
    /// Equivalent count of equal-weight positions (1 / Herfindahl)
    pub effective_number_of_stocks: f64,
    /// Largest single weight, percent
    pub concentration_risk: f64,
    /// `(1 - H) / (1 - 1/n)`: 1 for equal weights, 0 for a single position
    pub diversification_ratio: f64,
}

/// Weight of each position in total market value.
///
/// Returns an empty list when total value is not positive.
pub fn position_weights(positions: &[Position]) -> Vec<(String, f64)> {
    let total_value: f64 = positions.iter().map(Position::market_value).sum();
    if total_value <= 0.0 {
        return Vec::new();
    }

    positions
        .iter()
        .map(|p| (p.ticker.clone(), p.market_value() / total_value))
        .collect()
}

/// Compute diversification metrics. An empty portfolio yields all zeros.
pub fn diversification(positions: &[Position]) -> DiversificationMetrics {
    let weights: Vec<f64> = position_weights(positions)
        .into_iter()
        .map(|(_, w)| w)
        .collect();
    if weights.is_empty() {
        return DiversificationMetrics::default();
    }

    let herfindahl_index: f64 = weights.iter().map(|w| w * w).sum();
    let max_weight = weights.iter().copied().fold(0.0, f64::max);

    let n = weights.len() as f64;
    let diversification_ratio = if weights.len() > 1 {
        ratio_or_zero(1.0 - herfindahl_index, 1.0 - 1.0 / n)
    } else {
        0.0
    };

    DiversificationMetrics {
        herfindahl_index,
        effective_number_of_stocks: ratio_or_zero(1.0, herfindahl_index),
        concentration_risk: max_weight * 100.0,
        diversification_ratio,
    }
}
