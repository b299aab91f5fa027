//! Portfolio-wide risk view over the current positions.
//!
//! These figures measure dispersion across holdings at a single instant.
//! They are distinct from the time-series volatility in
//! [`calculate_performance`](super::calculate_performance).

use super::stats::population_std_dev;
use crate::config::AnalyticsConfig;
use crate::types::Position;
use serde::{Deserialize, Serialize};

/// Cross-sectional risk metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRiskMetrics {
    /// Population std-dev of per-position gain percentages
    pub volatility: f64,
    /// Parametric one-tailed value at risk, in the same percent units as volatility
    pub value_at_risk: f64,
    /// Market beta (configured assumption, not a regression estimate)
    pub beta: f64,
    /// Jensen's alpha (configured assumption)
    pub alpha: f64,
}

/// Compute the cross-sectional risk view.
///
/// `value_at_risk = volatility × z` with `z = config.var_z_score` (1.65 ≈ 95%
/// one-tailed). Beta and alpha are taken from `config.market`.
pub fn portfolio_risk(positions: &[Position], config: &AnalyticsConfig) -> PortfolioRiskMetrics {
    let returns: Vec<f64> = positions.iter().map(Position::gain_percent).collect();
    let volatility = population_std_dev(&returns);

    PortfolioRiskMetrics {
        volatility,
        value_at_risk: volatility * config.var_z_score,
        beta: config.market.beta,
        alpha: config.market.alpha,
    }
}
