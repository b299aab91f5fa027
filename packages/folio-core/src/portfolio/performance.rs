//! Portfolio performance analytics over the snapshot history.

use super::stats::{finite_or_zero, mean, population_std_dev, ratio_or_zero};
use crate::config::AnalyticsConfig;
use crate::snapshot::MS_PER_DAY;
use crate::types::{PerformanceMetrics, Snapshot};
use tracing::debug;

/// Compute aggregate performance and risk metrics.
///
/// `snapshots` must be ascending by timestamp (as kept by
/// [`SnapshotStore`](crate::SnapshotStore)). With fewer than two snapshots
/// every metric is 0. No field is ever NaN or infinite.
pub fn calculate_performance(snapshots: &[Snapshot], config: &AnalyticsConfig) -> PerformanceMetrics {
    let (first, last) = match (snapshots.first(), snapshots.last()) {
        (Some(first), Some(last)) if snapshots.len() >= 2 => (first, last),
        _ => return PerformanceMetrics::default(),
    };

    let returns = daily_returns(snapshots);
    let values: Vec<f64> = snapshots.iter().map(|s| s.total_value).collect();

    let total_return = last.total_value - first.total_value;
    let total_return_percent = if first.total_value != 0.0 {
        finite_or_zero(total_return / first.total_value * 100.0)
    } else {
        0.0
    };

    let elapsed_ms = last.timestamp.saturating_sub(first.timestamp);
    let years = elapsed_ms as f64 / (MS_PER_DAY as f64 * config.days_per_year);
    let annualized_return = annualized_return(
        first.total_value,
        last.total_value,
        years,
        total_return_percent,
    );

    let annualization = config.trading_days_per_year.sqrt();
    let volatility = volatility(&returns, config.trading_days_per_year);

    let excess_return = annualized_return / 100.0 - config.risk_free_rate;
    let sharpe_ratio = ratio_or_zero(excess_return, volatility / 100.0);

    // Downside deviation is measured against the mean daily return rather than
    // a zero (minimum acceptable return) threshold. This departs from the
    // textbook Sortino definition and is kept for parity with existing figures.
    let sortino = ratio_or_zero(excess_return, downside_deviation(&returns) * annualization);

    let (max_drawdown, max_drawdown_percent) = max_drawdown(&values);

    let gains: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();

    let win_rate = ratio_or_zero(gains.len() as f64, returns.len() as f64) * 100.0;
    let average_gain = mean(&gains) * 100.0;
    let average_loss = mean(&losses).abs() * 100.0;
    let profit_factor = ratio_or_zero(average_gain, average_loss);
    let calmar_ratio = ratio_or_zero(annualized_return, max_drawdown_percent);

    debug!(
        snapshots = snapshots.len(),
        returns = returns.len(),
        "performance metrics recomputed"
    );

    PerformanceMetrics {
        total_return: finite_or_zero(total_return),
        total_return_percent,
        annualized_return,
        volatility: finite_or_zero(volatility),
        sharpe_ratio,
        max_drawdown,
        max_drawdown_percent,
        win_rate,
        average_gain: finite_or_zero(average_gain),
        average_loss: finite_or_zero(average_loss),
        profit_factor,
        sortino,
        calmar_ratio,
    }
}

/// Period-over-period returns of total value.
///
/// Intervals that start from a zero value are skipped entirely rather than
/// counted as a zero return.
pub fn daily_returns(snapshots: &[Snapshot]) -> Vec<f64> {
    snapshots
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].total_value;
            if prev == 0.0 {
                return None;
            }
            Some((pair[1].total_value - prev) / prev)
        })
        .filter(|r| r.is_finite())
        .collect()
}

/// Compound annual growth rate in percent.
///
/// Falls back to the simple total return when no time has elapsed.
fn annualized_return(first: f64, last: f64, years: f64, total_return_percent: f64) -> f64 {
    if years <= 0.0 {
        return total_return_percent;
    }
    if first <= 0.0 {
        return 0.0;
    }
    finite_or_zero(((last / first).powf(1.0 / years) - 1.0) * 100.0)
}

/// Root mean squared deviation from the mean, over returns below the mean.
fn downside_deviation(returns: &[f64]) -> f64 {
    let avg = mean(returns);
    let below: Vec<f64> = returns.iter().copied().filter(|r| *r < avg).collect();
    if below.is_empty() {
        return 0.0;
    }
    let variance = below.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / below.len() as f64;
    variance.sqrt()
}

/// Annualized volatility (percent) of a daily return series.
pub fn volatility(returns: &[f64], trading_days_per_year: f64) -> f64 {
    population_std_dev(returns) * trading_days_per_year.sqrt() * 100.0
}

/// Largest decline from a running peak.
///
/// Returns `(drawdown, drawdown_percent)` where the percent is relative to the
/// peak the decline was measured from.
pub fn max_drawdown(values: &[f64]) -> (f64, f64) {
    let Some(&first) = values.first() else {
        return (0.0, 0.0);
    };

    let mut peak = first;
    let mut max_drawdown = 0.0;
    let mut max_drawdown_percent = 0.0;

    for &value in values {
        if value > peak {
            peak = value;
        }
        let drawdown = peak - value;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
            max_drawdown_percent = ratio_or_zero(drawdown, peak) * 100.0;
        }
    }

    (max_drawdown, max_drawdown_percent)
}
