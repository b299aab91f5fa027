//! Drawdown episode detection.

use super::stats::ratio_or_zero;
use crate::snapshot::MS_PER_DAY;
use crate::types::{DrawdownPeriod, Snapshot};
use tracing::debug;

/// Split a time-ordered snapshot sequence into drawdown episodes.
///
/// A value at or below the running peak opens (or extends) an episode; a
/// value above the peak closes it as recovered on that snapshot's date. An
/// episode still open at the end of the sequence is reported unrecovered.
/// Strictly increasing sequences yield no episodes.
pub fn analyze_drawdowns(snapshots: &[Snapshot]) -> Vec<DrawdownPeriod> {
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };

    let mut periods = Vec::new();
    let mut peak = first;
    let mut trough = first;
    let mut in_drawdown = false;

    for snapshot in &snapshots[1..] {
        if snapshot.total_value > peak.total_value {
            if in_drawdown {
                periods.push(episode(peak, trough, Some(snapshot)));
                in_drawdown = false;
            }
            peak = snapshot;
            trough = snapshot;
        } else {
            in_drawdown = true;
            if snapshot.total_value < trough.total_value {
                trough = snapshot;
            }
        }
    }

    if in_drawdown {
        periods.push(episode(peak, trough, None));
    }

    debug!(episodes = periods.len(), "drawdowns analyzed");
    periods
}

/// The deepest episode by percentage decline.
pub fn max_drawdown_period(periods: &[DrawdownPeriod]) -> Option<&DrawdownPeriod> {
    periods
        .iter()
        .max_by(|a, b| a.drawdown_percent.total_cmp(&b.drawdown_percent))
}

fn episode(peak: &Snapshot, trough: &Snapshot, recovered_at: Option<&Snapshot>) -> DrawdownPeriod {
    let drawdown = peak.total_value - trough.total_value;

    DrawdownPeriod {
        start_date: peak.date,
        end_date: trough.date,
        peak_value: peak.total_value,
        trough_value: trough.total_value,
        drawdown,
        drawdown_percent: ratio_or_zero(drawdown, peak.total_value) * 100.0,
        recovery: recovered_at.is_some(),
        recovery_date: recovered_at.map(|s| s.date),
        // Truncating division: partial days do not count.
        duration: trough.timestamp.saturating_sub(peak.timestamp) / MS_PER_DAY,
    }
}
