//! Date-deduplicated, time-ordered snapshot history.

use super::timeframe::Timeframe;
use crate::types::{FieldError, Snapshot};
use crate::{Error, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Ordered sequence of portfolio snapshots.
///
/// Invariants: at most one snapshot per calendar date, and the sequence is
/// always sorted ascending by `timestamp`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Snapshot>", into = "Vec<Snapshot>")]
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl SnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an existing sequence.
    ///
    /// Either every snapshot is accepted or none is. Duplicate dates, duplicate
    /// ids, non-finite values and timestamps outside their `date` are all
    /// reported together as field errors.
    pub fn from_snapshots(mut snapshots: Vec<Snapshot>) -> Result<Self> {
        let mut errors = Vec::new();
        let mut dates = HashSet::new();
        let mut ids = HashSet::new();

        for (idx, snapshot) in snapshots.iter().enumerate() {
            if snapshot.id.trim().is_empty() {
                errors.push(FieldError::new("id", "must not be empty").at("snapshots", idx));
            } else if !ids.insert(snapshot.id.as_str()) {
                errors.push(
                    FieldError::new("id", format!("duplicate id {}", snapshot.id))
                        .at("snapshots", idx),
                );
            }
            if !dates.insert(snapshot.date) {
                errors.push(
                    FieldError::new("date", format!("duplicate date {}", snapshot.date))
                        .at("snapshots", idx),
                );
            }
            errors.extend(
                check_snapshot(snapshot)
                    .into_iter()
                    .map(|e| e.at("snapshots", idx)),
            );
        }

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        snapshots.sort_by_key(|s| s.timestamp);
        Ok(Self { snapshots })
    }

    /// Insert a snapshot, rejecting a second snapshot for the same date.
    ///
    /// The candidate must also pass the field checks of [`from_snapshots`](Self::from_snapshots).
    /// On rejection the store is left untouched.
    pub fn add_snapshot(&mut self, candidate: Snapshot) -> Result<()> {
        let errors = check_snapshot(&candidate);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        if self.has_snapshot_for(candidate.date) {
            return Err(Error::DuplicateSnapshot {
                date: candidate.date,
            });
        }

        info!(date = %candidate.date, value = candidate.total_value, "snapshot added");

        self.snapshots.push(candidate);
        self.snapshots.sort_by_key(|s| s.timestamp);
        Ok(())
    }

    /// Remove a snapshot by id.
    pub fn delete_snapshot(&mut self, id: &str) -> Result<Snapshot> {
        let idx = self
            .snapshots
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| Error::SnapshotNotFound(id.to_string()))?;

        let removed = self.snapshots.remove(idx);
        info!(date = %removed.date, "snapshot deleted");
        Ok(removed)
    }

    /// Snapshots with `timestamp` in `[start_ms, end_ms]`, inclusive.
    pub fn query(&self, start_ms: i64, end_ms: i64) -> &[Snapshot] {
        // Sorted by timestamp, so the window is a contiguous slice.
        let start = self.snapshots.partition_point(|s| s.timestamp < start_ms);
        let end = self.snapshots.partition_point(|s| s.timestamp <= end_ms);
        let window: &[Snapshot] = if start < end {
            &self.snapshots[start..end]
        } else {
            &[]
        };
        debug!(start_ms, end_ms, count = window.len(), "snapshot query");
        window
    }

    /// Snapshots inside a named window ending at `now_ms`.
    ///
    /// [`Timeframe::All`] returns the full sequence unfiltered.
    pub fn query_timeframe(&self, timeframe: Timeframe, now_ms: i64) -> &[Snapshot] {
        match timeframe.range(now_ms) {
            Some((start, end)) => self.query(start, end),
            None => &self.snapshots,
        }
    }

    /// All snapshots, ascending by timestamp.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn get(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn get_by_date(&self, date: NaiveDate) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.date == date)
    }

    pub fn has_snapshot_for(&self, date: NaiveDate) -> bool {
        self.get_by_date(date).is_some()
    }

    /// Total values in time order.
    pub fn values(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.total_value).collect()
    }
}

/// Field checks for a single snapshot.
///
/// The timestamp must be representable and fall on the snapshot's UTC date,
/// which keeps timestamp differences between stored snapshots in range.
fn check_snapshot(snapshot: &Snapshot) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match Utc.timestamp_millis_opt(snapshot.timestamp).single() {
        Some(at) if at.date_naive() == snapshot.date => {}
        Some(at) => errors.push(FieldError::new(
            "timestamp",
            format!("falls on {} but date is {}", at.date_naive(), snapshot.date),
        )),
        None => errors.push(FieldError::new("timestamp", "is out of range")),
    }

    for (field, value) in [
        ("totalValue", snapshot.total_value),
        ("totalGainLoss", snapshot.total_gain_loss),
        ("totalGainLossPercent", snapshot.total_gain_loss_percent),
    ] {
        if !value.is_finite() {
            errors.push(FieldError::new(field, "must be a finite number"));
        }
    }

    errors
}

impl TryFrom<Vec<Snapshot>> for SnapshotStore {
    type Error = Error;

    fn try_from(snapshots: Vec<Snapshot>) -> Result<Self> {
        Self::from_snapshots(snapshots)
    }
}

impl From<SnapshotStore> for Vec<Snapshot> {
    fn from(store: SnapshotStore) -> Self {
        store.snapshots
    }
}
