//! Snapshot capture scheduling.
//!
//! A deadline state machine polled by the owner: position edits arm a short
//! debounce, and a daily check fires shortly before midnight (UTC).

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a capture is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTrigger {
    /// The position set changed and the debounce window elapsed
    PositionsChanged,
    /// The end-of-day check came around
    DailyCheck,
}

/// Debounce + daily cadence timer.
#[derive(Debug, Clone)]
pub struct SnapshotScheduler {
    debounce: Duration,
    pending: Option<DateTime<Utc>>,
    next_daily: Option<DateTime<Utc>>,
}

impl SnapshotScheduler {
    pub fn new(debounce_ms: i64) -> Self {
        Self {
            debounce: Duration::milliseconds(debounce_ms.max(0)),
            pending: None,
            next_daily: None,
        }
    }

    /// Arm (or re-arm) the debounce timer.
    pub fn positions_changed(&mut self, now: DateTime<Utc>) {
        let deadline = now + self.debounce;
        debug!(%deadline, "snapshot capture debounced");
        self.pending = Some(deadline);
    }

    /// Disarm a pending debounce.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Next daily check, once the scheduler has been polled.
    pub fn next_daily_check(&self) -> Option<DateTime<Utc>> {
        self.next_daily
    }

    /// Report a due capture, if any.
    ///
    /// A fired trigger is consumed: the debounce disarms, and the daily check
    /// moves on to the following day.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<CaptureTrigger> {
        if let Some(deadline) = self.pending {
            if now >= deadline {
                self.pending = None;
                return Some(CaptureTrigger::PositionsChanged);
            }
        }

        match self.next_daily {
            None => {
                self.next_daily = Some(next_daily_check(now));
                None
            }
            Some(check) if now >= check => {
                self.next_daily = Some(next_daily_check(now));
                Some(CaptureTrigger::DailyCheck)
            }
            Some(_) => None,
        }
    }
}

impl Default for SnapshotScheduler {
    fn default() -> Self {
        Self::new(5_000)
    }
}

/// The first 23:59:00 UTC strictly after `now`.
pub fn next_daily_check(now: DateTime<Utc>) -> DateTime<Utc> {
    let check_time = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(check_time).and_utc();
    if now < today {
        today
    } else {
        today + Duration::days(1)
    }
}
