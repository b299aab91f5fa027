//! Named history windows.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Milliseconds in one day.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Timeframe selector for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
        Timeframe::ThreeMonths,
        Timeframe::SixMonths,
        Timeframe::OneYear,
        Timeframe::All,
    ];

    /// Window length in milliseconds, or `None` for the unbounded window.
    pub fn offset_millis(&self) -> Option<i64> {
        let days = match self {
            Timeframe::OneDay => 1,
            Timeframe::OneWeek => 7,
            Timeframe::OneMonth => 30,
            Timeframe::ThreeMonths => 90,
            Timeframe::SixMonths => 180,
            Timeframe::OneYear => 365,
            Timeframe::All => return None,
        };
        Some(days * MS_PER_DAY)
    }

    /// Inclusive `[start, end]` range ending at `now_ms`.
    pub fn range(&self, now_ms: i64) -> Option<(i64, i64)> {
        self.offset_millis()
            .map(|offset| (now_ms.saturating_sub(offset), now_ms))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1m",
            Timeframe::ThreeMonths => "3m",
            Timeframe::SixMonths => "6m",
            Timeframe::OneYear => "1y",
            Timeframe::All => "all",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == wanted)
            .ok_or_else(|| Error::InvalidTimeframe(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(Timeframe::OneDay.offset_millis(), Some(86_400_000));
        assert_eq!(Timeframe::OneWeek.offset_millis(), Some(7 * MS_PER_DAY));
        assert_eq!(Timeframe::OneYear.offset_millis(), Some(365 * MS_PER_DAY));
        assert_eq!(Timeframe::All.offset_millis(), None);
    }

    #[test]
    fn test_range() {
        let now = 10 * MS_PER_DAY;
        assert_eq!(Timeframe::OneWeek.range(now), Some((3 * MS_PER_DAY, now)));
        assert_eq!(Timeframe::All.range(now), None);
    }

    #[test]
    fn test_parse() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert_eq!("1Y".parse::<Timeframe>().unwrap(), Timeframe::OneYear);
        assert!(matches!(
            "2w".parse::<Timeframe>(),
            Err(Error::InvalidTimeframe(_))
        ));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Timeframe::ThreeMonths).unwrap(),
            "\"3m\""
        );
        let tf: Timeframe = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(tf, Timeframe::All);
    }
}
