//! Core data types for the folio analytics engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A holding of a single ticker.
///
/// Market value and gain figures are derived on demand and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Caller-assigned unique identifier
    pub id: String,
    /// Stock ticker symbol (uppercase)
    pub ticker: String,
    /// Purchase price per share
    #[serde(alias = "buyPrice")]
    pub cost_basis: f64,
    /// Latest known price per share
    pub current_price: f64,
    /// Number of shares held
    pub quantity: u64,
}

impl Position {
    /// Create a new position. The ticker is normalized to uppercase.
    pub fn new(id: &str, ticker: &str, cost_basis: f64, current_price: f64, quantity: u64) -> Self {
        Self {
            id: id.to_string(),
            ticker: ticker.trim().to_uppercase(),
            cost_basis,
            current_price,
            quantity,
        }
    }

    /// Current market value (price × quantity).
    pub fn market_value(&self) -> f64 {
        self.current_price * self.quantity as f64
    }

    /// Total amount paid for the position.
    pub fn total_cost(&self) -> f64 {
        self.cost_basis * self.quantity as f64
    }

    /// Unrealized gain/loss in dollars.
    pub fn gain(&self) -> f64 {
        (self.current_price - self.cost_basis) * self.quantity as f64
    }

    /// Unrealized gain/loss as a percentage of cost basis.
    pub fn gain_percent(&self) -> f64 {
        if self.cost_basis == 0.0 {
            return 0.0;
        }
        (self.current_price - self.cost_basis) / self.cost_basis * 100.0
    }

    /// Check the position's field constraints.
    ///
    /// Returns an empty list when the position is valid.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push(FieldError::new("id", "must not be empty"));
        }
        if self.ticker.trim().is_empty() {
            errors.push(FieldError::new("ticker", "must not be empty"));
        }
        if !(self.cost_basis.is_finite() && self.cost_basis > 0.0) {
            errors.push(FieldError::new("costBasis", "must be greater than 0"));
        }
        if !(self.current_price.is_finite() && self.current_price > 0.0) {
            errors.push(FieldError::new("currentPrice", "must be greater than 0"));
        }
        if self.quantity == 0 {
            errors.push(FieldError::new("quantity", "must be a positive integer"));
        }

        errors
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the offending field, e.g. `positions[2].ticker`
    pub field: String,
    /// Human-readable description of the problem
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Prefix the field path with a record location.
    pub fn at(self, record: &str, index: usize) -> Self {
        Self {
            field: format!("{}[{}].{}", record, index, self.field),
            message: self.message,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Immutable copy of a position taken at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub stock_id: String,
    pub ticker: String,
    pub quantity: u64,
    /// Price at capture
    pub price: f64,
    pub value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,
    /// Cost basis at capture
    pub buy_price: f64,
}

impl From<&Position> for PositionSnapshot {
    fn from(position: &Position) -> Self {
        Self {
            stock_id: position.id.clone(),
            ticker: position.ticker.clone(),
            quantity: position.quantity,
            price: position.current_price,
            value: position.market_value(),
            gain_loss: position.gain(),
            gain_loss_percent: position.gain_percent(),
            buy_price: position.cost_basis,
        }
    }
}

/// A dated capture of total portfolio value and its positions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    /// Calendar day of the capture (at most one snapshot per day)
    pub date: NaiveDate,
    /// Capture time in epoch milliseconds, used for ordering and range queries
    pub timestamp: i64,
    pub total_value: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percent: f64,
    #[serde(default)]
    pub stock_snapshots: Vec<PositionSnapshot>,
}

impl Snapshot {
    /// Capture the given positions at `now`.
    pub fn capture(id: impl Into<String>, now: DateTime<Utc>, positions: &[Position]) -> Self {
        let stock_snapshots: Vec<PositionSnapshot> =
            positions.iter().map(PositionSnapshot::from).collect();

        let total_value: f64 = positions.iter().map(Position::market_value).sum();
        let total_cost: f64 = positions.iter().map(Position::total_cost).sum();
        let total_gain_loss: f64 = positions.iter().map(Position::gain).sum();
        let total_gain_loss_percent = if total_cost > 0.0 {
            total_gain_loss / total_cost * 100.0
        } else {
            0.0
        };

        Self {
            id: id.into(),
            date: now.date_naive(),
            timestamp: now.timestamp_millis(),
            total_value,
            total_gain_loss,
            total_gain_loss_percent,
            stock_snapshots,
        }
    }

    /// Number of positions held at capture time.
    pub fn position_count(&self) -> usize {
        self.stock_snapshots.len()
    }
}

/// Aggregate performance and risk statistics over a snapshot sequence.
///
/// Recomputed from the snapshot history on demand, never persisted on its own.
/// Every field is zero when fewer than two snapshots are available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Last value minus first value, in dollars
    pub total_return: f64,
    pub total_return_percent: f64,
    /// Compound annual growth rate, percent
    pub annualized_return: f64,
    /// Annualized standard deviation of daily returns, percent
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-value decline, in dollars
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    /// Share of positive daily returns, percent
    pub win_rate: f64,
    /// Mean positive daily return, percent
    pub average_gain: f64,
    /// Absolute mean negative daily return, percent
    pub average_loss: f64,
    pub profit_factor: f64,
    pub sortino: f64,
    pub calmar_ratio: f64,
}

/// A single peak → trough → (optional) recovery episode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownPeriod {
    /// Date of the peak the decline started from
    pub start_date: NaiveDate,
    /// Date of the trough
    pub end_date: NaiveDate,
    pub peak_value: f64,
    pub trough_value: f64,
    /// Peak minus trough, in dollars
    pub drawdown: f64,
    pub drawdown_percent: f64,
    /// Whether value climbed back above the peak
    pub recovery: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_date: Option<NaiveDate>,
    /// Whole days from peak to trough
    pub duration: i64,
}

/// API response wrapper used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
