//! Snapshot export and validated import.
//!
//! Exports are read-only views over the history: a full-fidelity JSON
//! document, or a flat table as CSV / tab-separated text. Imports either
//! accept every record or reject the payload with a field-level error list.

use crate::config::AnalyticsConfig;
use crate::portfolio::{analyze_drawdowns, calculate_performance};
use crate::snapshot::SnapshotStore;
use crate::types::{DrawdownPeriod, FieldError, PerformanceMetrics, Position, Snapshot};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

/// Column headers of the tabular exports, in order.
pub const TABLE_HEADERS: [&str; 5] = ["Date", "Total Value", "Total P&L", "P&L %", "Positions"];

/// Output format for snapshot exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    /// Tab-separated values, opens directly in spreadsheet apps
    Excel,
}

impl ExportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "tsv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "tsv" | "xls" => Ok(ExportFormat::Excel),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

/// Full-fidelity JSON export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub snapshots: Vec<Snapshot>,
    pub metrics: PerformanceMetrics,
    pub drawdowns: Vec<DrawdownPeriod>,
}

impl ExportDocument {
    /// Build a document, computing metrics and drawdowns over `snapshots`.
    pub fn new(snapshots: &[Snapshot], exported_at: DateTime<Utc>, config: &AnalyticsConfig) -> Self {
        Self {
            exported_at,
            snapshots: snapshots.to_vec(),
            metrics: calculate_performance(snapshots, config),
            drawdowns: analyze_drawdowns(snapshots),
        }
    }
}

/// Render snapshots in the requested format.
pub fn export_snapshots(
    snapshots: &[Snapshot],
    format: ExportFormat,
    exported_at: DateTime<Utc>,
    config: &AnalyticsConfig,
) -> Result<String> {
    debug!(%format, count = snapshots.len(), "exporting snapshots");
    match format {
        ExportFormat::Json => {
            let document = ExportDocument::new(snapshots, exported_at, config);
            Ok(serde_json::to_string_pretty(&document)?)
        }
        ExportFormat::Csv => export_table(snapshots, b','),
        ExportFormat::Excel => export_table(snapshots, b'\t'),
    }
}

/// Flat table: `Date, Total Value, Total P&L, P&L %, Positions`.
pub fn export_table(snapshots: &[Snapshot], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(TABLE_HEADERS)?;
    for snapshot in snapshots {
        writer.write_record([
            snapshot.date.format("%Y-%m-%d").to_string(),
            format!("{:.2}", snapshot.total_value),
            format!("{:.2}", snapshot.total_gain_loss),
            format!("{:.2}", snapshot.total_gain_loss_percent),
            snapshot.position_count().to_string(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidFormat(e.to_string()))
}

/// Parse a JSON snapshot history.
///
/// Accepts an [`ExportDocument`] or a bare array of snapshots. The result is
/// ordered by timestamp and free of duplicate dates.
pub fn import_snapshots_json(input: &str) -> Result<SnapshotStore> {
    let records = match serde_json::from_str::<Value>(input)? {
        Value::Array(records) => records,
        Value::Object(mut document) => match document.remove("snapshots") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(Error::Validation(vec![FieldError::new(
                    "snapshots",
                    "expected an array of snapshots",
                )]))
            }
        },
        _ => {
            return Err(Error::InvalidFormat(
                "expected a snapshot array or export document".to_string(),
            ))
        }
    };

    let mut snapshots = Vec::with_capacity(records.len());
    let mut errors = Vec::new();
    for (idx, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Snapshot>(record) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => errors.push(FieldError::new("record", e.to_string()).at("snapshots", idx)),
        }
    }

    if !errors.is_empty() {
        warn!(errors = errors.len(), "snapshot import rejected");
        return Err(Error::Validation(errors));
    }

    SnapshotStore::from_snapshots(snapshots)
}

/// Imported quantities must stay below 2^53, where every integer is exact in f64.
const QUANTITY_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Loosely typed position record, validated field by field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default, alias = "buyPrice", alias = "cost_basis")]
    cost_basis: Option<f64>,
    #[serde(default, alias = "current_price")]
    current_price: Option<f64>,
    #[serde(default)]
    quantity: Option<f64>,
}

impl RawPosition {
    /// Validate into a [`Position`], assigning an id when none is given.
    fn into_position(self) -> std::result::Result<Position, Vec<FieldError>> {
        let mut errors = Vec::new();

        let ticker = self.ticker.unwrap_or_default();
        if ticker.trim().is_empty() {
            errors.push(FieldError::new("ticker", "is required"));
        }

        let cost_basis = self.cost_basis.unwrap_or(f64::NAN);
        if !(cost_basis.is_finite() && cost_basis > 0.0) {
            errors.push(FieldError::new("costBasis", "must be a number greater than 0"));
        }

        let current_price = self.current_price.unwrap_or(f64::NAN);
        if !(current_price.is_finite() && current_price > 0.0) {
            errors.push(FieldError::new("currentPrice", "must be a number greater than 0"));
        }

        let quantity = self.quantity.unwrap_or(0.0);
        if !(quantity.is_finite() && quantity >= 1.0 && quantity.fract() == 0.0) {
            errors.push(FieldError::new("quantity", "must be a positive integer"));
        } else if quantity >= QUANTITY_LIMIT {
            errors.push(FieldError::new(
                "quantity",
                format!("must be below {}", QUANTITY_LIMIT),
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Position::new(&id, &ticker, cost_basis, current_price, quantity as u64))
    }
}

/// Validate a batch of raw records; all or none.
fn validate_positions(
    records: Vec<std::result::Result<RawPosition, String>>,
) -> Result<Vec<Position>> {
    let mut positions = Vec::with_capacity(records.len());
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for (idx, record) in records.into_iter().enumerate() {
        let raw = match record {
            Ok(raw) => raw,
            Err(message) => {
                errors.push(FieldError::new("record", message).at("positions", idx));
                continue;
            }
        };

        match raw.into_position() {
            Ok(position) => {
                if !ids.insert(position.id.clone()) {
                    errors.push(
                        FieldError::new("id", format!("duplicate id {}", position.id))
                            .at("positions", idx),
                    );
                }
                positions.push(position);
            }
            Err(field_errors) => {
                errors.extend(field_errors.into_iter().map(|e| e.at("positions", idx)));
            }
        }
    }

    if !errors.is_empty() {
        warn!(errors = errors.len(), "position import rejected");
        return Err(Error::Validation(errors));
    }
    Ok(positions)
}

/// Parse positions from JSON (an array, or an object with a `positions` array).
pub fn import_positions_json(input: &str) -> Result<Vec<Position>> {
    let records = match serde_json::from_str::<Value>(input)? {
        Value::Array(records) => records,
        Value::Object(mut document) => match document.remove("positions") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(Error::Validation(vec![FieldError::new(
                    "positions",
                    "expected an array of positions",
                )]))
            }
        },
        _ => {
            return Err(Error::InvalidFormat(
                "expected a position array".to_string(),
            ))
        }
    };

    validate_positions(
        records
            .into_iter()
            .map(|record| serde_json::from_value::<RawPosition>(record).map_err(|e| e.to_string()))
            .collect(),
    )
}

/// Parse positions from CSV with a header row.
///
/// Recognized columns: `id`, `ticker`, `costBasis` (or `buyPrice`),
/// `currentPrice`, `quantity`. An empty `id` is assigned automatically.
pub fn import_positions_csv(input: &str) -> Result<Vec<Position>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());

    let records = reader
        .deserialize::<RawPosition>()
        .map(|record| record.map_err(|e| e.to_string()))
        .collect();

    validate_positions(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MS_PER_DAY;
    use chrono::{NaiveDate, TimeZone};

    fn snapshots() -> Vec<Snapshot> {
        let positions = vec![
            Position::new("1", "AAPL", 150.0, 175.0, 10),
            Position::new("2", "MSFT", 300.0, 290.5, 3),
        ];
        (0..3)
            .map(|day| {
                let now = Utc.with_ymd_and_hms(2024, 2, 1, 16, 0, 0).unwrap()
                    + chrono::Duration::milliseconds(day * MS_PER_DAY);
                Snapshot::capture(format!("s{}", day), now, &positions)
            })
            .collect()
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("tsv".parse::<ExportFormat>().unwrap(), ExportFormat::Excel);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(Error::InvalidFormat(_))
        ));
        assert_eq!(ExportFormat::Excel.file_extension(), "tsv");
    }

    #[test]
    fn test_csv_export() {
        let output = export_table(&snapshots(), b',').unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "Date,Total Value,Total P&L,P&L %,Positions");
        assert_eq!(lines[1], "2024-02-01,2621.50,221.50,9.23,2");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_excel_export_is_tab_separated() {
        let output = export_snapshots(
            &snapshots(),
            ExportFormat::Excel,
            Utc::now(),
            &AnalyticsConfig::default(),
        )
        .unwrap();
        let header = output.lines().next().unwrap();
        assert_eq!(header, "Date\tTotal Value\tTotal P&L\tP&L %\tPositions");
    }

    #[test]
    fn test_json_roundtrip() {
        let original = snapshots();
        let exported_at = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let json = export_snapshots(
            &original,
            ExportFormat::Json,
            exported_at,
            &AnalyticsConfig::default(),
        )
        .unwrap();

        let store = import_snapshots_json(&json).unwrap();
        assert_eq!(store.snapshots(), original.as_slice());

        let document: ExportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(document.exported_at, exported_at);
        assert_eq!(document.drawdowns.len(), 1);
    }

    #[test]
    fn test_import_bare_array() {
        let original = snapshots();
        let json = serde_json::to_string(&original).unwrap();
        let store = import_snapshots_json(&json).unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_import_snapshots_field_errors() {
        let json = r#"[
            {"id":"a","date":"2024-01-01","timestamp":1,"totalValue":1,"totalGainLoss":0,"totalGainLossPercent":0},
            {"id":"b","date":"not-a-date","timestamp":2,"totalValue":1,"totalGainLoss":0,"totalGainLossPercent":0}
        ]"#;
        match import_snapshots_json(json) {
            Err(Error::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "snapshots[1].record");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        assert!(matches!(
            import_snapshots_json("42"),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(import_snapshots_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_import_snapshots_sorts() {
        let mut reversed = snapshots();
        reversed.reverse();
        let store = import_snapshots_json(&serde_json::to_string(&reversed).unwrap()).unwrap();
        assert_eq!(
            store.snapshots()[0].date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_import_positions_json() {
        let json = r#"{"positions":[
            {"id":"1","ticker":"aapl","buyPrice":150,"currentPrice":175,"quantity":10},
            {"ticker":"MSFT","costBasis":300,"currentPrice":310,"quantity":2}
        ]}"#;
        let positions = import_positions_json(json).unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].ticker, "AAPL");
        assert_eq!(positions[0].cost_basis, 150.0);
        assert!(!positions[1].id.is_empty());
    }

    #[test]
    fn test_import_positions_json_rejects_whole_batch() {
        let json = r#"[
            {"id":"1","ticker":"AAPL","costBasis":150,"currentPrice":175,"quantity":10},
            {"id":"2","ticker":"","costBasis":-1,"currentPrice":175,"quantity":2.5},
            {"id":"3","ticker":"TSLA","costBasis":"lots","currentPrice":1,"quantity":1}
        ]"#;

        match import_positions_json(json) {
            Err(Error::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec![
                        "positions[1].ticker",
                        "positions[1].costBasis",
                        "positions[1].quantity",
                        "positions[2].record",
                    ]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_import_positions_rejects_oversized_quantity() {
        let json = r#"[
            {"id":"1","ticker":"AAPL","costBasis":150,"currentPrice":175,"quantity":1e25},
            {"id":"2","ticker":"MSFT","costBasis":300,"currentPrice":310,"quantity":9007199254740993}
        ]"#;
        match import_positions_json(json) {
            Err(Error::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["positions[0].quantity", "positions[1].quantity"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let csv = "ticker,costBasis,currentPrice,quantity\nAAPL,150,175,9007199254740991\n";
        let positions = import_positions_csv(csv).unwrap();
        assert_eq!(positions[0].quantity, 9_007_199_254_740_991);
    }

    #[test]
    fn test_import_positions_csv() {
        let csv = "id,ticker,costBasis,currentPrice,quantity\n\
                   1, aapl ,150,175,10\n\
                   ,MSFT,300,310,2\n";
        let positions = import_positions_csv(csv).unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].id, "1");
        assert_eq!(positions[0].ticker, "AAPL");
        assert_eq!(positions[1].quantity, 2);
        assert!(!positions[1].id.is_empty());
    }

    #[test]
    fn test_import_positions_csv_errors() {
        let csv = "id,ticker,costBasis,currentPrice,quantity\n\
                   1,AAPL,150,175,10\n\
                   1,MSFT,300,0,2\n";
        match import_positions_csv(csv) {
            Err(Error::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["positions[1].currentPrice"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let dup = "id,ticker,costBasis,currentPrice,quantity\n1,AAPL,1,1,1\n1,MSFT,1,1,1\n";
        match import_positions_csv(dup) {
            Err(Error::Validation(errors)) => assert_eq!(errors[0].field, "positions[1].id"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
