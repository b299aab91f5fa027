//! Folio Core - Portfolio snapshot history and analytics library.
//!
//! This crate provides the analytics engine behind the folio dashboard:
//!
//! - **Snapshot store**: One dated capture of portfolio value per day, kept in time order
//! - **Performance metrics**: Total/annualized return, volatility, Sharpe, Sortino, Calmar
//! - **Drawdown analysis**: Peak to trough to recovery episodes
//! - **Cross-sectional analytics**: Herfindahl diversification, sector allocation and risk
//! - **Import/export**: JSON, CSV and tab-separated views over the snapshot history
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::{FixedClock, PortfolioTracker, Position};
//!
//! // Create an in-memory tracker with a pinned clock
//! let clock = FixedClock::from_millis(1_700_000_000_000);
//! let mut tracker = PortfolioTracker::in_memory(clock);
//!
//! tracker.add_position(Position::new("1", "AAPL", 150.0, 175.0, 10)).unwrap();
//! let snapshot = tracker.take_snapshot().unwrap();
//! println!("Captured {} at ${:.2}", snapshot.date, snapshot.total_value);
//!
//! let metrics = tracker.performance(folio_core::Timeframe::All);
//! println!("Total return: {:.2}%", metrics.total_return_percent);
//! ```

pub mod clock;
pub mod config;
pub mod export;
pub mod portfolio;
pub mod sectors;
pub mod snapshot;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use types::{
    ApiResponse, DrawdownPeriod, FieldError, PerformanceMetrics, Position, PositionSnapshot,
    Snapshot,
};

// Re-export main functionality
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AnalyticsConfig, FolioConfig, MarketAssumptions};
pub use export::{ExportDocument, ExportFormat};
pub use portfolio::{
    analyze_drawdowns, calculate_performance, diversification, portfolio_risk,
    sector_allocation, sector_performance, sector_risk, DiversificationMetrics,
    PortfolioRiskMetrics, PortfolioTracker, SectorAllocation, SectorPerformance, SectorRisk,
};
pub use sectors::SectorMap;
pub use snapshot::{CaptureTrigger, SnapshotScheduler, SnapshotStore, Timeframe};
pub use storage::{FileStorage, MemoryStorage, Storage};

/// Error types for folio-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("A snapshot already exists for {date}")]
    DuplicateSnapshot { date: chrono::NaiveDate },

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Position already exists: {0}")]
    DuplicatePosition(String),

    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Unknown timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Unknown format: {0}")]
    InvalidFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for folio-core operations.
pub type Result<T> = std::result::Result<T, Error>;
