//! Caller-owned portfolio state: positions, snapshot history and persistence.

use super::{
    analyze_drawdowns, calculate_performance, diversification, portfolio_risk,
    sector_allocation, sector_performance, sector_risk, DiversificationMetrics,
    PortfolioRiskMetrics, SectorAllocation, SectorPerformance, SectorRisk,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{AnalyticsConfig, FolioConfig};
use crate::export::{self, ExportFormat};
use crate::sectors::SectorMap;
use crate::snapshot::{SnapshotScheduler, SnapshotStore, Timeframe};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::types::{DrawdownPeriod, FieldError, PerformanceMetrics, Position, Snapshot};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

const POSITIONS_KEY: &str = "positions";
const SNAPSHOTS_KEY: &str = "snapshots";

/// Portfolio tracker that owns positions and snapshot history.
///
/// All analytics are recomputed from the current state on each call; the
/// calculators are pure, so nothing is cached between calls.
#[derive(Debug)]
pub struct PortfolioTracker<C: Clock = SystemClock> {
    storage: Box<dyn Storage>,
    clock: C,
    config: AnalyticsConfig,
    sectors: SectorMap,
    positions: Vec<Position>,
    snapshots: SnapshotStore,
    scheduler: SnapshotScheduler,
}

impl PortfolioTracker<SystemClock> {
    /// Open the tracker stored in the default data directory.
    ///
    /// Default path: `~/.folio`
    /// Can be overridden with the `FOLIO_DATA_DIR` environment variable.
    pub fn new() -> Result<Self> {
        Self::from_config(FolioConfig::load()?)
    }

    /// Open the tracker described by a configuration.
    pub fn from_config(config: FolioConfig) -> Result<Self> {
        let storage = FileStorage::new(&config.data_dir);
        Self::open(Box::new(storage), SystemClock, config.analytics)
    }
}

impl<C: Clock> PortfolioTracker<C> {
    /// Open a tracker over an arbitrary storage backend, loading saved state.
    pub fn open(storage: Box<dyn Storage>, clock: C, config: AnalyticsConfig) -> Result<Self> {
        let positions: Vec<Position> = load_json(storage.as_ref(), POSITIONS_KEY)?;
        let snapshots: SnapshotStore = load_json(storage.as_ref(), SNAPSHOTS_KEY)?;
        debug!(
            positions = positions.len(),
            snapshots = snapshots.len(),
            "portfolio loaded"
        );

        Ok(Self {
            storage,
            scheduler: SnapshotScheduler::new(config.capture_debounce_ms),
            clock,
            config,
            sectors: SectorMap::builtin(),
            positions,
            snapshots,
        })
    }

    /// Create an in-memory tracker (nothing survives the process).
    pub fn in_memory(clock: C) -> Self {
        let config = AnalyticsConfig::default();
        Self {
            storage: Box::new(MemoryStorage::new()),
            scheduler: SnapshotScheduler::new(config.capture_debounce_ms),
            clock,
            config,
            sectors: SectorMap::builtin(),
            positions: Vec::new(),
            snapshots: SnapshotStore::new(),
        }
    }

    /// Replace the sector lookup.
    pub fn with_sectors(mut self, sectors: SectorMap) -> Self {
        self.sectors = sectors;
        self
    }

    /// Replace the analytics configuration.
    pub fn with_config(mut self, config: AnalyticsConfig) -> Self {
        self.scheduler = SnapshotScheduler::new(config.capture_debounce_ms);
        self.config = config;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sectors(&self) -> &SectorMap {
        &self.sectors
    }

    pub fn scheduler(&self) -> &SnapshotScheduler {
        &self.scheduler
    }

    /// Persist snapshots, then positions.
    ///
    /// Both payloads are serialized before anything is written. If the
    /// positions write fails, storage holds the current snapshot history next
    /// to the previously saved positions; calling `save` again completes it.
    pub fn save(&mut self) -> Result<()> {
        let snapshots = serde_json::to_vec_pretty(&self.snapshots)?;
        let positions = serde_json::to_vec_pretty(&self.positions)?;
        self.storage.save(SNAPSHOTS_KEY, &snapshots)?;
        self.storage.save(POSITIONS_KEY, &positions)?;
        info!(
            positions = self.positions.len(),
            snapshots = self.snapshots.len(),
            "portfolio saved"
        );
        Ok(())
    }

    /// Discard in-memory state and reload from storage.
    pub fn reload(&mut self) -> Result<()> {
        self.positions = load_json(self.storage.as_ref(), POSITIONS_KEY)?;
        self.snapshots = load_json(self.storage.as_ref(), SNAPSHOTS_KEY)?;
        Ok(())
    }

    // --- Positions ---

    /// Get all positions.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Find a position by id.
    pub fn find_position(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Find a position by ticker (case insensitive).
    pub fn find_by_ticker(&self, ticker: &str) -> Option<&Position> {
        let ticker_upper = ticker.trim().to_uppercase();
        self.positions.iter().find(|p| p.ticker == ticker_upper)
    }

    fn position_index(&self, id: &str) -> Result<usize> {
        self.positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::PositionNotFound(id.to_string()))
    }

    /// Add a new position after validating it.
    ///
    /// A ticker is held at most once: a second position for the same ticker
    /// is rejected like a duplicate id. Use [`update_quantity`](Self::update_quantity)
    /// to change a holding.
    pub fn add_position(&mut self, position: Position) -> Result<Position> {
        let errors = position.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        if self.find_position(&position.id).is_some() {
            return Err(Error::DuplicatePosition(position.id));
        }
        if self.find_by_ticker(&position.ticker).is_some() {
            return Err(Error::DuplicatePosition(position.ticker));
        }

        self.positions.push(position.clone());
        self.positions_changed();
        Ok(position)
    }

    /// Remove a position by id.
    pub fn remove_position(&mut self, id: &str) -> Result<Position> {
        let idx = self.position_index(id)?;
        let removed = self.positions.remove(idx);
        self.positions_changed();
        Ok(removed)
    }

    /// Set a position's current price.
    pub fn update_price(&mut self, id: &str, price: f64) -> Result<Position> {
        if !(price.is_finite() && price > 0.0) {
            return Err(Error::Validation(vec![FieldError::new(
                "currentPrice",
                "must be greater than 0",
            )]));
        }

        let idx = self.position_index(id)?;
        self.positions[idx].current_price = price;
        self.positions_changed();
        Ok(self.positions[idx].clone())
    }

    /// Set a position's quantity.
    ///
    /// A quantity of zero removes the position and returns it.
    pub fn update_quantity(&mut self, id: &str, quantity: u64) -> Result<Position> {
        if quantity == 0 {
            return self.remove_position(id);
        }

        let idx = self.position_index(id)?;
        self.positions[idx].quantity = quantity;
        self.positions_changed();
        Ok(self.positions[idx].clone())
    }

    /// Apply a batch of quotes keyed by ticker.
    ///
    /// Non-positive or non-finite prices are ignored. Returns how many positions changed.
    pub fn apply_prices(&mut self, prices: &HashMap<String, f64>) -> usize {
        let mut updated = 0;
        for position in &mut self.positions {
            if let Some(&price) = prices.get(&position.ticker) {
                if price.is_finite() && price > 0.0 && price != position.current_price {
                    position.current_price = price;
                    updated += 1;
                }
            }
        }

        if updated > 0 {
            self.positions_changed();
        }
        updated
    }

    /// Add a batch of positions, all or none.
    ///
    /// Every record is validated, and ids and tickers must be unique within
    /// the batch and against existing positions; any failure rejects the
    /// whole batch.
    pub fn import_positions(&mut self, positions: Vec<Position>) -> Result<usize> {
        let mut errors = Vec::new();
        let mut seen: HashSet<&str> = self.positions.iter().map(|p| p.id.as_str()).collect();
        let mut tickers: HashSet<&str> =
            self.positions.iter().map(|p| p.ticker.as_str()).collect();

        for (idx, position) in positions.iter().enumerate() {
            errors.extend(
                position
                    .validate()
                    .into_iter()
                    .map(|e| e.at("positions", idx)),
            );
            if !seen.insert(position.id.as_str()) {
                errors.push(
                    FieldError::new("id", format!("duplicate id {}", position.id))
                        .at("positions", idx),
                );
            }
            if !position.ticker.is_empty() && !tickers.insert(position.ticker.as_str()) {
                errors.push(
                    FieldError::new("ticker", format!("{} is already held", position.ticker))
                        .at("positions", idx),
                );
            }
        }

        if !errors.is_empty() {
            warn!(errors = errors.len(), "position import rejected");
            return Err(Error::Validation(errors));
        }

        let count = positions.len();
        self.positions.extend(positions);
        if count > 0 {
            self.positions_changed();
        }
        info!(count, "positions imported");
        Ok(count)
    }

    fn positions_changed(&mut self) {
        self.scheduler.positions_changed(self.clock.now());
    }

    // --- Snapshots ---

    /// The full snapshot history.
    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Snapshots inside a named window ending now.
    pub fn snapshots(&self, timeframe: Timeframe) -> &[Snapshot] {
        self.snapshots
            .query_timeframe(timeframe, self.clock.now_millis())
    }

    /// Capture the current positions as today's snapshot.
    ///
    /// Fails with [`Error::DuplicateSnapshot`] if today already has one.
    pub fn take_snapshot(&mut self) -> Result<Snapshot> {
        let snapshot = Snapshot::capture(Uuid::new_v4().to_string(), self.clock.now(), &self.positions);
        self.snapshots.add_snapshot(snapshot.clone())?;
        Ok(snapshot)
    }

    /// Delete a snapshot by id.
    pub fn delete_snapshot(&mut self, id: &str) -> Result<Snapshot> {
        self.snapshots.delete_snapshot(id)
    }

    /// Merge an imported history, all or none.
    ///
    /// Rejected if any imported date or id already exists in the history.
    pub fn import_snapshots(&mut self, imported: SnapshotStore) -> Result<usize> {
        let errors: Vec<FieldError> = imported
            .snapshots()
            .iter()
            .enumerate()
            .flat_map(|(idx, snapshot)| {
                let mut errors = Vec::new();
                if self.snapshots.has_snapshot_for(snapshot.date) {
                    errors.push(
                        FieldError::new("date", format!("{} already has a snapshot", snapshot.date))
                            .at("snapshots", idx),
                    );
                }
                if self.snapshots.get(&snapshot.id).is_some() {
                    errors.push(
                        FieldError::new("id", format!("duplicate id {}", snapshot.id))
                            .at("snapshots", idx),
                    );
                }
                errors
            })
            .collect();

        if !errors.is_empty() {
            warn!(errors = errors.len(), "snapshot import rejected");
            return Err(Error::Validation(errors));
        }

        let mut merged: Vec<Snapshot> = self.snapshots.snapshots().to_vec();
        let count = imported.len();
        merged.extend(Vec::from(imported));
        self.snapshots = SnapshotStore::from_snapshots(merged)?;
        info!(count, "snapshots imported");
        Ok(count)
    }

    /// Capture a snapshot if the scheduler says one is due.
    ///
    /// Call periodically. Returns the new snapshot when one was taken; a day
    /// that already has a snapshot is skipped.
    pub fn auto_capture(&mut self) -> Result<Option<Snapshot>> {
        let Some(trigger) = self.scheduler.poll(self.clock.now()) else {
            return Ok(None);
        };

        if self.positions.is_empty() {
            debug!(?trigger, "no positions, skipping capture");
            return Ok(None);
        }

        match self.take_snapshot() {
            Ok(snapshot) => {
                info!(?trigger, date = %snapshot.date, "snapshot captured");
                Ok(Some(snapshot))
            }
            Err(Error::DuplicateSnapshot { date }) => {
                warn!(?trigger, %date, "snapshot already taken today, skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // --- Analytics ---

    /// Performance metrics over a window.
    pub fn performance(&self, timeframe: Timeframe) -> PerformanceMetrics {
        calculate_performance(self.snapshots(timeframe), &self.config)
    }

    /// Drawdown episodes over a window.
    pub fn drawdowns(&self, timeframe: Timeframe) -> Vec<DrawdownPeriod> {
        analyze_drawdowns(self.snapshots(timeframe))
    }

    pub fn diversification(&self) -> DiversificationMetrics {
        diversification(&self.positions)
    }

    pub fn sector_allocation(&self) -> Vec<SectorAllocation> {
        sector_allocation(&self.positions, &self.sectors)
    }

    pub fn sector_performance(&self) -> Vec<SectorPerformance> {
        sector_performance(&self.positions, &self.sectors)
    }

    pub fn sector_risk(&self) -> Vec<SectorRisk> {
        sector_risk(&self.positions, &self.sectors)
    }

    pub fn risk(&self) -> PortfolioRiskMetrics {
        portfolio_risk(&self.positions, &self.config)
    }

    /// Render the history inside a window in an export format.
    pub fn export(&self, format: ExportFormat, timeframe: Timeframe) -> Result<String> {
        export::export_snapshots(
            self.snapshots(timeframe),
            format,
            self.clock.now(),
            &self.config,
        )
    }
}

fn load_json<T: DeserializeOwned + Default>(storage: &dyn Storage, key: &str) -> Result<T> {
    match storage.load(key)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    fn aapl() -> Position {
        Position::new("1", "AAPL", 150.0, 175.0, 10)
    }

    #[test]
    fn test_add_position() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        let position = tracker.add_position(aapl()).unwrap();

        assert_eq!(position.ticker, "AAPL");
        assert_eq!(tracker.positions().len(), 1);
        assert!(tracker.scheduler().is_pending());
    }

    #[test]
    fn test_add_position_validation() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        let result = tracker.add_position(Position::new("1", "AAPL", 0.0, 175.0, 10));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(tracker.positions().is_empty());
    }

    #[test]
    fn test_add_position_duplicate_id() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();
        let result = tracker.add_position(Position::new("1", "MSFT", 10.0, 10.0, 1));
        assert!(matches!(result, Err(Error::DuplicatePosition(_))));
    }

    #[test]
    fn test_add_position_duplicate_ticker() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();

        let result = tracker.add_position(Position::new("2", "aapl", 160.0, 175.0, 5));
        assert!(matches!(result, Err(Error::DuplicatePosition(ref t)) if t == "AAPL"));
        assert_eq!(tracker.positions().len(), 1);
        assert_eq!(tracker.diversification().effective_number_of_stocks, 1.0);
    }

    #[test]
    fn test_remove_position() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();
        tracker
            .add_position(Position::new("2", "GOOGL", 100.0, 100.0, 5))
            .unwrap();

        let removed = tracker.remove_position("1").unwrap();
        assert_eq!(removed.ticker, "AAPL");
        assert_eq!(tracker.positions().len(), 1);
        assert_eq!(tracker.positions()[0].ticker, "GOOGL");
    }

    #[test]
    fn test_remove_position_not_found() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        let result = tracker.remove_position("nope");
        assert!(matches!(result, Err(Error::PositionNotFound(_))));
    }

    #[test]
    fn test_update_price_and_quantity() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();

        let pos = tracker.update_price("1", 200.0).unwrap();
        assert_eq!(pos.market_value(), 2000.0);
        assert!(matches!(
            tracker.update_price("1", -5.0),
            Err(Error::Validation(_))
        ));

        let pos = tracker.update_quantity("1", 4).unwrap();
        assert_eq!(pos.quantity, 4);

        // Zero quantity removes
        tracker.update_quantity("1", 0).unwrap();
        assert!(tracker.positions().is_empty());
    }

    #[test]
    fn test_find_by_ticker() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();

        assert!(tracker.find_by_ticker("aapl").is_some());
        assert!(tracker.find_by_ticker("GOOGL").is_none());
    }

    #[test]
    fn test_apply_prices() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();
        tracker
            .add_position(Position::new("2", "MSFT", 300.0, 310.0, 2))
            .unwrap();

        let prices = HashMap::from([
            ("AAPL".to_string(), 180.0),
            ("MSFT".to_string(), -1.0),
            ("TSLA".to_string(), 200.0),
        ]);
        assert_eq!(tracker.apply_prices(&prices), 1);
        assert_eq!(tracker.find_position("1").unwrap().current_price, 180.0);
        assert_eq!(tracker.find_position("2").unwrap().current_price, 310.0);
    }

    #[test]
    fn test_import_positions_all_or_none() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();

        let batch = vec![
            Position::new("2", "MSFT", 300.0, 310.0, 2),
            Position::new("3", "", 10.0, 10.0, 1),
            Position::new("1", "TSLA", 10.0, 10.0, 1),
        ];
        match tracker.import_positions(batch) {
            Err(Error::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["positions[1].ticker", "positions[2].id"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(tracker.positions().len(), 1);

        let imported = tracker
            .import_positions(vec![Position::new("2", "MSFT", 300.0, 310.0, 2)])
            .unwrap();
        assert_eq!(imported, 1);
        assert_eq!(tracker.positions().len(), 2);
    }

    #[test]
    fn test_import_positions_rejects_held_tickers() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();

        let batch = vec![
            Position::new("2", "MSFT", 300.0, 310.0, 2),
            Position::new("3", "AAPL", 140.0, 175.0, 1),
            Position::new("4", "MSFT", 280.0, 310.0, 1),
        ];
        match tracker.import_positions(batch) {
            Err(Error::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["positions[1].ticker", "positions[2].ticker"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(tracker.positions().len(), 1);
    }

    #[test]
    fn test_custom_sectors() {
        let mut tracker = PortfolioTracker::in_memory(clock())
            .with_sectors(SectorMap::empty().with("aapl", "Hardware"));
        tracker.add_position(aapl()).unwrap();
        tracker
            .add_position(Position::new("2", "MSFT", 300.0, 310.0, 2))
            .unwrap();

        // AAPL 1750 vs MSFT 620, which is unmapped in an empty map
        let allocation = tracker.sector_allocation();
        assert_eq!(allocation.len(), 2);
        assert_eq!(allocation[0].sector, "Hardware");
        assert_eq!(allocation[1].sector, "Unknown");
    }

    #[test]
    fn test_take_snapshot_once_per_day() {
        let clock = clock();
        let mut tracker = PortfolioTracker::in_memory(&clock);
        tracker.add_position(aapl()).unwrap();

        let snapshot = tracker.take_snapshot().unwrap();
        assert_eq!(snapshot.total_value, 1750.0);

        clock.advance(Duration::hours(2));
        assert!(matches!(
            tracker.take_snapshot(),
            Err(Error::DuplicateSnapshot { .. })
        ));
        assert_eq!(tracker.snapshot_store().len(), 1);

        clock.advance(Duration::days(1));
        tracker.take_snapshot().unwrap();
        assert_eq!(tracker.snapshot_store().len(), 2);
    }

    #[test]
    fn test_auto_capture_debounce() {
        let clock = clock();
        let mut tracker = PortfolioTracker::in_memory(&clock);
        tracker.add_position(aapl()).unwrap();

        assert!(tracker.auto_capture().unwrap().is_none());

        clock.advance(Duration::seconds(5));
        let snapshot = tracker.auto_capture().unwrap();
        assert!(snapshot.is_some());

        // Another edit the same day is debounced, then skipped as a duplicate
        tracker.update_price("1", 180.0).unwrap();
        clock.advance(Duration::seconds(6));
        assert!(tracker.auto_capture().unwrap().is_none());
        assert_eq!(tracker.snapshot_store().len(), 1);
    }

    #[test]
    fn test_auto_capture_daily_check() {
        let clock = clock();
        let mut tracker = PortfolioTracker::in_memory(&clock);
        tracker.add_position(aapl()).unwrap();
        tracker.scheduler.cancel();

        // First poll arms the daily check
        assert!(tracker.auto_capture().unwrap().is_none());

        clock.set(Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 30).unwrap());
        let snapshot = tracker.auto_capture().unwrap().unwrap();
        assert_eq!(snapshot.date.to_string(), "2024-03-01");
    }

    #[test]
    fn test_import_snapshots_rejects_existing_dates() {
        let clock = clock();
        let mut tracker = PortfolioTracker::in_memory(&clock);
        tracker.add_position(aapl()).unwrap();
        let existing = tracker.take_snapshot().unwrap();

        let mut clash = existing.clone();
        clash.id = "other".to_string();
        let result = tracker.import_snapshots(SnapshotStore::from_snapshots(vec![clash]).unwrap());
        assert!(matches!(result, Err(Error::Validation(_))));

        let mut next_day = existing.clone();
        next_day.id = "next".to_string();
        next_day.date = next_day.date.succ_opt().unwrap();
        next_day.timestamp += 86_400_000;
        let count = tracker
            .import_snapshots(SnapshotStore::from_snapshots(vec![next_day]).unwrap())
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(tracker.snapshot_store().len(), 2);
    }

    #[test]
    fn test_analytics_follow_history() {
        let clock = clock();
        let mut tracker = PortfolioTracker::in_memory(&clock);
        tracker.add_position(aapl()).unwrap();
        tracker.take_snapshot().unwrap();

        assert_eq!(tracker.performance(Timeframe::All), PerformanceMetrics::default());

        clock.advance(Duration::days(1));
        tracker.update_price("1", 192.5).unwrap();
        tracker.take_snapshot().unwrap();

        let metrics = tracker.performance(Timeframe::All);
        assert!((metrics.total_return - 175.0).abs() < 1e-9);
        assert!((metrics.total_return_percent - 10.0).abs() < 1e-9);
        assert!(tracker.drawdowns(Timeframe::All).is_empty());
        assert_eq!(tracker.diversification().concentration_risk, 100.0);
        assert_eq!(tracker.sector_allocation()[0].sector, "Technology");
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();

        // Create and save
        {
            let storage = Box::new(FileStorage::new(dir.path()));
            let mut tracker =
                PortfolioTracker::open(storage, clock(), AnalyticsConfig::default()).unwrap();
            tracker.add_position(aapl()).unwrap();
            tracker.take_snapshot().unwrap();
            tracker.save().unwrap();
        }

        // Reload and verify
        {
            let storage = Box::new(FileStorage::new(dir.path()));
            let tracker =
                PortfolioTracker::open(storage, clock(), AnalyticsConfig::default()).unwrap();
            assert_eq!(tracker.positions().len(), 1);
            assert_eq!(tracker.positions()[0].ticker, "AAPL");
            assert_eq!(tracker.snapshot_store().len(), 1);
        }
    }

    /// Memory storage that refuses writes to one key.
    #[derive(Debug, Default)]
    struct RefusingStorage {
        inner: MemoryStorage,
        refused: &'static str,
    }

    impl Storage for RefusingStorage {
        fn save(&mut self, key: &str, value: &[u8]) -> Result<()> {
            if key == self.refused {
                return Err(Error::Storage(format!("{} is read-only", key)));
            }
            self.inner.save(key, value)
        }

        fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.load(key)
        }
    }

    #[test]
    fn test_save_writes_snapshots_before_positions() {
        let storage = RefusingStorage {
            refused: POSITIONS_KEY,
            ..Default::default()
        };
        let mut tracker =
            PortfolioTracker::open(Box::new(storage), clock(), AnalyticsConfig::default()).unwrap();
        tracker.add_position(aapl()).unwrap();
        tracker.take_snapshot().unwrap();

        assert!(matches!(tracker.save(), Err(Error::Storage(_))));

        // The history landed, the positions did not
        tracker.reload().unwrap();
        assert_eq!(tracker.snapshot_store().len(), 1);
        assert!(tracker.positions().is_empty());
    }

    #[test]
    fn test_save_stops_when_snapshots_fail() {
        let storage = RefusingStorage {
            refused: SNAPSHOTS_KEY,
            ..Default::default()
        };
        let mut tracker =
            PortfolioTracker::open(Box::new(storage), clock(), AnalyticsConfig::default()).unwrap();
        tracker.add_position(aapl()).unwrap();
        tracker.take_snapshot().unwrap();

        assert!(matches!(tracker.save(), Err(Error::Storage(_))));

        tracker.reload().unwrap();
        assert!(tracker.snapshot_store().is_empty());
        assert!(tracker.positions().is_empty());
    }

    #[test]
    fn test_reload_discards_unsaved() {
        let mut tracker = PortfolioTracker::in_memory(clock());
        tracker.add_position(aapl()).unwrap();
        tracker.save().unwrap();

        tracker
            .add_position(Position::new("2", "MSFT", 1.0, 1.0, 1))
            .unwrap();
        tracker.reload().unwrap();
        assert_eq!(tracker.positions().len(), 1);
    }
}
