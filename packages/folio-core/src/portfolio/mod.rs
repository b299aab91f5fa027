//! Portfolio analytics module.
//!
//! Time-series metrics (performance, drawdowns) over the snapshot history,
//! cross-sectional metrics (diversification, sectors, dispersion risk) over
//! the current positions, and the tracker that owns both.

mod diversification;
mod drawdown;
mod performance;
mod risk;
mod sector;
mod stats;
mod tracker;

pub use diversification::{diversification, position_weights, DiversificationMetrics};
pub use drawdown::{analyze_drawdowns, max_drawdown_period};
pub use performance::{calculate_performance, daily_returns, max_drawdown, volatility};
pub use risk::{portfolio_risk, PortfolioRiskMetrics};
pub use sector::{
    sector_allocation, sector_performance, sector_risk, SectorAllocation, SectorPerformance,
    SectorRisk,
};
pub use tracker::PortfolioTracker;
