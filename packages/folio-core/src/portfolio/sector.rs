//! Sector aggregation over the current position set.

use super::stats::{population_std_dev, ratio_or_zero};
use crate::sectors::SectorMap;
use crate::types::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of portfolio value held in one sector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectorAllocation {
    pub sector: String,
    pub value: f64,
    pub allocation_percent: f64,
    pub position_count: usize,
}

/// Aggregate unrealized performance of one sector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectorPerformance {
    pub sector: String,
    pub value: f64,
    pub cost: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,
}

/// Dispersion of position returns within one sector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectorRisk {
    pub sector: String,
    /// Population std-dev of per-position gain percentages
    pub volatility: f64,
    pub position_count: usize,
}

struct SectorGroup<'a> {
    sector: String,
    positions: Vec<&'a Position>,
    value: f64,
}

/// Group positions by sector, largest value first (ties by name).
fn group_by_sector<'a>(positions: &'a [Position], sectors: &SectorMap) -> Vec<SectorGroup<'a>> {
    let mut grouped: BTreeMap<&str, Vec<&'a Position>> = BTreeMap::new();
    for position in positions {
        grouped
            .entry(sectors.sector_for(&position.ticker))
            .or_default()
            .push(position);
    }

    let mut groups: Vec<SectorGroup<'a>> = grouped
        .into_iter()
        .map(|(sector, positions)| SectorGroup {
            sector: sector.to_string(),
            value: positions.iter().map(|p| p.market_value()).sum(),
            positions,
        })
        .collect();

    groups.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.sector.cmp(&b.sector))
    });
    groups
}

/// Allocation of total market value across sectors.
pub fn sector_allocation(positions: &[Position], sectors: &SectorMap) -> Vec<SectorAllocation> {
    let total_value: f64 = positions.iter().map(Position::market_value).sum();

    group_by_sector(positions, sectors)
        .into_iter()
        .map(|group| SectorAllocation {
            allocation_percent: ratio_or_zero(group.value, total_value) * 100.0,
            position_count: group.positions.len(),
            value: group.value,
            sector: group.sector,
        })
        .collect()
}

/// Unrealized gain/loss per sector, percent of sector cost.
pub fn sector_performance(positions: &[Position], sectors: &SectorMap) -> Vec<SectorPerformance> {
    group_by_sector(positions, sectors)
        .into_iter()
        .map(|group| {
            let cost: f64 = group.positions.iter().map(|p| p.total_cost()).sum();
            let gain_loss: f64 = group.positions.iter().map(|p| p.gain()).sum();
            SectorPerformance {
                value: group.value,
                cost,
                gain_loss,
                gain_loss_percent: ratio_or_zero(gain_loss, cost) * 100.0,
                sector: group.sector,
            }
        })
        .collect()
}

/// Cross-sectional volatility of position returns per sector.
pub fn sector_risk(positions: &[Position], sectors: &SectorMap) -> Vec<SectorRisk> {
    group_by_sector(positions, sectors)
        .into_iter()
        .map(|group| {
            let returns: Vec<f64> = group.positions.iter().map(|p| p.gain_percent()).collect();
            SectorRisk {
                volatility: population_std_dev(&returns),
                position_count: group.positions.len(),
                sector: group.sector,
            }
        })
        .collect()
}
