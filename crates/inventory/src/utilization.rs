//! Utilization percentages and levels.
//!
//! Two distinct metrics exist and are never mixed:
//! - **occupancy**: fraction of slots holding a storage unit;
//! - **crop density**: fraction of a unit's positions holding a crop, averaged with
//!   equal weight per unit when rolled up to racks and stations.

use serde::{Deserialize, Serialize};

use farmops_core::ValueObject;

/// Whole-number percentage, always within `0..=100`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(u8);

impl ValueObject for Percent {}

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const FULL: Percent = Percent(100);

    /// `part / whole`, rounded half up. A zero `whole` yields 0, never NaN.
    pub fn from_ratio(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        let part = part.min(whole);
        let pct = (part * 100 + whole / 2) / whole;
        Self(pct.min(100) as u8)
    }

    /// Equal-weight mean of percentages, rounded half up. An empty input averages to 0.
    pub fn mean(values: impl IntoIterator<Item = Percent>) -> Self {
        let (sum, n) = values
            .into_iter()
            .fold((0_u64, 0_u64), |(sum, n), p| (sum + u64::from(p.0), n + 1));
        if n == 0 {
            return Self::ZERO;
        }
        Self(((sum + n / 2) / n).min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn level(self) -> UtilizationLevel {
        UtilizationLevel::from_percent(self)
    }
}

impl core::fmt::Display for Percent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Banded utilization, derived from a [`Percent`] with fixed thresholds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationLevel {
    Low,
    Medium,
    High,
}

impl UtilizationLevel {
    /// Lowest percentage classified as medium.
    pub const MEDIUM_FROM: u8 = 40;
    /// Lowest percentage classified as high.
    pub const HIGH_FROM: u8 = 70;

    pub fn from_percent(pct: Percent) -> Self {
        match pct.value() {
            v if v >= Self::HIGH_FROM => UtilizationLevel::High,
            v if v >= Self::MEDIUM_FROM => UtilizationLevel::Medium,
            _ => UtilizationLevel::Low,
        }
    }
}
