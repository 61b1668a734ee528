//! Crops: one plant at one position of a tray or panel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use farmops_core::{Entity, ValueObject};

use crate::ids::CropId;

/// Where a crop sits inside its storage unit. Coordinates are 1-based.
///
/// Trays address by row/column, panels by channel and position along the channel;
/// which variant is valid is decided by the owning unit's layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CropPosition {
    Tray { row: u16, column: u16 },
    Panel { channel: u16, position: u16 },
}

impl ValueObject for CropPosition {}

impl core::fmt::Display for CropPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CropPosition::Tray { row, column } => write!(f, "R{row}C{column}"),
            CropPosition::Panel { channel, position } => write!(f, "CH{channel}P{position}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    TreatmentRequired,
    ToBeDisposed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Transplant,
    Harvest,
}

/// The next scheduled move for a crop (to a panel, or out of the farm).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTransition {
    pub kind: TransitionKind,
    pub date: NaiveDate,
}

/// A single plant.
///
/// Crops are mutated in place (age, health, size) and removed, not tombstoned, when
/// harvested or disposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub id: CropId,
    pub position: CropPosition,
    pub seed_type: String,
    pub age_days: u32,
    pub seeded_date: NaiveDate,
    pub planned_transition: Option<PlannedTransition>,
    pub health: HealthStatus,
    pub size: CropSize,
}

impl Crop {
    /// A freshly seeded, healthy, small crop.
    pub fn seedling(
        id: CropId,
        position: CropPosition,
        seed_type: impl Into<String>,
        seeded_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            position,
            seed_type: seed_type.into(),
            age_days: 0,
            seeded_date,
            planned_transition: None,
            health: HealthStatus::Healthy,
            size: CropSize::Small,
        }
    }

    pub fn with_planned_transition(mut self, kind: TransitionKind, date: NaiveDate) -> Self {
        self.planned_transition = Some(PlannedTransition { kind, date });
        self
    }

    /// Days past the planned transition date, 0 if none is planned or it is not yet due.
    pub fn overdue_days(&self, today: NaiveDate) -> u32 {
        match self.planned_transition {
            Some(planned) if today > planned.date => {
                u32::try_from((today - planned.date).num_days()).unwrap_or(u32::MAX)
            }
            _ => 0,
        }
    }
}

impl Entity for Crop {
    type Id = CropId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
