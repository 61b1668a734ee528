//! Storage units: trays (nursery shelves) and panels (cultivation walls).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmops_core::{Entity, ValueObject};

use crate::crop::{Crop, CropPosition};
use crate::error::{InventoryError, InventoryResult};
use crate::ids::{CropId, RfidTag, StorageUnitId};
use crate::utilization::{Percent, UtilizationLevel};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Tray,
    Panel,
}

impl UnitKind {
    pub fn noun(self) -> &'static str {
        match self {
            UnitKind::Tray => "tray",
            UnitKind::Panel => "panel",
        }
    }
}

/// Fixed crop grid of a storage unit, set at provisioning time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitLayout {
    Tray { rows: u16, columns: u16 },
    Panel { channels: u16, channel_length: u16 },
}

impl ValueObject for UnitLayout {}

impl UnitLayout {
    pub fn kind(&self) -> UnitKind {
        match self {
            UnitLayout::Tray { .. } => UnitKind::Tray,
            UnitLayout::Panel { .. } => UnitKind::Panel,
        }
    }

    /// Number of crop positions.
    pub fn capacity(&self) -> u32 {
        match *self {
            UnitLayout::Tray { rows, columns } => u32::from(rows) * u32::from(columns),
            UnitLayout::Panel {
                channels,
                channel_length,
            } => u32::from(channels) * u32::from(channel_length),
        }
    }

    /// Whether `position` addresses a cell of this grid (same kind, 1-based, in bounds).
    pub fn contains(&self, position: CropPosition) -> bool {
        match (*self, position) {
            (UnitLayout::Tray { rows, columns }, CropPosition::Tray { row, column }) => {
                (1..=rows).contains(&row) && (1..=columns).contains(&column)
            }
            (
                UnitLayout::Panel {
                    channels,
                    channel_length,
                },
                CropPosition::Panel { channel, position },
            ) => (1..=channels).contains(&channel) && (1..=channel_length).contains(&position),
            _ => false,
        }
    }

    pub fn ensure_valid(&self) -> InventoryResult<()> {
        if self.capacity() == 0 {
            return Err(InventoryError::validation(
                "layout",
                "must have at least one crop position",
            ));
        }
        Ok(())
    }
}

/// A tray or panel and the crops it holds.
///
/// Crops are kept sorted by position; positions and crop ids are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnit {
    id: StorageUnitId,
    rfid_tag: RfidTag,
    layout: UnitLayout,
    crops: Vec<Crop>,
    provisioned_at: DateTime<Utc>,
    notes: Option<String>,
}

impl StorageUnit {
    /// A new, empty unit.
    pub fn new(
        id: StorageUnitId,
        rfid_tag: RfidTag,
        layout: UnitLayout,
        provisioned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            rfid_tag,
            layout,
            crops: Vec::new(),
            provisioned_at,
            notes,
        }
    }

    pub fn id_typed(&self) -> StorageUnitId {
        self.id
    }

    pub fn rfid_tag(&self) -> &RfidTag {
        &self.rfid_tag
    }

    pub fn layout(&self) -> UnitLayout {
        self.layout
    }

    pub fn kind(&self) -> UnitKind {
        self.layout.kind()
    }

    pub fn provisioned_at(&self) -> DateTime<Utc> {
        self.provisioned_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn crops(&self) -> &[Crop] {
        &self.crops
    }

    pub fn crop(&self, crop_id: &CropId) -> Option<&Crop> {
        self.crops.iter().find(|c| &c.id == crop_id)
    }

    pub fn crop_at(&self, position: CropPosition) -> Option<&Crop> {
        self.crops
            .binary_search_by(|c| c.position.cmp(&position))
            .ok()
            .map(|idx| &self.crops[idx])
    }

    pub fn capacity(&self) -> u32 {
        self.layout.capacity()
    }

    pub fn crop_count(&self) -> u32 {
        u32::try_from(self.crops.len()).unwrap_or(u32::MAX)
    }

    pub fn utilization(&self) -> Percent {
        Percent::from_ratio(u64::from(self.crop_count()), u64::from(self.capacity()))
    }

    pub fn utilization_level(&self) -> UtilizationLevel {
        self.utilization().level()
    }

    /// Place a crop at its position.
    pub fn seed(&mut self, crop: Crop) -> InventoryResult<()> {
        if !self.layout.contains(crop.position) {
            return Err(InventoryError::validation(
                "position",
                format!(
                    "{} is outside the {} layout",
                    crop.position,
                    self.kind().noun()
                ),
            ));
        }
        if self.crop(&crop.id).is_some() {
            return Err(InventoryError::validation(
                "crop_id",
                format!("{} already exists in this {}", crop.id, self.kind().noun()),
            ));
        }
        match self
            .crops
            .binary_search_by(|c| c.position.cmp(&crop.position))
        {
            Ok(_) => Err(InventoryError::validation(
                "position",
                format!("{} is already occupied", crop.position),
            )),
            Err(idx) => {
                self.crops.insert(idx, crop);
                Ok(())
            }
        }
    }

    /// Remove a crop, freeing its position.
    pub fn remove(&mut self, crop_id: &CropId) -> Option<Crop> {
        let idx = self.crops.iter().position(|c| &c.id == crop_id)?;
        Some(self.crops.remove(idx))
    }

    /// Replace a crop's state in place. The position must not change.
    pub(crate) fn replace(&mut self, crop: Crop) -> InventoryResult<()> {
        let slot = self
            .crops
            .iter_mut()
            .find(|c| c.id == crop.id)
            .ok_or_else(|| InventoryError::not_found(format!("crop {}", crop.id)))?;
        if slot.position != crop.position {
            return Err(InventoryError::validation(
                "position",
                "cannot change position in place; transplant instead",
            ));
        }
        *slot = crop;
        Ok(())
    }

    /// Structural check used by snapshot validation.
    pub(crate) fn check_structure(&self) -> Result<(), String> {
        if self.capacity() == 0 {
            return Err(format!("unit {} has zero capacity", self.id));
        }
        let mut positions = HashSet::with_capacity(self.crops.len());
        let mut ids = HashSet::with_capacity(self.crops.len());
        for crop in &self.crops {
            if !self.layout.contains(crop.position) {
                return Err(format!(
                    "crop {} in unit {} references nonexistent position {}",
                    crop.id, self.id, crop.position
                ));
            }
            if !positions.insert(crop.position) {
                return Err(format!(
                    "unit {} has two crops at position {}",
                    self.id, crop.position
                ));
            }
            if !ids.insert(&crop.id) {
                return Err(format!("unit {} has duplicate crop id {}", self.id, crop.id));
            }
        }
        if let Some(pair) = self.crops.windows(2).find(|w| w[0].position > w[1].position) {
            return Err(format!(
                "unit {} lists crop {} before crop {} out of position order",
                self.id, pair[0].id, pair[1].id
            ));
        }
        Ok(())
    }
}

impl Entity for StorageUnit {
    type Id = StorageUnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
