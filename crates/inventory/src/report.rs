//! Utilization aggregator: an annotated, read-only projection of a station.
//!
//! Figure mapping used by the dashboard:
//! - rack gauges show `occupancy_percentage` (slots filled);
//! - the rack subtitle and the station headline show crop density
//!   (`crop_density_percentage` / `utilization_percentage`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use farmops_core::ContainerId;

use crate::crop::Crop;
use crate::error::InventoryResult;
use crate::ids::{RackId, RfidTag, StorageUnitId};
use crate::rack::Rack;
use crate::station::{Station, StationKind};
use crate::storage_unit::{StorageUnit, UnitLayout};
use crate::utilization::{Percent, UtilizationLevel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropReport {
    #[serde(flatten)]
    pub crop: Crop,
    pub overdue_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub id: StorageUnitId,
    pub rfid_tag: RfidTag,
    pub layout: UnitLayout,
    pub capacity: u32,
    pub crop_count: u32,
    pub utilization_percentage: Percent,
    pub utilization_level: UtilizationLevel,
    pub provisioned_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub crops: Vec<CropReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub slot_number: u16,
    pub occupied: bool,
    pub unit: Option<UnitReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RackReport {
    pub id: RackId,
    pub name: String,
    /// e.g. `"Shelf Upper"`.
    pub label: String,
    pub total_slots: u32,
    pub occupied_slots: u32,
    /// Slot occupancy.
    pub occupancy_percentage: Percent,
    /// Mean crop density of the occupied slots' units.
    pub crop_density_percentage: Percent,
    pub slots: Vec<SlotReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    pub container_id: ContainerId,
    pub kind: StationKind,
    /// Crop density across every unit, slotted and off-rack, equally weighted.
    pub utilization_percentage: Percent,
    pub utilization_level: UtilizationLevel,
    pub total_units: u32,
    pub total_crops: u32,
    pub racks: Vec<RackReport>,
    /// Off-shelf trays (nursery) or overflow panels (cultivation).
    pub off_rack: Vec<UnitReport>,
}

impl StationReport {
    /// Validate `station` and annotate every level. `today` drives overdue days.
    ///
    /// A malformed station is rejected as a whole; no partial report is produced.
    pub fn build(station: &Station, today: NaiveDate) -> InventoryResult<Self> {
        station.validate()?;

        let racks: Vec<RackReport> = station
            .racks()
            .iter()
            .map(|rack| rack_report(station.kind(), rack, today))
            .collect();
        let off_rack: Vec<UnitReport> = station
            .off_rack()
            .iter()
            .map(|unit| unit_report(unit, today))
            .collect();

        let utilization = station.utilization();
        let total_units = u32::try_from(station.units().count()).unwrap_or(u32::MAX);
        let total_crops: u32 = station.units().map(StorageUnit::crop_count).sum();

        Ok(Self {
            container_id: station.container_id().clone(),
            kind: station.kind(),
            utilization_percentage: utilization,
            utilization_level: utilization.level(),
            total_units,
            total_crops,
            racks,
            off_rack,
        })
    }

    pub fn rack(&self, rack_id: &RackId) -> Option<&RackReport> {
        self.racks.iter().find(|r| &r.id == rack_id)
    }
}

fn rack_report(kind: StationKind, rack: &Rack, today: NaiveDate) -> RackReport {
    RackReport {
        id: rack.id().clone(),
        name: rack.name().to_string(),
        label: format!("{} {}", kind.rack_noun(), rack.name()),
        total_slots: rack.total_slots(),
        occupied_slots: rack.occupied_slots(),
        occupancy_percentage: rack.occupancy(),
        crop_density_percentage: rack.crop_density(),
        slots: rack
            .slots()
            .iter()
            .map(|slot| SlotReport {
                slot_number: slot.number(),
                occupied: slot.occupied(),
                unit: slot.unit().map(|u| unit_report(u, today)),
            })
            .collect(),
    }
}

fn unit_report(unit: &StorageUnit, today: NaiveDate) -> UnitReport {
    let utilization = unit.utilization();
    UnitReport {
        id: unit.id_typed(),
        rfid_tag: unit.rfid_tag().clone(),
        layout: unit.layout(),
        capacity: unit.capacity(),
        crop_count: unit.crop_count(),
        utilization_percentage: utilization,
        utilization_level: utilization.level(),
        provisioned_at: unit.provisioned_at(),
        notes: unit.notes().map(str::to_string),
        crops: unit
            .crops()
            .iter()
            .map(|crop| CropReport {
                overdue_days: crop.overdue_days(today),
                crop: crop.clone(),
            })
            .collect(),
    }
}
