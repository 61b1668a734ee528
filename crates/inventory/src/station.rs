//! Stations: a container's nursery or cultivation area.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use farmops_core::{ContainerId, Entity};

use crate::crop::Crop;
use crate::error::{InventoryError, InventoryResult};
use crate::ids::{CropId, RackId, RfidTag, StorageUnitId};
use crate::rack::{Rack, Slot, SlotAddress};
use crate::storage_unit::{StorageUnit, UnitKind};
use crate::utilization::Percent;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationKind {
    /// Nursery station: shelves of trays.
    Nursery,
    /// Cultivation area: walls of panels.
    Cultivation,
}

impl StationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StationKind::Nursery => "nursery",
            StationKind::Cultivation => "cultivation",
        }
    }

    /// The only unit kind this station accepts.
    pub fn unit_kind(self) -> UnitKind {
        match self {
            StationKind::Nursery => UnitKind::Tray,
            StationKind::Cultivation => UnitKind::Panel,
        }
    }

    /// Display noun for a rack ("Shelf Upper", "Wall 2").
    pub fn rack_noun(self) -> &'static str {
        match self {
            StationKind::Nursery => "Shelf",
            StationKind::Cultivation => "Wall",
        }
    }

    /// Event stream type for stations of this kind (one stream per container).
    pub fn stream_type(self) -> &'static str {
        match self {
            StationKind::Nursery => "inventory.nursery",
            StationKind::Cultivation => "inventory.cultivation",
        }
    }

    /// Display name of the unslotted-units area.
    pub fn off_rack_label(self) -> &'static str {
        match self {
            StationKind::Nursery => "off-shelf",
            StationKind::Cultivation => "overflow",
        }
    }
}

impl core::fmt::Display for StationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for StationKind {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nursery" => Ok(StationKind::Nursery),
            "cultivation" => Ok(StationKind::Cultivation),
            other => Err(InventoryError::validation(
                "station_kind",
                format!("must be one of: nursery, cultivation (got '{other}')"),
            )),
        }
    }
}

/// Identity of a station: one nursery and one cultivation area per container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationKey {
    pub container_id: ContainerId,
    pub kind: StationKind,
}

impl StationKey {
    pub fn new(container_id: ContainerId, kind: StationKind) -> Self {
        Self { container_id, kind }
    }
}

impl core::fmt::Display for StationKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.container_id, self.kind)
    }
}

/// Where a unit currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitLocation {
    Slot(SlotAddress),
    OffRack,
}

/// Racks of slots plus the off-shelf/overflow units the station still owns.
///
/// Invariants (checked by [`Station::validate`]):
/// - at least one rack, rack ids unique, each rack numbered `1..=N`;
/// - every unit matches the station's unit kind and has a well-formed crop grid;
/// - unit ids and RFID tags are unique across slots and the off-rack list, so no
///   unit is ever referenced twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    key: StationKey,
    racks: Vec<Rack>,
    off_rack: Vec<StorageUnit>,
}

impl Station {
    pub fn new(key: StationKey, racks: Vec<Rack>) -> InventoryResult<Self> {
        Self::from_parts(key, racks, Vec::new())
    }

    /// Assemble a station from a snapshot; the whole snapshot is rejected if malformed.
    pub fn from_parts(
        key: StationKey,
        racks: Vec<Rack>,
        off_rack: Vec<StorageUnit>,
    ) -> InventoryResult<Self> {
        let station = Self {
            key,
            racks,
            off_rack,
        };
        station.validate()?;
        Ok(station)
    }

    pub fn key(&self) -> &StationKey {
        &self.key
    }

    pub fn container_id(&self) -> &ContainerId {
        &self.key.container_id
    }

    pub fn kind(&self) -> StationKind {
        self.key.kind
    }

    pub fn racks(&self) -> &[Rack] {
        &self.racks
    }

    pub fn rack(&self, rack_id: &RackId) -> Option<&Rack> {
        self.racks.iter().find(|r| r.id() == rack_id)
    }

    pub(crate) fn rack_mut(&mut self, rack_id: &RackId) -> Option<&mut Rack> {
        self.racks.iter_mut().find(|r| r.id() == rack_id)
    }

    /// Units not bound to any slot (off-shelf trays / overflow panels).
    pub fn off_rack(&self) -> &[StorageUnit] {
        &self.off_rack
    }

    pub(crate) fn off_rack_mut(&mut self) -> &mut Vec<StorageUnit> {
        &mut self.off_rack
    }

    pub fn slot(&self, address: &SlotAddress) -> InventoryResult<&Slot> {
        self.rack(&address.rack_id)
            .ok_or_else(|| InventoryError::not_found(format!("rack {}", address.rack_id)))?
            .slot(address.slot_number)
            .ok_or_else(|| InventoryError::not_found(format!("slot {address}")))
    }

    pub(crate) fn slot_mut(&mut self, address: &SlotAddress) -> InventoryResult<&mut Slot> {
        self.rack_mut(&address.rack_id)
            .ok_or_else(|| InventoryError::not_found(format!("rack {}", address.rack_id)))?
            .slot_mut(address.slot_number)
            .ok_or_else(|| InventoryError::not_found(format!("slot {address}")))
    }

    /// Every unit the station is responsible for: slotted first, then off-rack.
    pub fn units(&self) -> impl Iterator<Item = &StorageUnit> {
        self.racks
            .iter()
            .flat_map(Rack::units)
            .chain(self.off_rack.iter())
    }

    pub fn unit(&self, unit_id: &StorageUnitId) -> Option<&StorageUnit> {
        self.units().find(|u| &u.id_typed() == unit_id)
    }

    pub(crate) fn unit_mut(&mut self, unit_id: &StorageUnitId) -> Option<&mut StorageUnit> {
        self.racks
            .iter_mut()
            .flat_map(Rack::slots_mut)
            .filter_map(Slot::unit_mut)
            .chain(self.off_rack.iter_mut())
            .find(|u| &u.id_typed() == unit_id)
    }

    pub fn locate_unit(&self, unit_id: &StorageUnitId) -> Option<UnitLocation> {
        for rack in &self.racks {
            for slot in rack.slots() {
                if slot.unit().is_some_and(|u| &u.id_typed() == unit_id) {
                    return Some(UnitLocation::Slot(SlotAddress::new(
                        rack.id().clone(),
                        slot.number(),
                    )));
                }
            }
        }
        self.off_rack
            .iter()
            .any(|u| &u.id_typed() == unit_id)
            .then_some(UnitLocation::OffRack)
    }

    pub fn rfid_in_use(&self, tag: &RfidTag) -> bool {
        self.units().any(|u| u.rfid_tag() == tag)
    }

    /// The unit holding `crop_id`, and the crop itself.
    pub fn find_crop(&self, crop_id: &CropId) -> Option<(&StorageUnit, &Crop)> {
        self.units()
            .find_map(|u| u.crop(crop_id).map(|crop| (u, crop)))
    }

    /// Human-readable location, e.g. `"Shelf Upper, Slot 5"`.
    pub fn describe_slot(&self, address: &SlotAddress) -> String {
        let rack = self
            .rack(&address.rack_id)
            .map(Rack::name)
            .unwrap_or_else(|| address.rack_id.as_str());
        format!(
            "{} {}, Slot {}",
            self.kind().rack_noun(),
            rack,
            address.slot_number
        )
    }

    /// Crop-density utilization over all units (slotted and off-rack), equally weighted.
    pub fn utilization(&self) -> Percent {
        Percent::mean(self.units().map(StorageUnit::utilization))
    }

    /// Check every structural invariant; the first violation rejects the snapshot.
    pub fn validate(&self) -> InventoryResult<()> {
        if self.racks.is_empty() {
            return Err(InventoryError::malformed(format!(
                "station {} has no {}s",
                self.key,
                self.kind().rack_noun().to_ascii_lowercase()
            )));
        }

        let mut rack_ids = HashSet::new();
        for rack in &self.racks {
            if !rack_ids.insert(rack.id()) {
                return Err(InventoryError::malformed(format!(
                    "duplicate rack id {}",
                    rack.id()
                )));
            }
            rack.check_structure().map_err(InventoryError::malformed)?;
        }

        let expected_kind = self.kind().unit_kind();
        let mut unit_ids = HashSet::new();
        let mut tags = HashSet::new();
        for unit in self.units() {
            if unit.kind() != expected_kind {
                return Err(InventoryError::malformed(format!(
                    "{} {} cannot be held by a {} station",
                    unit.kind().noun(),
                    unit.id_typed(),
                    self.kind()
                )));
            }
            if !unit_ids.insert(unit.id_typed()) {
                return Err(InventoryError::malformed(format!(
                    "unit {} is referenced more than once",
                    unit.id_typed()
                )));
            }
            if !tags.insert(unit.rfid_tag()) {
                return Err(InventoryError::malformed(format!(
                    "rfid tag {} is attached to more than one unit",
                    unit.rfid_tag()
                )));
            }
            unit.check_structure().map_err(InventoryError::malformed)?;
        }

        Ok(())
    }
}

impl Entity for Station {
    type Id = StationKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}
