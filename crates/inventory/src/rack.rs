//! Slots and the shelves/walls ("racks") that hold them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use farmops_core::ValueObject;

use crate::error::{InventoryError, InventoryResult};
use crate::ids::RackId;
use crate::storage_unit::StorageUnit;
use crate::utilization::Percent;

/// Address of a slot within a station: rack + 1-based slot number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotAddress {
    pub rack_id: RackId,
    pub slot_number: u16,
}

impl ValueObject for SlotAddress {}

impl SlotAddress {
    pub fn new(rack_id: RackId, slot_number: u16) -> Self {
        Self {
            rack_id,
            slot_number,
        }
    }
}

impl core::fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.rack_id, self.slot_number)
    }
}

/// A numbered position that holds at most one storage unit.
///
/// `occupied()` is derived from the bound unit, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    number: u16,
    unit: Option<StorageUnit>,
}

impl Slot {
    pub fn empty(number: u16) -> Self {
        Self { number, unit: None }
    }

    pub fn holding(number: u16, unit: StorageUnit) -> Self {
        Self {
            number,
            unit: Some(unit),
        }
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn occupied(&self) -> bool {
        self.unit.is_some()
    }

    pub fn unit(&self) -> Option<&StorageUnit> {
        self.unit.as_ref()
    }

    pub(crate) fn unit_mut(&mut self) -> Option<&mut StorageUnit> {
        self.unit.as_mut()
    }

    pub(crate) fn put(&mut self, unit: StorageUnit) {
        self.unit = Some(unit);
    }

    pub(crate) fn take(&mut self) -> Option<StorageUnit> {
        self.unit.take()
    }
}

/// A nursery shelf or a cultivation wall: slots numbered `1..=N`, `N >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    id: RackId,
    name: String,
    slots: Vec<Slot>,
}

impl Rack {
    /// A rack with `slot_count` empty slots.
    pub fn new(id: RackId, name: impl Into<String>, slot_count: u16) -> InventoryResult<Self> {
        if slot_count == 0 {
            return Err(InventoryError::validation(
                "slot_count",
                format!("rack {id} must have at least one slot"),
            ));
        }
        Ok(Self {
            id,
            name: name.into(),
            slots: (1..=slot_count).map(Slot::empty).collect(),
        })
    }

    /// A rack from pre-populated slots; numbering must be exactly `1..=N`.
    pub fn from_slots(
        id: RackId,
        name: impl Into<String>,
        slots: Vec<Slot>,
    ) -> InventoryResult<Self> {
        let rack = Self {
            id,
            name: name.into(),
            slots,
        };
        rack.check_structure().map_err(InventoryError::malformed)?;
        Ok(rack)
    }

    pub fn id(&self) -> &RackId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, number: u16) -> Option<&Slot> {
        // Numbering is contiguous from 1, so the index is derived directly.
        let idx = usize::from(number).checked_sub(1)?;
        self.slots.get(idx).filter(|s| s.number == number)
    }

    pub(crate) fn slot_mut(&mut self, number: u16) -> Option<&mut Slot> {
        let idx = usize::from(number).checked_sub(1)?;
        self.slots.get_mut(idx).filter(|s| s.number == number)
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut()
    }

    pub fn units(&self) -> impl Iterator<Item = &StorageUnit> {
        self.slots.iter().filter_map(Slot::unit)
    }

    pub fn total_slots(&self) -> u32 {
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    pub fn occupied_slots(&self) -> u32 {
        u32::try_from(self.units().count()).unwrap_or(u32::MAX)
    }

    /// Slot occupancy: occupied slots / total slots.
    pub fn occupancy(&self) -> Percent {
        Percent::from_ratio(
            u64::from(self.occupied_slots()),
            u64::from(self.total_slots()),
        )
    }

    /// Crop density: equal-weight mean of the occupied units' utilization.
    pub fn crop_density(&self) -> Percent {
        Percent::mean(self.units().map(StorageUnit::utilization))
    }

    pub(crate) fn check_structure(&self) -> Result<(), String> {
        if self.slots.is_empty() {
            return Err(format!("rack {} has no slots", self.id));
        }
        for (idx, slot) in self.slots.iter().enumerate() {
            let expected = idx + 1;
            if usize::from(slot.number) != expected {
                let seen: HashSet<u16> = self.slots[..idx].iter().map(|s| s.number).collect();
                return Err(if seen.contains(&slot.number) {
                    format!("rack {} has duplicate slot number {}", self.id, slot.number)
                } else {
                    format!(
                        "rack {} slot numbering must be 1..={} without gaps \
                         (found {} at position {})",
                        self.id,
                        self.slots.len(),
                        slot.number,
                        expected
                    )
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::{Crop, CropPosition};
    use crate::ids::{CropId, RfidTag, StorageUnitId};
    use crate::storage_unit::UnitLayout;
    use chrono::{NaiveDate, Utc};

    fn rack_id(s: &str) -> RackId {
        RackId::parse(s).unwrap()
    }

    /// 2x2 tray filled with `crops` crops.
    fn tray_with(crops: u16) -> StorageUnit {
        let mut unit = StorageUnit::new(
            StorageUnitId::new(),
            RfidTag::parse(format!("TAG-{}", StorageUnitId::new())).unwrap(),
            UnitLayout::Tray { rows: 2, columns: 2 },
            Utc::now(),
            None,
        );
        for n in 0..crops {
            let crop = Crop::seedling(
                CropId::parse(format!("c{n}")).unwrap(),
                CropPosition::Tray { row: n / 2 + 1, column: n % 2 + 1 },
                "kale",
                NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            );
            unit.seed(crop).unwrap();
        }
        unit
    }

    #[test]
    fn zero_slot_rack_is_rejected() {
        assert!(Rack::new(rack_id("upper"), "Upper", 0).is_err());
        assert!(Rack::from_slots(rack_id("upper"), "Upper", vec![]).is_err());
    }

    #[test]
    fn slot_numbering_must_be_contiguous() {
        let dup = vec![Slot::empty(1), Slot::empty(1)];
        let err = Rack::from_slots(rack_id("a"), "A", dup).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedSnapshot(ref m) if m.contains("duplicate")));

        let gap = vec![Slot::empty(1), Slot::empty(3)];
        assert!(matches!(
            Rack::from_slots(rack_id("a"), "A", gap),
            Err(InventoryError::MalformedSnapshot(_))
        ));

        let ok = vec![Slot::empty(1), Slot::empty(2)];
        assert!(Rack::from_slots(rack_id("a"), "A", ok).is_ok());
    }

    #[test]
    fn occupancy_and_density_are_distinct() {
        // 4 slots, one holding a full tray, one holding an empty tray.
        let slots = vec![
            Slot::holding(1, tray_with(4)),
            Slot::holding(2, tray_with(0)),
            Slot::empty(3),
            Slot::empty(4),
        ];
        let rack = Rack::from_slots(rack_id("lower"), "Lower", slots).unwrap();
        assert_eq!(rack.occupied_slots(), 2);
        assert_eq!(rack.occupancy().value(), 50);
        assert_eq!(rack.crop_density().value(), 50);

        let slots = vec![Slot::holding(1, tray_with(3)), Slot::empty(2)];
        let rack = Rack::from_slots(rack_id("lower"), "Lower", slots).unwrap();
        assert_eq!(rack.occupancy().value(), 50);
        assert_eq!(rack.crop_density().value(), 75);
    }

    #[test]
    fn empty_rack_has_zero_density() {
        let rack = Rack::new(rack_id("upper"), "Upper", 8).unwrap();
        assert_eq!(rack.occupancy(), Percent::ZERO);
        assert_eq!(rack.crop_density(), Percent::ZERO);
        assert!(rack.slot(0).is_none());
        assert!(rack.slot(9).is_none());
        assert_eq!(rack.slot(8).map(Slot::number), Some(8));
    }
}
