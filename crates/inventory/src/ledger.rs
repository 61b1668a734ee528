//! Slot occupancy ledger: the only way units enter, leave or move between slots.
//!
//! At most one slot references a given unit at any time; off-rack units are owned
//! by the station directly.

use crate::error::{InventoryError, InventoryResult};
use crate::ids::{RackId, StorageUnitId};
use crate::rack::{Slot, SlotAddress};
use crate::station::Station;
use crate::storage_unit::StorageUnit;

impl Station {
    /// The preferred slot if it is free, otherwise the lowest-numbered free slot.
    ///
    /// A preferred slot that is taken fails with `SlotOccupied` rather than falling
    /// back to another slot.
    pub fn find_empty_slot(
        &self,
        rack_id: &RackId,
        preferred: Option<u16>,
    ) -> InventoryResult<&Slot> {
        let rack = self
            .rack(rack_id)
            .ok_or_else(|| InventoryError::not_found(format!("rack {rack_id}")))?;

        match preferred {
            Some(number) => {
                let address = SlotAddress::new(rack_id.clone(), number);
                let slot = rack
                    .slot(number)
                    .ok_or_else(|| InventoryError::not_found(format!("slot {address}")))?;
                if slot.occupied() {
                    return Err(InventoryError::SlotOccupied(address));
                }
                Ok(slot)
            }
            None => rack
                .slots()
                .iter()
                .find(|s| !s.occupied())
                .ok_or_else(|| InventoryError::not_found(format!("empty slot in rack {rack_id}"))),
        }
    }

    /// Bind a unit that the station does not yet own into an empty slot.
    pub fn bind(&mut self, address: &SlotAddress, unit: StorageUnit) -> InventoryResult<()> {
        if unit.kind() != self.kind().unit_kind() {
            return Err(InventoryError::validation(
                "layout",
                format!(
                    "a {} station only holds {}s",
                    self.kind(),
                    self.kind().unit_kind().noun()
                ),
            ));
        }
        if self.unit(&unit.id_typed()).is_some() {
            return Err(InventoryError::Domain(farmops_core::DomainError::invariant(
                format!("unit {} is already owned by this station", unit.id_typed()),
            )));
        }
        if self.rfid_in_use(unit.rfid_tag()) {
            return Err(InventoryError::DuplicateRfid(unit.rfid_tag().clone()));
        }

        let slot = self.slot_mut(address)?;
        if slot.occupied() {
            return Err(InventoryError::AlreadyOccupied(address.clone()));
        }
        slot.put(unit);
        Ok(())
    }

    /// Move the unit bound at `address` to the off-rack list, crops intact.
    ///
    /// Returns the detached unit. An empty slot fails with `SlotEmpty` and leaves the
    /// station untouched, so repeated calls observe the same error.
    pub fn detach(&mut self, address: &SlotAddress) -> InventoryResult<StorageUnit> {
        let unit = self
            .slot_mut(address)?
            .take()
            .ok_or_else(|| InventoryError::SlotEmpty(address.clone()))?;
        self.off_rack_mut().push(unit.clone());
        Ok(unit)
    }

    /// Move an off-rack unit back into an empty slot.
    pub fn place_off_rack(
        &mut self,
        unit_id: &StorageUnitId,
        address: &SlotAddress,
    ) -> InventoryResult<()> {
        let idx = self
            .off_rack()
            .iter()
            .position(|u| &u.id_typed() == unit_id)
            .ok_or_else(|| {
                InventoryError::not_found(format!(
                    "{} unit {unit_id}",
                    self.kind().off_rack_label()
                ))
            })?;

        if self.slot(address)?.occupied() {
            return Err(InventoryError::AlreadyOccupied(address.clone()));
        }

        let unit = self.off_rack_mut().remove(idx);
        self.slot_mut(address)?.put(unit);
        Ok(())
    }
}
