//! Provisioning protocol: placing a new RFID-tagged tray/panel into an empty slot.
//!
//! ```text
//! Requested -> validate -> Validated -> bind -> Bound -> confirm -> Confirmed
//!     `-> Rejected (InventoryError)
//! ```
//!
//! Each state is its own type, so a request cannot be bound without having been
//! validated against the same station.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, InventoryResult};
use crate::ids::{RfidTag, StorageUnitId};
use crate::rack::SlotAddress;
use crate::station::{Station, StationKind};
use crate::storage_unit::{StorageUnit, UnitLayout};

/// Minimum RFID tag length accepted by the operator UI.
pub const DEFAULT_RFID_MIN_LENGTH: usize = 6;

/// Policy knobs applied during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPolicy {
    pub rfid_min_length: usize,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            rfid_min_length: DEFAULT_RFID_MIN_LENGTH,
        }
    }
}

/// Crop grid given to newly provisioned units, per station kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplates {
    pub tray: UnitLayout,
    pub panel: UnitLayout,
}

impl Default for UnitTemplates {
    fn default() -> Self {
        Self {
            tray: UnitLayout::Tray {
                rows: 20,
                columns: 10,
            },
            panel: UnitLayout::Panel {
                channels: 6,
                channel_length: 20,
            },
        }
    }
}

impl UnitTemplates {
    pub fn layout_for(&self, kind: StationKind) -> UnitLayout {
        match kind {
            StationKind::Nursery => self.tray,
            StationKind::Cultivation => self.panel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStage {
    Requested,
    Validated,
    Bound,
    Confirmed,
    Rejected,
}

/// `Requested`: what the operator submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub slot: SlotAddress,
    pub rfid_tag: String,
    pub notes: Option<String>,
}

impl ProvisioningRequest {
    pub fn new(slot: SlotAddress, rfid_tag: impl Into<String>, notes: Option<String>) -> Self {
        Self {
            slot,
            rfid_tag: rfid_tag.into(),
            notes,
        }
    }

    pub fn stage(&self) -> ProvisioningStage {
        ProvisioningStage::Requested
    }

    /// `Requested → Validated | Rejected`.
    ///
    /// Checks, in order: tag present, tag long enough, tag unused in the station,
    /// slot exists, slot free.
    pub fn validate(
        self,
        station: &Station,
        policy: &ProvisioningPolicy,
    ) -> InventoryResult<ValidatedProvisioning> {
        let raw = self.rfid_tag.trim();
        if raw.is_empty() {
            return Err(InventoryError::validation("rfid_tag", "is required"));
        }
        if raw.chars().count() < policy.rfid_min_length {
            return Err(InventoryError::validation(
                "rfid_tag",
                format!("too short (minimum {} characters)", policy.rfid_min_length),
            ));
        }
        let rfid_tag = RfidTag::parse(raw)?;
        if station.rfid_in_use(&rfid_tag) {
            return Err(InventoryError::DuplicateRfid(rfid_tag));
        }

        let slot = station.slot(&self.slot).map_err(|_| {
            InventoryError::validation("slot", format!("{} does not exist", self.slot))
        })?;
        if slot.occupied() {
            return Err(InventoryError::SlotOccupied(self.slot));
        }

        let notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(ValidatedProvisioning {
            slot: self.slot,
            rfid_tag,
            notes,
        })
    }
}

/// `Validated`: inputs are well-formed and the slot was free when checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProvisioning {
    slot: SlotAddress,
    rfid_tag: RfidTag,
    notes: Option<String>,
}

impl ValidatedProvisioning {
    pub fn stage(&self) -> ProvisioningStage {
        ProvisioningStage::Validated
    }

    pub fn slot(&self) -> &SlotAddress {
        &self.slot
    }

    pub fn rfid_tag(&self) -> &RfidTag {
        &self.rfid_tag
    }

    /// `Validated → Bound`: build an empty unit and bind it through the ledger.
    ///
    /// The ledger re-checks occupancy, so a slot taken since validation surfaces as
    /// `AlreadyOccupied` instead of being overwritten.
    pub fn bind(
        self,
        station: &mut Station,
        unit_id: StorageUnitId,
        templates: &UnitTemplates,
        provisioned_at: DateTime<Utc>,
    ) -> InventoryResult<BoundProvisioning> {
        let layout = templates.layout_for(station.kind());
        layout.ensure_valid()?;

        let unit = StorageUnit::new(unit_id, self.rfid_tag, layout, provisioned_at, self.notes);
        station.bind(&self.slot, unit.clone())?;

        Ok(BoundProvisioning {
            location: station.describe_slot(&self.slot),
            unit,
            slot: self.slot,
        })
    }
}

/// `Bound`: the unit sits in the slot of the (working copy of the) station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundProvisioning {
    unit: StorageUnit,
    slot: SlotAddress,
    location: String,
}

impl BoundProvisioning {
    pub fn stage(&self) -> ProvisioningStage {
        ProvisioningStage::Bound
    }

    /// `Bound → Confirmed`. Terminal.
    pub fn confirm(self) -> ProvisioningResult {
        let created_at = self.unit.provisioned_at();
        ProvisioningResult {
            unit: self.unit,
            slot: self.slot,
            location: self.location,
            created_at,
        }
    }
}

/// `Confirmed`: returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub unit: StorageUnit,
    pub slot: SlotAddress,
    /// e.g. `"Shelf Upper, Slot 5"`.
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl ProvisioningResult {
    pub fn stage(&self) -> ProvisioningStage {
        ProvisioningStage::Confirmed
    }
}

/// Run the whole protocol against `station`.
pub fn provision(
    station: &mut Station,
    request: ProvisioningRequest,
    policy: &ProvisioningPolicy,
    templates: &UnitTemplates,
    unit_id: StorageUnitId,
    provisioned_at: DateTime<Utc>,
) -> InventoryResult<ProvisioningResult> {
    let validated = request.validate(station, policy)?;
    let bound = validated.bind(station, unit_id, templates, provisioned_at)?;
    Ok(bound.confirm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RackId;
    use crate::rack::Rack;
    use crate::station::StationKey;
    use farmops_core::ContainerId;

    fn station(kind: StationKind) -> Station {
        Station::new(
            StationKey::new(ContainerId::parse("farm-1").unwrap(), kind),
            vec![Rack::new(RackId::parse("upper").unwrap(), "Upper", 8).unwrap()],
        )
        .unwrap()
    }

    fn slot(n: u16) -> SlotAddress {
        SlotAddress::new(RackId::parse("upper").unwrap(), n)
    }

    fn run(st: &mut Station, request: ProvisioningRequest) -> InventoryResult<ProvisioningResult> {
        provision(
            st,
            request,
            &ProvisioningPolicy::default(),
            &UnitTemplates::default(),
            StorageUnitId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn confirms_with_location_and_empty_unit() {
        let mut st = station(StationKind::Nursery);
        let result = run(&mut st, ProvisioningRequest::new(slot(5), "RFID-123456", None)).unwrap();

        assert_eq!(result.stage(), ProvisioningStage::Confirmed);
        assert_eq!(result.location, "Shelf Upper, Slot 5");
        assert_eq!(result.unit.crop_count(), 0);
        assert_eq!(result.unit.utilization().value(), 0);
        assert_eq!(result.unit.layout(), UnitLayout::Tray { rows: 20, columns: 10 });
        assert_eq!(result.created_at, result.unit.provisioned_at());
        assert!(st.slot(&slot(5)).unwrap().occupied());
    }

    #[test]
    fn cultivation_walls_get_panels() {
        let mut st = station(StationKind::Cultivation);
        let result = run(&mut st, ProvisioningRequest::new(slot(1), "PANEL-777", None)).unwrap();
        assert_eq!(result.location, "Wall Upper, Slot 1");
        assert!(matches!(result.unit.layout(), UnitLayout::Panel { .. }));
    }

    #[test]
    fn short_tag_is_rejected_with_field_name() {
        let st = station(StationKind::Nursery);
        let err = ProvisioningRequest::new(slot(1), "AB12", None)
            .validate(&st, &ProvisioningPolicy::default())
            .unwrap_err();
        match &err {
            InventoryError::Validation { field, message } => {
                assert_eq!(*field, "rfid_tag");
                assert!(message.starts_with("too short"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(err.to_string().starts_with("rfid_tag too short"));
    }

    #[test]
    fn empty_tag_is_rejected() {
        let st = station(StationKind::Nursery);
        let err = ProvisioningRequest::new(slot(1), "   ", None)
            .validate(&st, &ProvisioningPolicy::default())
            .unwrap_err();
        assert_eq!(err, InventoryError::validation("rfid_tag", "is required"));
    }

    #[test]
    fn min_length_is_a_policy() {
        let st = station(StationKind::Nursery);
        let lenient = ProvisioningPolicy { rfid_min_length: 4 };
        assert!(ProvisioningRequest::new(slot(1), "AB12", None)
            .validate(&st, &lenient)
            .is_ok());
    }

    #[test]
    fn unknown_slot_is_a_validation_error() {
        let st = station(StationKind::Nursery);
        let err = ProvisioningRequest::new(slot(42), "RFID-123456", None)
            .validate(&st, &ProvisioningPolicy::default())
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation { field: "slot", .. }));
    }

    #[test]
    fn occupied_slot_and_duplicate_tag_are_rejected() {
        let mut st = station(StationKind::Nursery);
        run(&mut st, ProvisioningRequest::new(slot(5), "RFID-AAAAAA", None)).unwrap();

        let err = run(&mut st, ProvisioningRequest::new(slot(5), "RFID-BBBBBB", None)).unwrap_err();
        assert_eq!(err, InventoryError::SlotOccupied(slot(5)));

        let err = run(&mut st, ProvisioningRequest::new(slot(6), "RFID-AAAAAA", None)).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateRfid(_)));
    }

    #[test]
    fn bind_after_stale_validation_does_not_overwrite() {
        let mut st = station(StationKind::Nursery);
        let first = ProvisioningRequest::new(slot(5), "RFID-AAAAAA", None)
            .validate(&st, &ProvisioningPolicy::default())
            .unwrap();
        let second = ProvisioningRequest::new(slot(5), "RFID-BBBBBB", None)
            .validate(&st, &ProvisioningPolicy::default())
            .unwrap();

        let templates = UnitTemplates::default();
        first
            .bind(&mut st, StorageUnitId::new(), &templates, Utc::now())
            .unwrap();
        let err = second
            .bind(&mut st, StorageUnitId::new(), &templates, Utc::now())
            .unwrap_err();
        assert_eq!(err, InventoryError::AlreadyOccupied(slot(5)));
        assert_eq!(
            st.slot(&slot(5)).unwrap().unit().unwrap().rfid_tag().as_str(),
            "RFID-AAAAAA"
        );
    }

    #[test]
    fn notes_are_trimmed_and_blank_notes_dropped() {
        let mut st = station(StationKind::Nursery);
        let result = run(
            &mut st,
            ProvisioningRequest::new(slot(1), "RFID-123456", Some("  new batch ".into())),
        )
        .unwrap();
        assert_eq!(result.unit.notes(), Some("new batch"));

        let result = run(
            &mut st,
            ProvisioningRequest::new(slot(2), "RFID-654321", Some("   ".into())),
        )
        .unwrap();
        assert_eq!(result.unit.notes(), None);
    }
}
