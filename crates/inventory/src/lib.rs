//! Inventory domain module (event-sourced).
//!
//! Models the slots of a vertical-farm container: stations own shelves (nursery) or
//! walls (cultivation), whose numbered slots hold RFID-tagged trays or panels, which in
//! turn hold crops. The crate is pure domain logic (no IO, no HTTP, no storage):
//!
//! - occupancy ledger: finding, binding and detaching slot contents
//! - provisioning: `Requested → Validated → Bound → Confirmed` (or rejected)
//! - utilization: occupancy and crop-density percentages with low/medium/high levels
//! - crop timeline: ordered per-crop history with lazy date-range queries
//! - the station aggregate whose events carry all of the above

pub mod crop;
pub mod error;
pub mod history;
pub mod ids;
mod ledger;
pub mod provisioning;
pub mod rack;
pub mod report;
pub mod station;
pub mod station_aggregate;
pub mod storage_unit;
pub mod utilization;

pub use crop::{Crop, CropPosition, CropSize, HealthStatus, PlannedTransition, TransitionKind};
pub use error::{InventoryError, InventoryResult};
pub use history::{
    CropEventKind, CropHistoryEvent, CropLocation, CropTimeline, DateRange, TimelineIter,
    TimelineQuery,
};
pub use ids::{CropId, RackId, RfidTag, StorageUnitId};
pub use provisioning::{
    BoundProvisioning, DEFAULT_RFID_MIN_LENGTH, ProvisioningPolicy, ProvisioningRequest,
    ProvisioningResult, ProvisioningStage, UnitTemplates, ValidatedProvisioning, provision,
};
pub use rack::{Rack, Slot, SlotAddress};
pub use report::{CropReport, RackReport, SlotReport, StationReport, UnitReport};
pub use station::{Station, StationKey, StationKind, UnitLocation};
pub use station_aggregate::{
    CommissionStation, CropRemoved, CropSeeded, CropTransplanted, CropUpdated, DetachStorageUnit,
    PlaceStorageUnit, ProvisionStorageUnit, RackSpec, RemovalReason, RemoveCrop, SeedCrop,
    StationAggregate, StationCommand, StationCommissioned, StationEvent, StorageUnitDetached,
    StorageUnitPlaced, StorageUnitProvisioned, TransplantCrop, UpdateCrop,
};
pub use storage_unit::{StorageUnit, UnitKind, UnitLayout};
pub use utilization::{Percent, UtilizationLevel};
