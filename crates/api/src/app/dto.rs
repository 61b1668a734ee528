use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use farmops_infra::CropObservation;
use farmops_inventory::{
    Crop, CropEventKind, CropHistoryEvent, CropId, CropLocation, CropPosition, CropSize,
    HealthStatus, PlannedTransition, RackId, RackSpec, RemovalReason, SlotAddress, StorageUnitId,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CommissionStationRequest {
    pub racks: Vec<RackSpec>,
}

#[derive(Debug, Deserialize)]
pub struct SlotRef {
    pub rack_id: RackId,
    pub slot_number: u16,
}

impl From<SlotRef> for SlotAddress {
    fn from(value: SlotRef) -> Self {
        SlotAddress::new(value.rack_id, value.slot_number)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    #[serde(flatten)]
    pub slot: SlotRef,
    /// Kept as a raw string so an empty or short tag reaches validation.
    #[serde(default)]
    pub rfid_tag: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetachRequest {
    #[serde(flatten)]
    pub slot: SlotRef,
}

#[derive(Debug, Deserialize)]
pub struct PlaceRequest {
    #[serde(flatten)]
    pub slot: SlotRef,
}

#[derive(Debug, Deserialize)]
pub struct SeedCropRequest {
    pub crop_id: CropId,
    pub position: CropPosition,
    pub seed_type: String,
    /// Defaults to today.
    pub seeded_date: Option<NaiveDate>,
    #[serde(default)]
    pub age_days: u32,
    pub planned_transition: Option<PlannedTransition>,
    pub note: Option<String>,
}

impl SeedCropRequest {
    pub fn into_crop(self, today: NaiveDate) -> (Crop, Option<String>) {
        let mut crop = Crop::seedling(
            self.crop_id,
            self.position,
            self.seed_type,
            self.seeded_date.unwrap_or(today),
        );
        crop.age_days = self.age_days;
        crop.planned_transition = self.planned_transition;
        (crop, self.note)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCropRequest {
    #[serde(flatten)]
    pub observation: CropObservation,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransplantCropRequest {
    pub to_unit: StorageUnitId,
    pub to_position: CropPosition,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCropQuery {
    pub reason: Option<RemovalReason>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// An externally observed crop event (scouting, lab result, manual correction).
#[derive(Debug, Deserialize)]
pub struct RecordCropEventRequest {
    pub kind: CropEventKind,
    /// Defaults to now.
    pub occurred_at: Option<DateTime<Utc>>,
    pub location: CropLocation,
    pub health: HealthStatus,
    pub size: CropSize,
    pub note: Option<String>,
}

impl RecordCropEventRequest {
    pub fn into_event(self, crop_id: CropId, now: DateTime<Utc>) -> CropHistoryEvent {
        CropHistoryEvent {
            crop_id,
            kind: self.kind,
            occurred_at: self.occurred_at.unwrap_or(now),
            location: self.location,
            health: self.health,
            size: self.size,
            note: self.note,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CropHistoryResponse {
    pub crop_id: CropId,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub events: Vec<CropHistoryEvent>,
}
