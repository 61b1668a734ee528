use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmops_core::{Aggregate, AggregateRoot, ContainerId, DomainError};
use farmops_events::Event;

use crate::crop::{Crop, CropPosition, CropSize, HealthStatus, PlannedTransition, TransitionKind};
use crate::error::{InventoryError, InventoryResult};
use crate::history::{CropEventKind, CropHistoryEvent};
use crate::ids::{CropId, RackId, StorageUnitId};
use crate::provisioning::{ProvisioningPolicy, ProvisioningRequest, UnitTemplates, provision};
use crate::rack::{Rack, SlotAddress};
use crate::station::{Station, StationKey, StationKind};
use crate::storage_unit::StorageUnit;

/// Shape of one shelf/wall when a station is commissioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackSpec {
    pub id: RackId,
    pub name: String,
    pub slot_count: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Harvested,
    Disposed,
}

/// Command: CommissionStation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionStation {
    pub racks: Vec<RackSpec>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ProvisionStorageUnit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionStorageUnit {
    pub unit_id: StorageUnitId,
    pub request: ProvisioningRequest,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DetachStorageUnit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachStorageUnit {
    pub slot: SlotAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PlaceStorageUnit (off-rack unit back into a slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceStorageUnit {
    pub unit_id: StorageUnitId,
    pub slot: SlotAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SeedCrop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCrop {
    pub unit_id: StorageUnitId,
    pub crop: Crop,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateCrop (growth/health observation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCrop {
    pub crop_id: CropId,
    pub age_days: u32,
    pub health: HealthStatus,
    pub size: CropSize,
    pub planned_transition: Option<PlannedTransition>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransplantCrop (move within the station).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransplantCrop {
    pub crop_id: CropId,
    pub to_unit: StorageUnitId,
    pub to_position: CropPosition,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveCrop (harvest or disposal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCrop {
    pub crop_id: CropId,
    pub reason: RemovalReason,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationCommand {
    CommissionStation(CommissionStation),
    ProvisionStorageUnit(ProvisionStorageUnit),
    DetachStorageUnit(DetachStorageUnit),
    PlaceStorageUnit(PlaceStorageUnit),
    SeedCrop(SeedCrop),
    UpdateCrop(UpdateCrop),
    TransplantCrop(TransplantCrop),
    RemoveCrop(RemoveCrop),
}

impl StationCommand {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StationCommand::CommissionStation(c) => c.occurred_at,
            StationCommand::ProvisionStorageUnit(c) => c.occurred_at,
            StationCommand::DetachStorageUnit(c) => c.occurred_at,
            StationCommand::PlaceStorageUnit(c) => c.occurred_at,
            StationCommand::SeedCrop(c) => c.occurred_at,
            StationCommand::UpdateCrop(c) => c.occurred_at,
            StationCommand::TransplantCrop(c) => c.occurred_at,
            StationCommand::RemoveCrop(c) => c.occurred_at,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StationCommand::CommissionStation(_) => "commission_station",
            StationCommand::ProvisionStorageUnit(_) => "provision_storage_unit",
            StationCommand::DetachStorageUnit(_) => "detach_storage_unit",
            StationCommand::PlaceStorageUnit(_) => "place_storage_unit",
            StationCommand::SeedCrop(_) => "seed_crop",
            StationCommand::UpdateCrop(_) => "update_crop",
            StationCommand::TransplantCrop(_) => "transplant_crop",
            StationCommand::RemoveCrop(_) => "remove_crop",
        }
    }
}

/// Event: StationCommissioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationCommissioned {
    pub container_id: ContainerId,
    pub kind: StationKind,
    pub racks: Vec<RackSpec>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StorageUnitProvisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnitProvisioned {
    pub unit: StorageUnit,
    pub slot: SlotAddress,
    pub location: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StorageUnitDetached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnitDetached {
    pub unit_id: StorageUnitId,
    pub slot: SlotAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StorageUnitPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnitPlaced {
    pub unit_id: StorageUnitId,
    pub slot: SlotAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CropSeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSeeded {
    pub unit_id: StorageUnitId,
    pub crop: Crop,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CropUpdated. Carries the crop's full new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropUpdated {
    pub unit_id: StorageUnitId,
    pub crop: Crop,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CropTransplanted. `crop.position` is the new position in `to_unit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropTransplanted {
    pub from_unit: StorageUnitId,
    pub to_unit: StorageUnitId,
    pub crop: Crop,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CropRemoved. Carries the crop's last state before removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRemoved {
    pub unit_id: StorageUnitId,
    pub crop: Crop,
    pub reason: RemovalReason,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationEvent {
    StationCommissioned(StationCommissioned),
    StorageUnitProvisioned(StorageUnitProvisioned),
    StorageUnitDetached(StorageUnitDetached),
    StorageUnitPlaced(StorageUnitPlaced),
    CropSeeded(CropSeeded),
    CropUpdated(CropUpdated),
    CropTransplanted(CropTransplanted),
    CropRemoved(CropRemoved),
}

impl Event for StationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StationEvent::StationCommissioned(_) => "inventory.station.commissioned",
            StationEvent::StorageUnitProvisioned(_) => "inventory.station.unit_provisioned",
            StationEvent::StorageUnitDetached(_) => "inventory.station.unit_detached",
            StationEvent::StorageUnitPlaced(_) => "inventory.station.unit_placed",
            StationEvent::CropSeeded(_) => "inventory.crop.seeded",
            StationEvent::CropUpdated(_) => "inventory.crop.updated",
            StationEvent::CropTransplanted(_) => "inventory.crop.transplanted",
            StationEvent::CropRemoved(_) => "inventory.crop.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StationEvent::StationCommissioned(e) => e.occurred_at,
            StationEvent::StorageUnitProvisioned(e) => e.occurred_at,
            StationEvent::StorageUnitDetached(e) => e.occurred_at,
            StationEvent::StorageUnitPlaced(e) => e.occurred_at,
            StationEvent::CropSeeded(e) => e.occurred_at,
            StationEvent::CropUpdated(e) => e.occurred_at,
            StationEvent::CropTransplanted(e) => e.occurred_at,
            StationEvent::CropRemoved(e) => e.occurred_at,
        }
    }
}

impl StationEvent {
    /// The crop timeline entry this event implies, if it concerns a crop.
    pub fn crop_history(&self) -> Option<CropHistoryEvent> {
        let (kind, unit_id, crop, note, at) = match self {
            StationEvent::CropSeeded(e) => {
                (CropEventKind::Seeded, e.unit_id, &e.crop, &e.note, e.occurred_at)
            }
            StationEvent::CropUpdated(e) => {
                (CropEventKind::GrowthUpdate, e.unit_id, &e.crop, &e.note, e.occurred_at)
            }
            StationEvent::CropTransplanted(e) => {
                (CropEventKind::Transplanted, e.to_unit, &e.crop, &e.note, e.occurred_at)
            }
            StationEvent::CropRemoved(e) => {
                let kind = match e.reason {
                    RemovalReason::Harvested => CropEventKind::Harvested,
                    RemovalReason::Disposed => CropEventKind::Disposed,
                };
                (kind, e.unit_id, &e.crop, &e.note, e.occurred_at)
            }
            _ => return None,
        };
        Some(CropHistoryEvent::capture(kind, crop, unit_id, at, note.clone()))
    }
}

/// Aggregate root: one station's event stream.
///
/// State is a [`Station`] once commissioned. Every command is decided against a
/// scratch copy of that state using the same ledger/provisioning code that `apply`
/// uses, so an accepted command always applies cleanly to the state it was decided on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationAggregate {
    key: StationKey,
    station: Option<Station>,
    policy: ProvisioningPolicy,
    templates: UnitTemplates,
    version: u64,
    last_occurred_at: Option<DateTime<Utc>>,
    replay_error: Option<InventoryError>,
}

impl StationAggregate {
    /// Create an empty, not-yet-commissioned aggregate instance for rehydration.
    pub fn empty(key: StationKey) -> Self {
        Self {
            key,
            station: None,
            policy: ProvisioningPolicy::default(),
            templates: UnitTemplates::default(),
            version: 0,
            last_occurred_at: None,
            replay_error: None,
        }
    }

    pub fn with_rules(mut self, policy: ProvisioningPolicy, templates: UnitTemplates) -> Self {
        self.policy = policy;
        self.templates = templates;
        self
    }

    pub fn is_commissioned(&self) -> bool {
        self.station.is_some()
    }

    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    pub fn replay_error(&self) -> Option<&InventoryError> {
        self.replay_error.as_ref()
    }

    /// Current state, or why there is none.
    pub fn snapshot(&self) -> InventoryResult<&Station> {
        if let Some(err) = &self.replay_error {
            return Err(InventoryError::malformed(format!(
                "station {} failed to replay: {err}",
                self.key
            )));
        }
        self.station
            .as_ref()
            .ok_or_else(|| InventoryError::not_found(format!("station {}", self.key)))
    }

    fn scratch(&self) -> InventoryResult<Station> {
        self.snapshot().cloned()
    }

    fn station_mut(&mut self) -> InventoryResult<&mut Station> {
        let key = &self.key;
        self.station
            .as_mut()
            .ok_or_else(|| InventoryError::not_found(format!("station {key}")))
    }
}

impl AggregateRoot for StationAggregate {
    type Id = StationKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for StationAggregate {
    type Command = StationCommand;
    type Event = StationEvent;
    type Error = InventoryError;

    fn apply(&mut self, event: &Self::Event) {
        // A stream that fails to replay is surfaced through snapshot(), never dropped.
        if self.replay_error.is_none() {
            if let Err(err) = self.apply_inner(event) {
                self.replay_error = Some(err);
            }
        }

        let at = event.occurred_at();
        self.last_occurred_at = Some(self.last_occurred_at.map_or(at, |last| last.max(at)));

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if let Some(last) = self.last_occurred_at {
            if command.occurred_at() < last {
                return Err(InventoryError::validation(
                    "occurred_at",
                    format!("{} precedes the last station event at {last}", command.occurred_at()),
                ));
            }
        }

        match command {
            StationCommand::CommissionStation(cmd) => self.handle_commission(cmd),
            StationCommand::ProvisionStorageUnit(cmd) => self.handle_provision(cmd),
            StationCommand::DetachStorageUnit(cmd) => self.handle_detach(cmd),
            StationCommand::PlaceStorageUnit(cmd) => self.handle_place(cmd),
            StationCommand::SeedCrop(cmd) => self.handle_seed(cmd),
            StationCommand::UpdateCrop(cmd) => self.handle_update(cmd),
            StationCommand::TransplantCrop(cmd) => self.handle_transplant(cmd),
            StationCommand::RemoveCrop(cmd) => self.handle_remove(cmd),
        }
    }
}

impl StationAggregate {
    fn apply_inner(&mut self, event: &StationEvent) -> InventoryResult<()> {
        match event {
            StationEvent::StationCommissioned(e) => {
                let key = StationKey::new(e.container_id.clone(), e.kind);
                if key != self.key {
                    return Err(InventoryError::malformed(format!(
                        "stream {} contains commissioning for {key}",
                        self.key
                    )));
                }
                self.station = Some(build_station(key, &e.racks)?);
            }
            StationEvent::StorageUnitProvisioned(e) => {
                self.station_mut()?.bind(&e.slot, e.unit.clone())?;
            }
            StationEvent::StorageUnitDetached(e) => {
                let detached = self.station_mut()?.detach(&e.slot)?;
                if detached.id_typed() != e.unit_id {
                    return Err(InventoryError::malformed(format!(
                        "slot {} held {} but {} was detached",
                        e.slot,
                        detached.id_typed(),
                        e.unit_id
                    )));
                }
            }
            StationEvent::StorageUnitPlaced(e) => {
                self.station_mut()?.place_off_rack(&e.unit_id, &e.slot)?;
            }
            StationEvent::CropSeeded(e) => {
                unit_in(self.station_mut()?, &e.unit_id)?.seed(e.crop.clone())?;
            }
            StationEvent::CropUpdated(e) => {
                unit_in(self.station_mut()?, &e.unit_id)?.replace(e.crop.clone())?;
            }
            StationEvent::CropTransplanted(e) => {
                let station = self.station_mut()?;
                unit_in(station, &e.from_unit)?
                    .remove(&e.crop.id)
                    .ok_or_else(|| InventoryError::not_found(format!("crop {}", e.crop.id)))?;
                unit_in(station, &e.to_unit)?.seed(e.crop.clone())?;
            }
            StationEvent::CropRemoved(e) => {
                unit_in(self.station_mut()?, &e.unit_id)?
                    .remove(&e.crop.id)
                    .ok_or_else(|| InventoryError::not_found(format!("crop {}", e.crop.id)))?;
            }
        }
        Ok(())
    }

    fn handle_commission(&self, cmd: &CommissionStation) -> InventoryResult<Vec<StationEvent>> {
        if self.station.is_some() {
            return Err(DomainError::conflict(format!(
                "station {} is already commissioned",
                self.key
            ))
            .into());
        }
        if cmd.racks.is_empty() {
            return Err(InventoryError::validation(
                "racks",
                format!(
                    "a station needs at least one {}",
                    self.key.kind.rack_noun().to_ascii_lowercase()
                ),
            ));
        }
        for (idx, spec) in cmd.racks.iter().enumerate() {
            if cmd.racks[..idx].iter().any(|r| r.id == spec.id) {
                return Err(InventoryError::validation(
                    "racks",
                    format!("duplicate rack id {}", spec.id),
                ));
            }
            if spec.name.trim().is_empty() {
                return Err(InventoryError::validation(
                    "racks",
                    format!("rack {} needs a name", spec.id),
                ));
            }
        }
        build_station(self.key.clone(), &cmd.racks)?;

        Ok(vec![StationEvent::StationCommissioned(StationCommissioned {
            container_id: self.key.container_id.clone(),
            kind: self.key.kind,
            racks: cmd.racks.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_provision(&self, cmd: &ProvisionStorageUnit) -> InventoryResult<Vec<StationEvent>> {
        let mut scratch = self.scratch()?;
        let result = provision(
            &mut scratch,
            cmd.request.clone(),
            &self.policy,
            &self.templates,
            cmd.unit_id,
            cmd.occurred_at,
        )?;

        Ok(vec![StationEvent::StorageUnitProvisioned(StorageUnitProvisioned {
            unit: result.unit,
            slot: result.slot,
            location: result.location,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_detach(&self, cmd: &DetachStorageUnit) -> InventoryResult<Vec<StationEvent>> {
        let mut scratch = self.scratch()?;
        let unit = scratch.detach(&cmd.slot)?;
        Ok(vec![StationEvent::StorageUnitDetached(StorageUnitDetached {
            unit_id: unit.id_typed(),
            slot: cmd.slot.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_place(&self, cmd: &PlaceStorageUnit) -> InventoryResult<Vec<StationEvent>> {
        let mut scratch = self.scratch()?;
        scratch.place_off_rack(&cmd.unit_id, &cmd.slot)?;
        Ok(vec![StationEvent::StorageUnitPlaced(StorageUnitPlaced {
            unit_id: cmd.unit_id,
            slot: cmd.slot.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_seed(&self, cmd: &SeedCrop) -> InventoryResult<Vec<StationEvent>> {
        let mut scratch = self.scratch()?;
        if cmd.crop.seed_type.trim().is_empty() {
            return Err(InventoryError::validation("seed_type", "is required"));
        }
        if cmd.crop.seeded_date > cmd.occurred_at.date_naive() {
            return Err(InventoryError::validation(
                "seeded_date",
                "cannot be after the time the crop is recorded",
            ));
        }
        // Crop ids are kept unique per station so history lookups are unambiguous.
        if scratch.find_crop(&cmd.crop.id).is_some() {
            return Err(InventoryError::validation(
                "crop_id",
                format!("{} already exists in this station", cmd.crop.id),
            ));
        }
        unit_in(&mut scratch, &cmd.unit_id)?.seed(cmd.crop.clone())?;

        Ok(vec![StationEvent::CropSeeded(CropSeeded {
            unit_id: cmd.unit_id,
            crop: cmd.crop.clone(),
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateCrop) -> InventoryResult<Vec<StationEvent>> {
        let station = self.snapshot()?;
        let (unit, crop) = station
            .find_crop(&cmd.crop_id)
            .ok_or_else(|| InventoryError::not_found(format!("crop {}", cmd.crop_id)))?;

        let updated = Crop {
            age_days: cmd.age_days,
            health: cmd.health,
            size: cmd.size,
            planned_transition: cmd.planned_transition,
            ..crop.clone()
        };

        Ok(vec![StationEvent::CropUpdated(CropUpdated {
            unit_id: unit.id_typed(),
            crop: updated,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transplant(&self, cmd: &TransplantCrop) -> InventoryResult<Vec<StationEvent>> {
        let mut scratch = self.scratch()?;
        let (from_unit, crop) = scratch
            .find_crop(&cmd.crop_id)
            .map(|(unit, crop)| (unit.id_typed(), crop.clone()))
            .ok_or_else(|| InventoryError::not_found(format!("crop {}", cmd.crop_id)))?;

        if from_unit == cmd.to_unit && crop.position == cmd.to_position {
            return Err(InventoryError::validation(
                "to_position",
                "crop is already at that position",
            ));
        }

        // Transplanting fulfils a planned transplant.
        let planned_transition = crop
            .planned_transition
            .filter(|p| p.kind != TransitionKind::Transplant);
        let moved = Crop {
            position: cmd.to_position,
            planned_transition,
            ..crop
        };

        unit_in(&mut scratch, &from_unit)?.remove(&moved.id);
        unit_in(&mut scratch, &cmd.to_unit)?.seed(moved.clone())?;

        Ok(vec![StationEvent::CropTransplanted(CropTransplanted {
            from_unit,
            to_unit: cmd.to_unit,
            crop: moved,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveCrop) -> InventoryResult<Vec<StationEvent>> {
        let station = self.snapshot()?;
        let (unit, crop) = station
            .find_crop(&cmd.crop_id)
            .ok_or_else(|| InventoryError::not_found(format!("crop {}", cmd.crop_id)))?;

        Ok(vec![StationEvent::CropRemoved(CropRemoved {
            unit_id: unit.id_typed(),
            crop: crop.clone(),
            reason: cmd.reason,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn build_station(key: StationKey, specs: &[RackSpec]) -> InventoryResult<Station> {
    let racks = specs
        .iter()
        .map(|spec| Rack::new(spec.id.clone(), spec.name.trim(), spec.slot_count))
        .collect::<InventoryResult<Vec<_>>>()?;
    Station::new(key, racks)
}

fn unit_in<'a>(
    station: &'a mut Station,
    unit_id: &StorageUnitId,
) -> InventoryResult<&'a mut StorageUnit> {
    station
        .unit_mut(unit_id)
        .ok_or_else(|| InventoryError::not_found(format!("storage unit {unit_id}")))
}
