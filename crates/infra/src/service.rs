//! Inventory service: the operations the rest of the platform calls.
//!
//! Every write goes through the [`CommandDispatcher`] against the station's stream and
//! is then folded into the crop history projection. Every read rehydrates the station
//! from its stream (optionally as of a past date) and returns an immutable report.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmops_core::ContainerId;
use farmops_inventory::{
    CommissionStation, Crop, CropHistoryEvent, CropId, CropPosition, CropSize, DateRange,
    DetachStorageUnit, HealthStatus, InventoryError, PlaceStorageUnit, PlannedTransition,
    ProvisionStorageUnit, ProvisioningPolicy, ProvisioningRequest, ProvisioningResult, RackSpec,
    RemovalReason, RemoveCrop, SeedCrop, SlotAddress, StationAggregate, StationCommand,
    StationEvent, StationKey, StationKind, StationReport, StorageUnit, StorageUnitId,
    TransplantCrop, UnitTemplates, UpdateCrop,
};

use crate::clock::Clock;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::FarmopsConfig;
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{CropHistoryProjection, CropHistoryProjectionError};
use crate::read_model::{CropHistoryStore, InMemoryCropHistoryStore, ReadModelError};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The domain refused the operation; the message is safe to show to operators.
    #[error(transparent)]
    Rejected(#[from] InventoryError),

    /// Lost every append race within the retry budget.
    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    /// Storage, serialization or isolation failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Rejected(err) => ServiceError::Rejected(err),
            DispatchError::Concurrency(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<ReadModelError> for ServiceError {
    fn from(value: ReadModelError) -> Self {
        match value {
            ReadModelError::Rejected(err) => ServiceError::Rejected(err),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<CropHistoryProjectionError> for ServiceError {
    fn from(value: CropHistoryProjectionError) -> Self {
        match value {
            CropHistoryProjectionError::Store(err) => err.into(),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Rejected(err) => err.code(),
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

/// A growth/health observation for one crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropObservation {
    pub age_days: u32,
    pub health: HealthStatus,
    pub size: CropSize,
    #[serde(default)]
    pub planned_transition: Option<PlannedTransition>,
}

pub type InMemoryInventoryService =
    InventoryService<Arc<InMemoryEventStore>, Arc<InMemoryCropHistoryStore>>;

pub struct InventoryService<S, H>
where
    S: EventStore,
    H: CropHistoryStore,
{
    dispatcher: CommandDispatcher<S>,
    history: CropHistoryProjection<H>,
    clock: Arc<dyn Clock>,
    policy: ProvisioningPolicy,
    templates: UnitTemplates,
    /// Serializes the writes that claim a crop timeline across both stations.
    timeline_writes: Mutex<()>,
}

impl InMemoryInventoryService {
    /// Single-process service wired from configuration.
    pub fn in_memory(config: &FarmopsConfig, clock: Arc<dyn Clock>) -> Self {
        InventoryService::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryCropHistoryStore::new()),
            clock,
        )
        .with_rules(config.policy(), config.templates())
        .with_conflict_retries(config.provisioning.max_conflict_retries)
    }
}

impl<S, H> InventoryService<S, H>
where
    S: EventStore,
    H: CropHistoryStore,
{
    pub fn new(store: S, history: H, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            history: CropHistoryProjection::new(history),
            clock,
            policy: ProvisioningPolicy::default(),
            templates: UnitTemplates::default(),
            timeline_writes: Mutex::new(()),
        }
    }

    pub fn with_rules(mut self, policy: ProvisioningPolicy, templates: UnitTemplates) -> Self {
        self.policy = policy;
        self.templates = templates;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.dispatcher = self.dispatcher.with_conflict_retries(retries);
        self
    }

    pub fn store(&self) -> &S {
        self.dispatcher.store()
    }

    /// Create a station with its empty shelves/walls.
    pub fn commission_station(
        &self,
        key: &StationKey,
        racks: Vec<RackSpec>,
    ) -> Result<StationReport, ServiceError> {
        let command = StationCommand::CommissionStation(CommissionStation {
            racks,
            occurred_at: self.clock.now(),
        });
        self.execute(key, &command)?;
        self.station_snapshot(key, None)
    }

    /// Annotated utilization report of a station, as of the end of `as_of` if given.
    pub fn station_snapshot(
        &self,
        key: &StationKey,
        as_of: Option<NaiveDate>,
    ) -> Result<StationReport, ServiceError> {
        let today = as_of.unwrap_or_else(|| self.clock.now().date_naive());
        let aggregate = self.load(key, as_of)?;
        let station = aggregate.snapshot().inspect_err(|err| {
            if matches!(err, InventoryError::MalformedSnapshot(_)) {
                tracing::error!(station = %key, error = %err, "station stream failed to replay");
            }
        })?;
        Ok(StationReport::build(station, today)?)
    }

    /// Provision a new RFID-tagged tray/panel into an empty slot.
    pub fn provision_storage_unit(
        &self,
        key: &StationKey,
        slot: SlotAddress,
        rfid_tag: impl Into<String>,
        notes: Option<String>,
    ) -> Result<ProvisioningResult, ServiceError> {
        let created_at = self.clock.now();
        let command = StationCommand::ProvisionStorageUnit(ProvisionStorageUnit {
            unit_id: StorageUnitId::new(),
            request: ProvisioningRequest::new(slot, rfid_tag, notes),
            occurred_at: created_at,
        });

        for event in self.execute(key, &command)? {
            if let StationEvent::StorageUnitProvisioned(e) = event {
                tracing::info!(
                    station = %key,
                    unit_id = %e.unit.id_typed(),
                    rfid_tag = %e.unit.rfid_tag(),
                    location = %e.location,
                    "storage unit provisioned"
                );
                return Ok(ProvisioningResult {
                    unit: e.unit,
                    slot: e.slot,
                    location: e.location,
                    created_at,
                });
            }
        }
        Err(unexpected_outcome("provision_storage_unit"))
    }

    /// Move the unit in `slot` off-rack, crops intact.
    ///
    /// An empty slot fails with `SlotEmpty` and changes nothing.
    pub fn detach_storage_unit(
        &self,
        key: &StationKey,
        slot: SlotAddress,
    ) -> Result<StorageUnit, ServiceError> {
        let command = StationCommand::DetachStorageUnit(DetachStorageUnit {
            slot,
            occurred_at: self.clock.now(),
        });

        let unit_id = self
            .execute(key, &command)?
            .into_iter()
            .find_map(|event| match event {
                StationEvent::StorageUnitDetached(e) => Some(e.unit_id),
                _ => None,
            })
            .ok_or_else(|| unexpected_outcome("detach_storage_unit"))?;

        let aggregate = self.load(key, None)?;
        aggregate
            .snapshot()?
            .unit(&unit_id)
            .cloned()
            .ok_or_else(|| unexpected_outcome("detach_storage_unit"))
    }

    /// Put an off-rack unit back into an empty slot.
    pub fn place_storage_unit(
        &self,
        key: &StationKey,
        unit_id: StorageUnitId,
        slot: SlotAddress,
    ) -> Result<StorageUnit, ServiceError> {
        let command = StationCommand::PlaceStorageUnit(PlaceStorageUnit {
            unit_id,
            slot,
            occurred_at: self.clock.now(),
        });
        self.execute(key, &command)?;

        let aggregate = self.load(key, None)?;
        aggregate
            .snapshot()?
            .unit(&unit_id)
            .cloned()
            .ok_or_else(|| unexpected_outcome("place_storage_unit"))
    }

    /// Seed a crop into a unit.
    ///
    /// A crop id names one crop per container: an id that already has a timeline, in
    /// either station, is refused.
    pub fn seed_crop(
        &self,
        key: &StationKey,
        unit_id: StorageUnitId,
        crop: Crop,
        note: Option<String>,
    ) -> Result<Crop, ServiceError> {
        let _guard = self.lock_timelines()?;
        self.sync_container_history(&key.container_id)?;
        if !self
            .history
            .history(&key.container_id, &crop.id, DateRange::all())?
            .is_empty()
        {
            return Err(InventoryError::validation(
                "crop_id",
                format!("{} already names a crop in container {}", crop.id, key.container_id),
            )
            .into());
        }

        let command = StationCommand::SeedCrop(SeedCrop {
            unit_id,
            crop,
            note,
            occurred_at: self.clock.now(),
        });
        self.crop_outcome(key, &command)
    }

    pub fn update_crop(
        &self,
        key: &StationKey,
        crop_id: CropId,
        observation: CropObservation,
        note: Option<String>,
    ) -> Result<Crop, ServiceError> {
        let command = StationCommand::UpdateCrop(UpdateCrop {
            crop_id,
            age_days: observation.age_days,
            health: observation.health,
            size: observation.size,
            planned_transition: observation.planned_transition,
            note,
            occurred_at: self.clock.now(),
        });
        self.crop_outcome(key, &command)
    }

    pub fn transplant_crop(
        &self,
        key: &StationKey,
        crop_id: CropId,
        to_unit: StorageUnitId,
        to_position: CropPosition,
        note: Option<String>,
    ) -> Result<Crop, ServiceError> {
        let command = StationCommand::TransplantCrop(TransplantCrop {
            crop_id,
            to_unit,
            to_position,
            note,
            occurred_at: self.clock.now(),
        });
        self.crop_outcome(key, &command)
    }

    /// Harvest or dispose of a crop; returns its last state.
    pub fn remove_crop(
        &self,
        key: &StationKey,
        crop_id: CropId,
        reason: RemovalReason,
        note: Option<String>,
    ) -> Result<Crop, ServiceError> {
        let command = StationCommand::RemoveCrop(RemoveCrop {
            crop_id,
            reason,
            note,
            occurred_at: self.clock.now(),
        });
        self.crop_outcome(key, &command)
    }

    /// Timeline of one crop inside `range` (inclusive), oldest first.
    pub fn query_crop_history(
        &self,
        container_id: &ContainerId,
        crop_id: &CropId,
        range: DateRange,
    ) -> Result<Vec<CropHistoryEvent>, ServiceError> {
        self.sync_container_history(container_id)?;
        Ok(self.history.history(container_id, crop_id, range)?)
    }

    /// Append an externally sourced event to a crop's timeline.
    ///
    /// The event may not be dated after the current time, nor before the crop's last
    /// recorded event.
    pub fn record_crop_event(
        &self,
        container_id: &ContainerId,
        event: CropHistoryEvent,
    ) -> Result<(), ServiceError> {
        let crop_id = event.crop_id.clone();
        self.append_crop_event(container_id, event)
            .inspect_err(|err| {
                tracing::warn!(
                    container_id = %container_id,
                    crop_id = %crop_id,
                    error = %err,
                    "crop event rejected"
                );
            })?;
        tracing::info!(container_id = %container_id, crop_id = %crop_id, "crop event recorded");
        Ok(())
    }

    fn append_crop_event(
        &self,
        container_id: &ContainerId,
        event: CropHistoryEvent,
    ) -> Result<(), ServiceError> {
        let now = self.clock.now();
        if event.occurred_at > now {
            return Err(InventoryError::validation(
                "occurred_at",
                format!("{} is later than the current time {now}", event.occurred_at),
            )
            .into());
        }

        let _guard = self.lock_timelines()?;
        // Committed station events go first so they are never ordered behind this one.
        self.sync_container_history(container_id)?;
        Ok(self.history.store().record(container_id, event)?)
    }

    fn lock_timelines(&self) -> Result<MutexGuard<'_, ()>, ServiceError> {
        self.timeline_writes
            .lock()
            .map_err(|_| ServiceError::Internal("timeline lock poisoned".to_string()))
    }

    fn make_aggregate(&self, key: &StationKey) -> impl Fn() -> StationAggregate {
        let (key, policy, templates) = (key.clone(), self.policy, self.templates);
        move || StationAggregate::empty(key.clone()).with_rules(policy, templates)
    }

    fn load(
        &self,
        key: &StationKey,
        as_of: Option<NaiveDate>,
    ) -> Result<StationAggregate, ServiceError> {
        Ok(self.dispatcher.load(
            &key.container_id,
            key.kind.stream_type(),
            as_of,
            self.make_aggregate(key),
        )?)
    }

    fn execute(
        &self,
        key: &StationKey,
        command: &StationCommand,
    ) -> Result<Vec<StationEvent>, ServiceError> {
        let stream_type = key.kind.stream_type();
        let committed = self
            .dispatcher
            .dispatch(&key.container_id, stream_type, command, self.make_aggregate(key))
            .map_err(ServiceError::from)
            .inspect_err(|err| match err {
                ServiceError::Rejected(InventoryError::SlotEmpty(slot)) => {
                    tracing::info!(
                        station = %key,
                        slot = %slot,
                        "detach of an empty slot, nothing to do"
                    );
                }
                _ => {
                    tracing::warn!(
                        station = %key,
                        command = command.name(),
                        error = %err,
                        code = err.code(),
                        "command rejected"
                    );
                }
            })?;

        tracing::info!(
            station = %key,
            command = command.name(),
            events = committed.len(),
            "command accepted"
        );

        if let Err(err) = self.sync_history(&key.container_id, stream_type) {
            tracing::error!(station = %key, error = %err, "crop history projection lagging");
        }

        decode(&committed)
    }

    fn sync_container_history(&self, container_id: &ContainerId) -> Result<(), ServiceError> {
        for kind in [StationKind::Nursery, StationKind::Cultivation] {
            self.sync_history(container_id, kind.stream_type())?;
        }
        Ok(())
    }

    /// Fold any committed-but-unprojected events of one stream into the crop history.
    fn sync_history(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
    ) -> Result<(), ServiceError> {
        let stream = self
            .dispatcher
            .store()
            .load_stream(container_id, stream_type)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        for stored in &stream {
            self.history.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }

    fn crop_outcome(
        &self,
        key: &StationKey,
        command: &StationCommand,
    ) -> Result<Crop, ServiceError> {
        self.execute(key, command)?
            .into_iter()
            .find_map(|event| match event {
                StationEvent::CropSeeded(e) => Some(e.crop),
                StationEvent::CropUpdated(e) => Some(e.crop),
                StationEvent::CropTransplanted(e) => Some(e.crop),
                StationEvent::CropRemoved(e) => Some(e.crop),
                _ => None,
            })
            .ok_or_else(|| unexpected_outcome(command.name()))
    }
}

fn decode(committed: &[StoredEvent]) -> Result<Vec<StationEvent>, ServiceError> {
    committed
        .iter()
        .map(|stored| {
            serde_json::from_value(stored.payload.clone())
                .map_err(|e| ServiceError::Internal(format!("undecodable committed event: {e}")))
        })
        .collect()
}

fn unexpected_outcome(operation: &str) -> ServiceError {
    ServiceError::Internal(format!("{operation} committed without its expected event"))
}
