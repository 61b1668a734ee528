use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use farmops_core::ContainerId;
use farmops_events::EventEnvelope;
use farmops_inventory::{CropHistoryEvent, CropId, DateRange, StationEvent};

use crate::read_model::{CropHistoryStore, ReadModelError};

/// Container + stream cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    container_id: ContainerId,
    stream_type: String,
}

#[derive(Debug, Error)]
pub enum CropHistoryProjectionError {
    #[error("failed to deserialize station event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error(transparent)]
    Store(#[from] ReadModelError),
}

/// Crop history projection.
///
/// Consumes committed station envelopes and appends the implied crop events to the
/// per-container timelines. Envelopes at or below the stream cursor are ignored, so
/// replaying a whole stream after every write is safe.
#[derive(Debug)]
pub struct CropHistoryProjection<S>
where
    S: CropHistoryStore,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> CropHistoryProjection<S>
where
    S: CropHistoryStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Query one crop's timeline inside `range`, oldest first.
    pub fn history(
        &self,
        container_id: &ContainerId,
        crop_id: &CropId,
        range: DateRange,
    ) -> Result<Vec<CropHistoryEvent>, CropHistoryProjectionError> {
        Ok(self.store.query(container_id, crop_id, range)?)
    }

    /// Apply a committed envelope into the projection.
    ///
    /// - Enforces monotonic sequence per (container, stream)
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    /// - A timeline rejection is returned and the cursor stays put, so the entry is
    ///   retried on the next sync instead of being lost
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CropHistoryProjectionError> {
        let seq = envelope.sequence_number();
        let key = CursorKey {
            container_id: envelope.container_id().clone(),
            stream_type: envelope.stream_type().to_string(),
        };

        let mut cursors = self
            .cursors
            .write()
            .map_err(|_| ReadModelError::Unavailable("cursor lock poisoned".to_string()))?;
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(CropHistoryProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: StationEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CropHistoryProjectionError::Deserialize(e.to_string()))?;

        if let Some(entry) = event.crop_history() {
            self.store
                .record(&key.container_id, entry)
                .inspect_err(|err| {
                    tracing::error!(
                        container_id = %key.container_id,
                        stream_type = %key.stream_type,
                        sequence_number = seq,
                        error = %err,
                        "crop history entry rejected"
                    );
                })?;
        }

        cursors.insert(key, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use farmops_core::EventId;
    use farmops_inventory::{
        Crop, CropEventKind, CropPosition, CropRemoved, CropSeeded, InventoryError, RemovalReason,
        StorageUnitId,
    };

    use super::*;
    use crate::read_model::InMemoryCropHistoryStore;

    fn farm() -> ContainerId {
        ContainerId::parse("farm-1").unwrap()
    }

    fn crop() -> Crop {
        Crop::seedling(
            CropId::parse("crop-1").unwrap(),
            CropPosition::Tray { row: 1, column: 2 },
            "arugula",
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap().date_naive(),
        )
    }

    fn envelope(seq: u64, event: StationEvent) -> EventEnvelope<JsonValue> {
        use farmops_events::Event;
        EventEnvelope::new(
            EventId::new(),
            farm(),
            "inventory.nursery",
            seq,
            event.occurred_at(),
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn seeded(day: u32) -> StationEvent {
        StationEvent::CropSeeded(CropSeeded {
            unit_id: StorageUnitId::new(),
            crop: crop(),
            note: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap(),
        })
    }

    fn removed(day: u32) -> StationEvent {
        StationEvent::CropRemoved(CropRemoved {
            unit_id: StorageUnitId::new(),
            crop: crop(),
            reason: RemovalReason::Disposed,
            note: Some("mold".into()),
            occurred_at: Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap(),
        })
    }

    #[test]
    fn crop_events_land_in_the_timeline_once() {
        let projection = CropHistoryProjection::new(InMemoryCropHistoryStore::new());
        let first = envelope(1, seeded(1));
        projection.apply_envelope(&first).unwrap();
        projection.apply_envelope(&first).unwrap();
        projection.apply_envelope(&envelope(2, removed(3))).unwrap();

        let history = projection
            .history(&farm(), &CropId::parse("crop-1").unwrap(), DateRange::all())
            .unwrap();
        let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![CropEventKind::Seeded, CropEventKind::Disposed]);
        assert_eq!(history[1].note.as_deref(), Some("mold"));
    }

    #[test]
    fn gaps_in_the_stream_are_rejected() {
        let projection = CropHistoryProjection::new(InMemoryCropHistoryStore::new());
        projection.apply_envelope(&envelope(1, seeded(1))).unwrap();
        let err = projection.apply_envelope(&envelope(3, removed(3))).unwrap_err();
        assert!(matches!(
            err,
            CropHistoryProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));
    }

    #[test]
    fn out_of_order_entry_is_surfaced_and_not_consumed() {
        let projection = CropHistoryProjection::new(InMemoryCropHistoryStore::new());
        projection.apply_envelope(&envelope(1, seeded(5))).unwrap();

        let late = envelope(2, removed(2));
        for _ in 0..2 {
            let err = projection.apply_envelope(&late).unwrap_err();
            assert!(matches!(
                err,
                CropHistoryProjectionError::Store(ReadModelError::Rejected(
                    InventoryError::InvalidOrder { .. }
                ))
            ));
        }

        // The cursor did not move past the rejected entry.
        let err = projection.apply_envelope(&envelope(3, removed(6))).unwrap_err();
        assert!(matches!(
            err,
            CropHistoryProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));

        let history = projection
            .history(&farm(), &CropId::parse("crop-1").unwrap(), DateRange::all())
            .unwrap();
        assert_eq!(history.len(), 1);
    }
}
