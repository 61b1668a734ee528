use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use farmops_core::ContainerId;
use farmops_inventory::{CropHistoryEvent, CropId, CropTimeline, DateRange, InventoryError};

#[derive(Debug, Error)]
pub enum ReadModelError {
    #[error(transparent)]
    Rejected(#[from] InventoryError),

    #[error("read model unavailable: {0}")]
    Unavailable(String),
}

/// Container-isolated store of crop timelines (disposable, rebuildable read model).
pub trait CropHistoryStore: Send + Sync {
    /// Append one event to the crop's timeline; enforces per-crop ordering.
    fn record(
        &self,
        container_id: &ContainerId,
        event: CropHistoryEvent,
    ) -> Result<(), ReadModelError>;

    /// Events of one crop inside `range`, oldest first.
    fn query(
        &self,
        container_id: &ContainerId,
        crop_id: &CropId,
        range: DateRange,
    ) -> Result<Vec<CropHistoryEvent>, ReadModelError>;
}

impl<S> CropHistoryStore for Arc<S>
where
    S: CropHistoryStore + ?Sized,
{
    fn record(
        &self,
        container_id: &ContainerId,
        event: CropHistoryEvent,
    ) -> Result<(), ReadModelError> {
        (**self).record(container_id, event)
    }

    fn query(
        &self,
        container_id: &ContainerId,
        crop_id: &CropId,
        range: DateRange,
    ) -> Result<Vec<CropHistoryEvent>, ReadModelError> {
        (**self).query(container_id, crop_id, range)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCropHistoryStore {
    inner: RwLock<HashMap<ContainerId, CropTimeline>>,
}

impl InMemoryCropHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CropHistoryStore for InMemoryCropHistoryStore {
    fn record(
        &self,
        container_id: &ContainerId,
        event: CropHistoryEvent,
    ) -> Result<(), ReadModelError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| ReadModelError::Unavailable("lock poisoned".to_string()))?;
        let crop_id = event.crop_id.clone();
        map.entry(container_id.clone())
            .or_default()
            .record_event(&crop_id, event)?;
        Ok(())
    }

    fn query(
        &self,
        container_id: &ContainerId,
        crop_id: &CropId,
        range: DateRange,
    ) -> Result<Vec<CropHistoryEvent>, ReadModelError> {
        let map = self
            .inner
            .read()
            .map_err(|_| ReadModelError::Unavailable("lock poisoned".to_string()))?;
        Ok(map
            .get(container_id)
            .map(|timeline| timeline.query(crop_id, range).iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use farmops_inventory::{Crop, CropEventKind, CropPosition, StorageUnitId};

    use super::*;

    fn event(crop: &str, day: u32) -> CropHistoryEvent {
        let crop = Crop::seedling(
            CropId::parse(crop).unwrap(),
            CropPosition::Tray { row: 1, column: 1 },
            "lettuce",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        CropHistoryEvent::capture(
            CropEventKind::GrowthUpdate,
            &crop,
            StorageUnitId::new(),
            Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            None,
        )
    }

    #[test]
    fn timelines_are_isolated_per_container() {
        let store = InMemoryCropHistoryStore::new();
        let farm_1 = ContainerId::parse("farm-1").unwrap();
        let farm_2 = ContainerId::parse("farm-2").unwrap();
        let crop = CropId::parse("crop-1").unwrap();

        store.record(&farm_1, event("crop-1", 2)).unwrap();
        store.record(&farm_1, event("crop-1", 4)).unwrap();

        assert_eq!(store.query(&farm_1, &crop, DateRange::all()).unwrap().len(), 2);
        assert!(store.query(&farm_2, &crop, DateRange::all()).unwrap().is_empty());
    }

    #[test]
    fn out_of_order_records_are_rejected() {
        let store = InMemoryCropHistoryStore::new();
        let farm = ContainerId::parse("farm-1").unwrap();
        store.record(&farm, event("crop-1", 5)).unwrap();

        let err = store.record(&farm, event("crop-1", 3)).unwrap_err();
        assert!(matches!(err, ReadModelError::Rejected(InventoryError::InvalidOrder { .. })));
    }
}
