//! Crop history: an append-only, per-crop timeline of state transitions.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::crop::{Crop, CropPosition, CropSize, HealthStatus};
use crate::error::{InventoryError, InventoryResult};
use crate::ids::{CropId, StorageUnitId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropEventKind {
    Seeded,
    GrowthUpdate,
    Transplanted,
    Harvested,
    Disposed,
}

/// Location frozen at the time of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropLocation {
    pub unit_id: StorageUnitId,
    pub position: CropPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropHistoryEvent {
    pub crop_id: CropId,
    pub kind: CropEventKind,
    pub occurred_at: DateTime<Utc>,
    pub location: CropLocation,
    pub health: HealthStatus,
    pub size: CropSize,
    pub note: Option<String>,
}

impl CropHistoryEvent {
    /// Freeze `crop` as it sits in `unit_id` right now.
    pub fn capture(
        kind: CropEventKind,
        crop: &Crop,
        unit_id: StorageUnitId,
        occurred_at: DateTime<Utc>,
        note: Option<String>,
    ) -> Self {
        Self {
            crop_id: crop.id.clone(),
            kind,
            occurred_at,
            location: CropLocation {
                unit_id,
                position: crop.position,
            },
            health: crop.health,
            size: crop.size,
            note,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }
}

/// Inclusive date window; a missing bound is open.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// Append-only timelines keyed by crop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CropTimeline {
    events: HashMap<CropId, Vec<CropHistoryEvent>>,
}

impl CropTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event; it may share a timestamp with the last one but never precede it.
    pub fn record_event(
        &mut self,
        crop_id: &CropId,
        event: CropHistoryEvent,
    ) -> InventoryResult<()> {
        if &event.crop_id != crop_id {
            return Err(InventoryError::validation(
                "crop_id",
                format!("event is for {} but was recorded under {crop_id}", event.crop_id),
            ));
        }

        let entries = self.events.entry(crop_id.clone()).or_default();
        if let Some(last) = entries.last() {
            if event.occurred_at < last.occurred_at {
                return Err(InventoryError::InvalidOrder {
                    crop_id: crop_id.clone(),
                    last: last.occurred_at,
                    attempted: event.occurred_at,
                });
            }
        }
        entries.push(event);
        Ok(())
    }

    /// Events for `crop_id` within `range`, oldest first.
    pub fn query(&self, crop_id: &CropId, range: DateRange) -> TimelineQuery<'_> {
        TimelineQuery {
            events: self.events.get(crop_id).map(Vec::as_slice).unwrap_or(&[]),
            range,
        }
    }
}

/// A lazy view over one crop's timeline. Cheap to copy; every `iter()` restarts.
#[derive(Debug, Clone, Copy)]
pub struct TimelineQuery<'a> {
    events: &'a [CropHistoryEvent],
    range: DateRange,
}

impl<'a> TimelineQuery<'a> {
    pub fn iter(&self) -> TimelineIter<'a> {
        // Events are date-ordered, so the start bound is a binary search and the end
        // bound stops iteration early.
        let from = match self.range.start {
            Some(start) => self.events.partition_point(|e| e.date() < start),
            None => 0,
        };
        TimelineIter {
            inner: self.events[from..].iter(),
            end: self.range.end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for TimelineQuery<'a> {
    type Item = &'a CropHistoryEvent;
    type IntoIter = TimelineIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct TimelineIter<'a> {
    inner: std::slice::Iter<'a, CropHistoryEvent>,
    end: Option<NaiveDate>,
}

impl<'a> Iterator for TimelineIter<'a> {
    type Item = &'a CropHistoryEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.inner.next()?;
        match self.end {
            Some(end) if event.date() > end => {
                self.inner = Default::default();
                None
            }
            _ => Some(event),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.inner.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn crop_id() -> CropId {
        CropId::parse("crop-9").unwrap()
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 9, 0, 0).unwrap()
    }

    fn event(kind: CropEventKind, day: u32) -> CropHistoryEvent {
        CropHistoryEvent {
            crop_id: crop_id(),
            kind,
            occurred_at: at(day),
            location: CropLocation {
                unit_id: StorageUnitId::new(),
                position: CropPosition::Tray { row: 1, column: 1 },
            },
            health: HealthStatus::Healthy,
            size: CropSize::Small,
            note: None,
        }
    }

    fn timeline() -> CropTimeline {
        let mut t = CropTimeline::new();
        t.record_event(&crop_id(), event(CropEventKind::Seeded, 1)).unwrap();
        t.record_event(&crop_id(), event(CropEventKind::GrowthUpdate, 5)).unwrap();
        t.record_event(&crop_id(), event(CropEventKind::Transplanted, 10)).unwrap();
        t.record_event(&crop_id(), event(CropEventKind::Harvested, 20)).unwrap();
        t
    }

    #[test]
    fn out_of_order_event_is_rejected() {
        let mut t = timeline();
        let err = t
            .record_event(&crop_id(), event(CropEventKind::GrowthUpdate, 15))
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOrder { .. }));
        assert_eq!(t.query(&crop_id(), DateRange::all()).iter().count(), 4);
    }

    #[test]
    fn same_timestamp_is_accepted() {
        let mut t = timeline();
        t.record_event(&crop_id(), event(CropEventKind::GrowthUpdate, 20)).unwrap();
    }

    #[test]
    fn mismatched_crop_id_is_rejected() {
        let mut t = CropTimeline::new();
        let other = CropId::parse("other").unwrap();
        assert!(matches!(
            t.record_event(&other, event(CropEventKind::Seeded, 1)),
            Err(InventoryError::Validation { field: "crop_id", .. })
        ));
    }

    #[test]
    fn range_is_inclusive() {
        let t = timeline();
        let range = DateRange::new(at(5).date_naive().into(), at(10).date_naive().into());
        let kinds: Vec<_> = t.query(&crop_id(), range).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![CropEventKind::GrowthUpdate, CropEventKind::Transplanted]);
    }

    #[test]
    fn open_bounds_return_everything() {
        let t = timeline();
        assert_eq!(t.query(&crop_id(), DateRange::all()).iter().count(), 4);
        let from_six = DateRange::new(Some(at(6).date_naive()), None);
        assert_eq!(t.query(&crop_id(), from_six).iter().count(), 2);
        let until_six = DateRange::new(None, Some(at(6).date_naive()));
        assert_eq!(t.query(&crop_id(), until_six).iter().count(), 2);
    }

    #[test]
    fn query_is_restartable() {
        let t = timeline();
        let q = t.query(&crop_id(), DateRange::all());
        let first: Vec<_> = q.iter().collect();
        let second: Vec<_> = q.into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_crop_has_empty_history() {
        let t = timeline();
        assert!(t.query(&CropId::parse("nope").unwrap(), DateRange::all()).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: whatever order days are offered in, the accepted events come back
        /// in non-decreasing date order and every rejection was a backdated event.
        #[test]
        fn accepted_events_are_ordered(days in prop::collection::vec(1u32..28, 1..30)) {
            let mut t = CropTimeline::new();
            let mut last: Option<u32> = None;
            for day in days {
                let result = t.record_event(&crop_id(), event(CropEventKind::GrowthUpdate, day));
                match last {
                    Some(prev) if day < prev => prop_assert!(result.is_err()),
                    _ => {
                        prop_assert!(result.is_ok());
                        last = Some(day);
                    }
                }
            }

            let dates: Vec<_> = t
                .query(&crop_id(), DateRange::all())
                .iter()
                .map(|e| e.occurred_at)
                .collect();
            prop_assert!(dates.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
