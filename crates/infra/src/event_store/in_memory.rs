use std::collections::HashMap;
use std::sync::RwLock;

use farmops_core::{ContainerId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    container_id: ContainerId,
    stream_type: String,
}

/// In-memory append-only event store.
///
/// Appends to one stream are serialized by the write lock, so the version check and
/// the push happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        // All events must target the same container stream.
        let key = StreamKey {
            container_id: first.container_id.clone(),
            stream_type: first.stream_type.clone(),
        };

        for (idx, e) in events.iter().enumerate() {
            if e.container_id != key.container_id {
                return Err(EventStoreError::ContainerIsolation(format!(
                    "batch contains multiple container_ids (index {idx})"
                )));
            }
            if e.stream_type != key.stream_type {
                return Err(EventStoreError::StreamTypeMismatch(format!(
                    "batch contains multiple stream types (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                container_id: e.container_id,
                stream_type: e.stream_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            committed.push(stored);
        }
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            container_id: container_id.clone(),
            stream_type: stream_type.to_string(),
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}
