use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use farmops_core::{ContainerId, EventId, ExpectedVersion};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Build one from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serializes the payload and captures the metadata (event type, version, occurred_at)
/// needed to deserialize it again on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: EventId,
    pub container_id: ContainerId,
    pub stream_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are assigned by the store during append. They start at 1, are
/// scoped to one `(container_id, stream_type)` stream, and never change; the number of
/// the last event is the stream's version for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub container_id: ContainerId,
    pub stream_type: String,

    /// Monotonically increasing position in the stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an envelope for projections.
    pub fn to_envelope(&self) -> farmops_events::EventEnvelope<JsonValue> {
        farmops_events::EventEnvelope::new(
            self.event_id,
            self.container_id.clone(),
            self.stream_type.clone(),
            self.sequence_number,
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
///
/// Infrastructure failures (storage, concurrency, isolation) as opposed to domain
/// rejections.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("container isolation violation: {0}")]
    ContainerIsolation(String),

    #[error("stream type mismatch: {0}")]
    StreamTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, container-scoped event store.
///
/// Events live in streams keyed by `(container_id, stream_type)`; each station of a
/// container is one stream. Within a stream, sequence numbers run 1, 2, 3, ...
///
/// `append()` must:
/// - reject batches that mix containers or stream types
/// - check `expected_version` against the current stream version
/// - assign sequence numbers starting at `current_version + 1`
/// - persist the whole batch or nothing
///
/// `load_stream()` returns the stream in sequence order, or an empty vector when the
/// stream does not exist yet.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(container_id, stream_type)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    pub fn from_typed<E>(
        container_id: ContainerId,
        stream_type: impl Into<String>,
        event_id: EventId,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: farmops_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| {
                EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
            })?;

        Ok(Self {
            event_id,
            container_id,
            stream_type: stream_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
