use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmops_core::{ContainerId, EventId};

/// Envelope for a committed event, carrying container + stream metadata.
///
/// - Streams are scoped by `container_id` and `stream_type`
///   (e.g. `"inventory.nursery"`).
/// - `sequence_number` is monotonically increasing per stream, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: EventId,
    container_id: ContainerId,
    stream_type: String,

    /// Monotonically increasing position in the stream.
    sequence_number: u64,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: EventId,
        container_id: ContainerId,
        stream_type: impl Into<String>,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            container_id,
            stream_type: stream_type.into(),
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn container_id(&self) -> &ContainerId {
        &self.container_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
