//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the station stream (container-scoped)
//!   ↓
//! 2. Rehydrate the aggregate (apply historical events)
//!   ↓
//! 3. Handle the command (pure decision logic, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. On a concurrency conflict: reload, re-decide, retry (bounded)
//! ```
//!
//! Step 5 is what keeps the slot occupancy invariant under concurrent writers: the
//! loser of an append race re-runs validation against the winner's state, so a second
//! provisioning into the same slot is rejected with `SlotOccupied` rather than binding.
//!
//! This module contains no IO itself; it composes the `EventStore` trait.

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use farmops_core::{Aggregate, ContainerId, DomainError, EventId, ExpectedVersion};
use farmops_inventory::InventoryError;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Conflict retries when none are configured.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure that outlived the retry budget.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// Loaded stream contained events from another container or stream.
    #[error("container isolation violation: {0}")]
    ContainerIsolation(String),
    /// The aggregate rejected the command (deterministic).
    #[error(transparent)]
    Rejected(InventoryError),
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    /// The event store failed.
    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::ContainerIsolation(msg) => DispatchError::ContainerIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<InventoryError> for DispatchError {
    fn from(value: InventoryError) -> Self {
        DispatchError::Rejected(value)
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Rejected(InventoryError::Domain(value))
    }
}

/// Reusable command execution engine for event-sourced station streams.
///
/// Generic over the store so tests run against `InMemoryEventStore` and a durable
/// backend can be swapped in without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
    max_conflict_retries: u32,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Rehydrate an aggregate from its stream.
    ///
    /// With `as_of`, only events that occurred on or before that date are applied,
    /// reconstructing the state as it stood at the end of that day.
    pub fn load<A>(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
        as_of: Option<NaiveDate>,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(container_id, stream_type)?;
        validate_loaded_stream(container_id, stream_type, &history)?;

        let visible = match as_of {
            Some(day) => {
                let cut = history.partition_point(|e| e.occurred_at.date_naive() <= day);
                &history[..cut]
            }
            None => &history[..],
        };

        let mut aggregate = make_aggregate();
        apply_history(&mut aggregate, visible)?;
        Ok(aggregate)
    }

    /// Dispatch a command, retrying on optimistic concurrency conflicts.
    ///
    /// Returns the committed events. Domain rejections are returned immediately; only
    /// append conflicts are retried, each retry deciding against freshly loaded state.
    pub fn dispatch<A>(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
        command: &A::Command,
        make_aggregate: impl Fn() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate,
        A::Error: Into<DispatchError>,
        A::Event: farmops_events::Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.dispatch_once(container_id, stream_type, command, &make_aggregate) {
                Err(DispatchError::Concurrency(msg)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(
                        container_id = %container_id,
                        stream_type,
                        attempt,
                        reason = %msg,
                        "append conflict, re-validating against fresh state"
                    );
                }
                other => return other,
            }
        }
    }

    fn dispatch_once<A>(
        &self,
        container_id: &ContainerId,
        stream_type: &str,
        command: &A::Command,
        make_aggregate: &impl Fn() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate,
        A::Error: Into<DispatchError>,
        A::Event: farmops_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(container_id, stream_type)?;
        validate_loaded_stream(container_id, stream_type, &history)?;
        let expected = match history.last() {
            Some(last) => ExpectedVersion::Exact(last.sequence_number),
            None => ExpectedVersion::NoStream,
        };

        // 2) Rehydrate
        let mut aggregate = make_aggregate();
        apply_history(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(command).map_err(Into::into)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(container_id.clone(), stream_type, EventId::new(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.store.append(uncommitted, expected)?)
    }
}

fn validate_loaded_stream(
    container_id: &ContainerId,
    stream_type: &str,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if &e.container_id != container_id || e.stream_type != stream_type {
            return Err(DispatchError::ContainerIsolation(format!(
                "loaded stream contains a foreign event at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DispatchError::Deserialize(format!(
                "{} #{}: {e}",
                stored.event_type, stored.sequence_number
            ))
        })?;
        aggregate.apply(&ev);
    }
    Ok(())
}
