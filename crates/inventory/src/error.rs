//! Inventory error taxonomy.

use chrono::{DateTime, Utc};
use thiserror::Error;

use farmops_core::DomainError;

use crate::ids::{CropId, RfidTag};
use crate::rack::SlotAddress;

/// Result type used across the inventory model.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Inventory-level error.
///
/// Every variant carries the context (field, slot address, tag) needed to render a
/// specific message to the operator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Malformed or missing input. The caller corrects and retries.
    #[error("{field} {message}")]
    Validation { field: &'static str, message: String },

    /// The requested slot was taken when the request was validated.
    #[error("slot {0} is occupied")]
    SlotOccupied(SlotAddress),

    /// A bind targeted a slot that already holds a storage unit.
    #[error("slot {0} already holds a storage unit")]
    AlreadyOccupied(SlotAddress),

    /// Detach targeted a slot with nothing bound.
    #[error("slot {0} is empty")]
    SlotEmpty(SlotAddress),

    /// The RFID tag is already attached to another unit of the station.
    #[error("rfid tag {0} is already in use in this station")]
    DuplicateRfid(RfidTag),

    /// A history event was dated before the last recorded event for the crop.
    #[error("event for crop {crop_id} at {attempted} precedes last recorded event at {last}")]
    InvalidOrder {
        crop_id: CropId,
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// A station snapshot violated a structural invariant; nothing was computed.
    #[error("malformed station snapshot: {0}")]
    MalformedSnapshot(String),

    /// A referenced station, rack, slot, unit or crop does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InventoryError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSnapshot(msg.into())
    }

    /// Stable machine-readable code (used by API error bodies and logs).
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Validation { .. } => "validation_error",
            InventoryError::SlotOccupied(_) => "slot_occupied",
            InventoryError::AlreadyOccupied(_) => "already_occupied",
            InventoryError::SlotEmpty(_) => "slot_empty",
            InventoryError::DuplicateRfid(_) => "duplicate_rfid",
            InventoryError::InvalidOrder { .. } => "invalid_order",
            InventoryError::MalformedSnapshot(_) => "malformed_snapshot",
            InventoryError::NotFound(_) => "not_found",
            InventoryError::Domain(DomainError::Conflict(_)) => "conflict",
            InventoryError::Domain(DomainError::NotFound(_)) => "not_found",
            InventoryError::Domain(DomainError::InvalidId(_)) => "invalid_id",
            InventoryError::Domain(DomainError::Validation(_)) => "validation_error",
            InventoryError::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
        }
    }
}
