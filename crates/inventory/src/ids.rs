use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farmops_core::{impl_string_newtype, impl_uuid_newtype};

/// System-generated storage unit (tray/panel) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageUnitId(Uuid);

/// Crop identifier. Opaque, supplied by whoever seeds the crop.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropId(String);

/// Operator-assigned RFID tag physically attached to a tray or panel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RfidTag(String);

/// Shelf/wall identifier, unique within a station (e.g. `"upper"`, `"wall-2"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RackId(String);

impl_uuid_newtype!(StorageUnitId, "StorageUnitId");
impl_string_newtype!(CropId, "CropId");
impl_string_newtype!(RfidTag, "RfidTag");
impl_string_newtype!(RackId, "RackId");
