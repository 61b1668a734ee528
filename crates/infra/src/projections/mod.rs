//! Projection implementations (read model builders).
//!
//! Projections consume committed station events and build query-optimized read models.
//! They are rebuildable from the event stream, container-isolated and idempotent.

pub mod crop_history;

pub use crop_history::{CropHistoryProjection, CropHistoryProjectionError};
