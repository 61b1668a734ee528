//! Container-isolated read model storage.

pub mod crop_history_store;

pub use crop_history_store::{CropHistoryStore, InMemoryCropHistoryStore, ReadModelError};
