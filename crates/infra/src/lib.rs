//! Infrastructure layer: event store, command dispatch, projections, configuration and
//! the inventory service facade.

pub mod clock;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FarmopsConfig;
pub use service::{CropObservation, InMemoryInventoryService, InventoryService, ServiceError};
