//! Domain events and the envelope they travel in once persisted.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
