//! Ledger journal primitives: the `Event` trait and the farm-scoped envelope
//! every committed mutation is recorded in.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
