//! `grainledger-core`: ledger foundation building blocks.
//!
//! This crate contains **pure** primitives (no storage, no IO): identifiers,
//! fixed-point quantities, and the error model shared by every other crate.

pub mod entity;
pub mod error;
pub mod id;
pub mod value;
pub mod value_object;

pub use entity::Entity;
pub use error::{LedgerError, LedgerResult};
pub use id::{AgreementId, BinId, EventId, FarmId, FieldId, LotId, MovementId};
pub use value::{Commodity, Quantity, SharePercentage};
pub use value_object::ValueObject;
