//! Ledger services over a host record store: lot store, movement recorder,
//! FIFO allocator, deletion cascade, settlement, and the per-farm context
//! that ties them together.

pub mod allocator;
pub mod cascade;
pub mod config;
pub mod context;
pub mod lot_store;
pub mod movement_recorder;
pub mod store;

pub use cascade::CascadeReport;
pub use config::{LedgerConfig, LotDeletionPolicy};
pub use context::{BinCheck, LedgerContext};
pub use lot_store::LotStore;
pub use movement_recorder::MovementRecorder;
pub use store::{InMemoryRecordStore, LedgerReader, LedgerWriter, RecordStore};
