//! Grain ledger domain (pure).
//!
//! Lots, movements, bins and rental agreements, plus the two algorithms the
//! ledger is built around: FIFO allocation and landlord settlement. Everything
//! here is deterministic domain logic (no IO, no storage, no locking).

pub mod agreement;
pub mod bin;
pub mod command;
pub mod event;
pub mod fifo;
pub mod holdings;
pub mod lot;
pub mod movement;
pub mod settlement;

pub use agreement::{RentTerms, RentType, RentalAgreement};
pub use bin::Bin;
pub use command::{BinTransfer, Delivery, RecordHarvest};
pub use event::{AdjustmentReason, CascadeCause, LedgerEvent};
pub use fifo::{Allocation, AllocationPlan, plan_allocation, plan_allocation_with, sort_fifo};
pub use holdings::LotHoldings;
pub use lot::{HarvestEvent, Lot, LotBalance, summarize_balances};
pub use movement::{Disposition, Movement, MovementKind, derive_bin_level};
pub use settlement::{Settlement, ShareSettlement, settle};
