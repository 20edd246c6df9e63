//! Record-store boundary.
//!
//! The ledger never persists anything itself. It reads and writes through the
//! narrow capabilities below, always scoped to one farm, and relies on the
//! host's transaction primitive for atomic multi-row changes.

pub mod in_memory;

pub use in_memory::InMemoryRecordStore;

use std::sync::Arc;

use grainledger_core::{
    AgreementId, BinId, Commodity, EventId, FarmId, LedgerResult, LotId, MovementId,
};
use grainledger_events::EventEnvelope;
use grainledger_ledger::{Bin, LedgerEvent, Lot, Movement, RentalAgreement};

/// Read capabilities over one farm's records.
pub trait LedgerReader {
    /// The farm every read is scoped to.
    fn farm_id(&self) -> FarmId;

    fn lot(&self, lot_id: LotId) -> Option<Lot>;
    fn lots(&self) -> Vec<Lot>;
    /// Lots with a positive balance, oldest first (ties broken by id).
    fn open_lots(&self, commodity: Option<&Commodity>) -> Vec<Lot>;
    fn lots_for_event(&self, event_id: EventId) -> Vec<Lot>;

    fn movement(&self, movement_id: MovementId) -> Option<Movement>;
    fn movements(&self) -> Vec<Movement>;
    fn movements_for_event(&self, event_id: EventId) -> Vec<Movement>;
    fn movements_for_bin(&self, bin_id: BinId) -> Vec<Movement>;
    fn movements_for_lot(&self, lot_id: LotId) -> Vec<Movement>;

    fn bin(&self, bin_id: BinId) -> Option<Bin>;
    fn bins(&self) -> Vec<Bin>;

    fn agreement(&self, agreement_id: AgreementId) -> Option<RentalAgreement>;

    /// Committed journal, in sequence order.
    fn journal(&self) -> Vec<EventEnvelope<LedgerEvent>>;
}

/// Write capabilities; only ever handed out inside a transaction.
///
/// Puts reject records that belong to another farm.
pub trait LedgerWriter: LedgerReader {
    fn put_lot(&mut self, lot: Lot) -> LedgerResult<()>;
    fn remove_lot(&mut self, lot_id: LotId) -> Option<Lot>;

    /// Fails with `Conflict` if the id is already taken.
    fn insert_movement(&mut self, movement: Movement) -> LedgerResult<()>;
    fn remove_movement(&mut self, movement_id: MovementId) -> Option<Movement>;

    fn put_bin(&mut self, bin: Bin) -> LedgerResult<()>;
    fn remove_bin(&mut self, bin_id: BinId) -> Option<Bin>;

    fn put_agreement(&mut self, agreement: RentalAgreement) -> LedgerResult<()>;

    /// Append to the farm journal; becomes visible only if the transaction commits.
    fn append(&mut self, event: LedgerEvent);
}

/// Host-provided store with farm-scoped reads and atomic writes.
///
/// ## Consistency
///
/// - `transact` is all-or-nothing: if the closure returns `Err`, none of its
///   writes are observable.
/// - Transactions against the same farm are serialized (single logical writer).
/// - `read` observes a farm either fully before or fully after any transaction.
pub trait RecordStore: Send + Sync {
    fn read<T>(&self, farm_id: FarmId, f: impl FnOnce(&dyn LedgerReader) -> T) -> LedgerResult<T>;

    fn transact<T>(
        &self,
        farm_id: FarmId,
        f: impl FnOnce(&mut dyn LedgerWriter) -> LedgerResult<T>,
    ) -> LedgerResult<T>;
}

impl<S> RecordStore for Arc<S>
where
    S: RecordStore,
{
    fn read<T>(&self, farm_id: FarmId, f: impl FnOnce(&dyn LedgerReader) -> T) -> LedgerResult<T> {
        (**self).read(farm_id, f)
    }

    fn transact<T>(
        &self,
        farm_id: FarmId,
        f: impl FnOnce(&mut dyn LedgerWriter) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        (**self).transact(farm_id, f)
    }
}
