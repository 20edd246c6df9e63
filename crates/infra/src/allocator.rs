//! FIFO Allocator, effectful half.
//!
//! Takes the open-lot snapshot from the transaction it runs in, plans with the
//! pure [`plan_allocation_with`], and commits every decrement against that same
//! snapshot. Either the whole plan commits or the caller's transaction fails.
//!
//! A lot only serves an outbound with the grain it has where the outbound
//! draws from: its holding in the bin for `FromBin`, its unbinned remainder for
//! `Direct`.

use chrono::{DateTime, Utc};

use grainledger_core::{Commodity, LedgerResult, Quantity};
use grainledger_ledger::{
    AdjustmentReason, Allocation, AllocationPlan, Disposition, LotHoldings, plan_allocation_with,
};

use crate::lot_store::LotStore;
use crate::store::{LedgerReader, LedgerWriter};

/// Plan `requested` of `commodity` against the farm's open lots without writing.
pub fn preview<R>(
    reader: &R,
    commodity: &Commodity,
    requested: Quantity,
    disposition: Disposition,
) -> AllocationPlan
where
    R: LedgerReader + ?Sized,
{
    let holdings = LotHoldings::from_movements(&reader.movements());
    plan_allocation_with(&reader.open_lots(Some(commodity)), requested, |lot| {
        holdings.available(lot, disposition)
    })
}

/// Allocate `requested` of `commodity` oldest lot first and decrement the lots.
///
/// Fails with `InsufficientInventory` (exact shortfall) before touching any lot.
pub fn allocate<W>(
    tx: &mut W,
    commodity: &Commodity,
    requested: Quantity,
    disposition: Disposition,
    occurred_at: DateTime<Utc>,
) -> LedgerResult<Vec<Allocation>>
where
    W: LedgerWriter + ?Sized,
{
    let plan = preview(&*tx, commodity, requested, disposition);
    let allocations = plan.into_complete().inspect_err(|err| {
        tracing::warn!(%commodity, %requested, ?disposition, error = %err, "allocation rejected");
    })?;

    let mut lots = LotStore::new(tx);
    for allocation in &allocations {
        lots.adjust_balance(
            allocation.lot_id,
            -allocation.quantity.value(),
            AdjustmentReason::Allocation,
            occurred_at,
        )?;
    }

    tracing::debug!(%commodity, %requested, lots = allocations.len(), "allocation committed");
    Ok(allocations)
}
