//! First-in-first-out lot allocation.
//!
//! Planning is a pure function over a lot snapshot: it never mutates lots and
//! never looks at anything but the lots it is given. Applying a plan (balance
//! decrements + movements) is the caller's transactional step.

use serde::{Deserialize, Serialize};

use grainledger_core::{LedgerError, LedgerResult, LotId, Quantity};

use crate::lot::Lot;

/// One slice of an outbound request drawn from one lot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub lot_id: LotId,
    pub quantity: Quantity,
}

/// Result of planning an outbound request against a lot snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub requested: Quantity,
    /// Oldest lot first.
    pub allocations: Vec<Allocation>,
    /// Part of the request no open lot could cover.
    pub shortfall: Quantity,
}

impl AllocationPlan {
    pub fn is_complete(&self) -> bool {
        self.shortfall.is_zero()
    }

    pub fn allocated(&self) -> Quantity {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    /// The allocations, or `InsufficientInventory` with the exact shortfall.
    pub fn into_complete(self) -> LedgerResult<Vec<Allocation>> {
        if !self.is_complete() {
            return Err(LedgerError::InsufficientInventory {
                requested: self.requested.value(),
                shortfall: self.shortfall.value(),
            });
        }
        Ok(self.allocations)
    }
}

/// Sort lots into FIFO order: creation date ascending, then id.
pub fn sort_fifo(lots: &mut [Lot]) {
    lots.sort_by_key(Lot::fifo_key);
}

/// Plan `requested` against `lots`, oldest first.
///
/// Input order is irrelevant; closed lots are skipped. Identical snapshots and
/// requests always produce identical plans.
pub fn plan_allocation(lots: &[Lot], requested: Quantity) -> AllocationPlan {
    plan_allocation_with(lots, requested, Lot::remaining)
}

/// Like [`plan_allocation`], but each lot gives up at most `available(lot)`.
///
/// Used when only part of a lot can serve the outbound (e.g. the part still
/// held in the bin being withdrawn from). Lots with nothing available are
/// skipped without breaking FIFO order among the rest.
pub fn plan_allocation_with(
    lots: &[Lot],
    requested: Quantity,
    available: impl Fn(&Lot) -> Quantity,
) -> AllocationPlan {
    let mut open: Vec<&Lot> = lots.iter().filter(|l| l.is_open()).collect();
    open.sort_by_key(|l| l.fifo_key());

    let mut outstanding = requested;
    let mut allocations = Vec::new();

    for lot in open {
        if outstanding.is_zero() {
            break;
        }
        let take = available(lot).min(lot.remaining()).min(outstanding);
        if take.is_zero() {
            continue;
        }
        allocations.push(Allocation {
            lot_id: lot.id_typed(),
            quantity: take,
        });
        outstanding = outstanding.checked_sub(take).unwrap_or(Quantity::ZERO);
    }

    AllocationPlan {
        requested,
        allocations,
        shortfall: outstanding,
    }
}
