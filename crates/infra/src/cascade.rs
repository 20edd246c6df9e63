//! Deletion Cascade.
//!
//! Ordering is fixed: dependent movements go before the lot, and before the
//! bin. Each cascade runs inside the caller's transaction and is checked
//! afterwards; a cascade that left anything behind is an integrity fault
//! (`InconsistentCascade`) and the transaction is abandoned as a whole.

use chrono::{DateTime, Utc};
use serde::Serialize;

use grainledger_core::{BinId, EventId, LedgerError, LedgerResult, LotId, MovementId};
use grainledger_ledger::Allocation;

use crate::config::LotDeletionPolicy;
use crate::movement_recorder::MovementRecorder;
use crate::store::{LedgerReader, LedgerWriter};

/// What a cascade removed or repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub movements_removed: Vec<MovementId>,
    pub lots_removed: Vec<LotId>,
    /// Quantities handed back to surviving lots.
    pub reversals: Vec<Allocation>,
    pub bins_recomputed: Vec<BinId>,
    pub bin_removed: Option<BinId>,
}

impl CascadeReport {
    /// Nothing was left to delete (e.g. a replayed delete).
    pub fn is_noop(&self) -> bool {
        self.movements_removed.is_empty()
            && self.lots_removed.is_empty()
            && self.bin_removed.is_none()
    }
}

/// Delete everything that hangs off `event_id`.
pub fn delete_event<W>(
    tx: &mut W,
    event_id: EventId,
    policy: LotDeletionPolicy,
    at: DateTime<Utc>,
) -> LedgerResult<CascadeReport>
where
    W: LedgerWriter + ?Sized,
{
    let report = MovementRecorder::new(&mut *tx).delete_for_event(event_id, policy, at)?;
    verify_event_cascade(&*tx, event_id, &report)?;
    Ok(report)
}

/// Delete `bin_id` and every movement that references it.
pub fn delete_bin<W>(tx: &mut W, bin_id: BinId, at: DateTime<Utc>) -> LedgerResult<CascadeReport>
where
    W: LedgerWriter + ?Sized,
{
    let report = MovementRecorder::new(&mut *tx).delete_for_bin(bin_id, at)?;
    verify_bin_cascade(&*tx, bin_id)?;
    Ok(report)
}

fn verify_event_cascade<R>(reader: &R, event_id: EventId, report: &CascadeReport) -> LedgerResult<()>
where
    R: LedgerReader + ?Sized,
{
    let movements = reader.movements_for_event(event_id).len();
    if movements > 0 {
        return Err(LedgerError::cascade(format!(
            "event {event_id}: {movements} movement(s) survived deletion"
        )));
    }
    if !reader.lots_for_event(event_id).is_empty() {
        return Err(LedgerError::cascade(format!("event {event_id}: lot survived deletion")));
    }
    for lot_id in &report.lots_removed {
        let dangling = reader.movements_for_lot(*lot_id).len();
        if dangling > 0 {
            return Err(LedgerError::cascade(format!(
                "lot {lot_id}: {dangling} movement(s) reference a deleted lot"
            )));
        }
    }
    Ok(())
}

fn verify_bin_cascade<R>(reader: &R, bin_id: BinId) -> LedgerResult<()>
where
    R: LedgerReader + ?Sized,
{
    if reader.bin(bin_id).is_some() {
        return Err(LedgerError::cascade(format!("bin {bin_id} survived deletion")));
    }
    let dangling = reader.movements_for_bin(bin_id).len();
    if dangling > 0 {
        return Err(LedgerError::cascade(format!(
            "bin {bin_id}: {dangling} movement(s) reference a deleted bin"
        )));
    }
    Ok(())
}
