//! Movement Recorder: the only writer of movement records and bin levels.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use grainledger_core::{BinId, EventId, LedgerError, LedgerResult, LotId, Quantity};
use grainledger_ledger::{
    AdjustmentReason, Allocation, Bin, BinTransfer, CascadeCause, Disposition, LedgerEvent,
    LotHoldings, Movement, MovementKind, derive_bin_level, plan_allocation_with,
};

use crate::cascade::CascadeReport;
use crate::config::LotDeletionPolicy;
use crate::lot_store::LotStore;
use crate::store::{LedgerReader, LedgerWriter};

/// Check that `lot_id` holds no negative quantity in any bin and no more in
/// bins than it has remaining. A lot that no longer exists passes.
pub fn check_lot_holdings<R>(reader: &R, lot_id: LotId) -> LedgerResult<()>
where
    R: LedgerReader + ?Sized,
{
    let Some(lot) = reader.lot(lot_id) else {
        return Ok(());
    };
    LotHoldings::from_movements(&reader.movements_for_lot(lot_id)).check(&lot)
}

/// Movement operations bound to one open transaction.
pub struct MovementRecorder<'tx, W: ?Sized> {
    tx: &'tx mut W,
}

impl<'tx, W> MovementRecorder<'tx, W>
where
    W: LedgerWriter + ?Sized,
{
    pub fn new(tx: &'tx mut W) -> Self {
        Self { tx }
    }

    fn bin(&self, bin_id: BinId) -> LedgerResult<Bin> {
        self.tx
            .bin(bin_id)
            .ok_or_else(|| LedgerError::not_found("bin", bin_id))
    }

    /// A replay of an already-recorded movement returns it; anything else with
    /// the same id is a conflict.
    fn replayed(&self, movement: &Movement) -> LedgerResult<Option<Movement>> {
        match self.tx.movement(movement.id_typed()) {
            Some(existing) if existing.same_effect(movement) => Ok(Some(existing)),
            Some(existing) => Err(LedgerError::conflict(format!(
                "movement {} already recorded with different attributes",
                existing.id_typed()
            ))),
            None => Ok(None),
        }
    }

    fn insert(&mut self, movement: Movement) -> LedgerResult<()> {
        self.tx.insert_movement(movement.clone())?;
        self.tx.append(LedgerEvent::MovementRecorded(movement));
        Ok(())
    }

    /// `INTO_BIN` for `lot_id`. Rejects (never clamps) when the bin would overflow
    /// or when the lot would have more in bins than it has remaining.
    pub fn record_inbound(
        &mut self,
        event_id: EventId,
        bin_id: BinId,
        quantity: Quantity,
        lot_id: LotId,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Movement> {
        let lot = self
            .tx
            .lot(lot_id)
            .ok_or_else(|| LedgerError::not_found("lot", lot_id))?;
        let mut bin = self.bin(bin_id)?;

        let movement = Movement::inbound(
            self.tx.farm_id(),
            event_id,
            bin_id,
            lot_id,
            quantity,
            recorded_at,
        )?;
        if let Some(existing) = self.replayed(&movement)? {
            tracing::debug!(movement_id = %existing.id_typed(), "inbound already recorded; replay is a no-op");
            return Ok(existing);
        }

        let held = LotHoldings::from_movements(&self.tx.movements_for_lot(lot_id)).binned(lot_id);
        if held + quantity.value() > lot.remaining().value() {
            tracing::warn!(lot_id = %lot_id, %held, %quantity, remaining = %lot.remaining(), "inbound rejected");
            return Err(LedgerError::LotHoldingOverflow {
                lot_id,
                held: held + quantity.value(),
                remaining: lot.remaining().value(),
            });
        }

        bin.admit(quantity).inspect_err(|err| {
            tracing::warn!(bin_id = %bin_id, %quantity, error = %err, "inbound rejected");
        })?;
        self.tx.put_bin(bin)?;
        self.insert(movement.clone())?;
        Ok(movement)
    }

    /// One `OUT_OF_BIN` / `DIRECT` movement per allocation, in allocation order.
    ///
    /// Lot balances are the allocator's concern; this only records movements and
    /// lowers the bin level for `OUT_OF_BIN`. An allocation the lot cannot serve
    /// from where the outbound draws (nothing held in the bin, or binned grain
    /// leaving `DIRECT`) is rejected.
    pub fn record_outbound(
        &mut self,
        event_id: EventId,
        disposition: Disposition,
        allocations: &[Allocation],
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Vec<Movement>> {
        if allocations.is_empty() {
            return Err(LedgerError::validation("outbound without allocations"));
        }

        if let Disposition::FromBin(bin_id) = disposition {
            let mut bin = self.bin(bin_id)?;
            let total: Quantity = allocations.iter().map(|a| a.quantity).sum();
            bin.withdraw(total).inspect_err(|err| {
                tracing::warn!(bin_id = %bin_id, %total, error = %err, "withdrawal rejected");
            })?;
            self.tx.put_bin(bin)?;
        }

        let farm_id = self.tx.farm_id();
        let mut movements = Vec::with_capacity(allocations.len());
        for (index, allocation) in allocations.iter().enumerate() {
            if self.tx.lot(allocation.lot_id).is_none() {
                return Err(LedgerError::not_found("lot", allocation.lot_id));
            }
            let movement = Movement::outbound(
                farm_id,
                event_id,
                disposition,
                index,
                allocation.lot_id,
                allocation.quantity,
                recorded_at,
            )?;
            self.insert(movement.clone())?;
            movements.push(movement);
        }
        for allocation in allocations {
            check_lot_holdings(&*self.tx, allocation.lot_id)?;
        }
        Ok(movements)
    }

    /// Bin-to-bin move. Capacity is checked on the target, underflow on the source.
    ///
    /// The grain that moves is taken from the lots held in the source bin,
    /// oldest first, and each lot's share gets its own pair of legs. Lot
    /// balances do not change.
    pub fn record_transfer(&mut self, transfer: &BinTransfer) -> LedgerResult<Vec<Movement>> {
        if !transfer.quantity.is_positive() {
            return Err(LedgerError::InvalidQuantity(transfer.quantity.value()));
        }
        if transfer.from == transfer.to {
            return Err(LedgerError::validation("transfer source and target bin are the same"));
        }
        let mut from = self.bin(transfer.from)?;
        let mut to = self.bin(transfer.to)?;

        let recorded: Vec<Movement> = self
            .tx
            .movements_for_event(transfer.event_id)
            .into_iter()
            .filter(Movement::is_transfer)
            .collect();
        if !recorded.is_empty() {
            return replay_transfer(transfer, recorded);
        }

        from.withdraw(transfer.quantity).inspect_err(|err| {
            tracing::warn!(bin_id = %transfer.from, quantity = %transfer.quantity, error = %err, "transfer rejected");
        })?;
        to.admit(transfer.quantity).inspect_err(|err| {
            tracing::warn!(bin_id = %transfer.to, quantity = %transfer.quantity, error = %err, "transfer rejected");
        })?;

        let holdings = LotHoldings::from_movements(&self.tx.movements());
        let allocations = plan_allocation_with(&self.tx.lots(), transfer.quantity, |lot| {
            holdings.available_in_bin(lot, transfer.from)
        })
        .into_complete()?;

        self.tx.put_bin(from)?;
        self.tx.put_bin(to)?;
        let farm_id = self.tx.farm_id();
        let mut legs = Vec::with_capacity(allocations.len() * 2);
        for (index, allocation) in allocations.into_iter().enumerate() {
            let (out, into) = Movement::transfer(
                farm_id,
                transfer.event_id,
                transfer.from,
                transfer.to,
                index,
                allocation,
                transfer.occurred_at,
            )?;
            self.insert(out.clone())?;
            self.insert(into.clone())?;
            legs.extend([out, into]);
        }
        Ok(legs)
    }

    /// Re-derive a bin's cached level from its movements.
    ///
    /// A derived level outside `0..=capacity` is reported, not clamped.
    pub fn recompute_bin_level(&mut self, bin_id: BinId) -> LedgerResult<Quantity> {
        let mut bin = self.bin(bin_id)?;
        let level = derive_bin_level(bin_id, &self.tx.movements_for_bin(bin_id));
        bin.set_level(level)?;
        let level = bin.current_level();
        self.tx.put_bin(bin)?;
        Ok(level)
    }

    fn remove(
        &mut self,
        movement: &Movement,
        cause: CascadeCause,
        at: DateTime<Utc>,
        report: &mut CascadeReport,
    ) -> LedgerResult<()> {
        let id = movement.id_typed();
        if self.tx.remove_movement(id).is_none() {
            return Err(LedgerError::cascade(format!("movement {id} vanished mid-cascade")));
        }
        self.tx.append(LedgerEvent::MovementRemoved {
            movement_id: id,
            cause,
            occurred_at: at,
        });
        report.movements_removed.push(id);
        Ok(())
    }

    /// Remove every movement of `event_id`, then the lot(s) the event created.
    ///
    /// Outbound allocations of the event hand their quantity back to the source
    /// lot. A lot still referenced by other events' movements is handled per
    /// `policy`. Deleting an event with nothing left is a no-op.
    pub fn delete_for_event(
        &mut self,
        event_id: EventId,
        policy: LotDeletionPolicy,
        at: DateTime<Utc>,
    ) -> LedgerResult<CascadeReport> {
        let movements = self.tx.movements_for_event(event_id);
        let lots = self.tx.lots_for_event(event_id);
        let mut report = CascadeReport::default();
        if movements.is_empty() && lots.is_empty() {
            return Ok(report);
        }

        let cause = CascadeCause::EventDeleted(event_id);
        let doomed: BTreeSet<LotId> = lots.iter().map(|l| l.id_typed()).collect();
        let mut touched: BTreeSet<BinId> = BTreeSet::new();
        let mut touched_lots: BTreeSet<LotId> = BTreeSet::new();

        for movement in &movements {
            self.remove(movement, cause, at, &mut report)?;
            touched.extend(movement.bin_id());
            touched_lots.extend(movement.source_lot_id());

            let Some(lot_id) = movement.source_lot_id() else {
                continue;
            };
            if movement.is_allocation() && !doomed.contains(&lot_id) && self.tx.lot(lot_id).is_some() {
                LotStore::new(&mut *self.tx).adjust_balance(
                    lot_id,
                    movement.quantity().value(),
                    AdjustmentReason::Reversal,
                    at,
                )?;
                self.tx.append(LedgerEvent::AllocationReversed {
                    lot_id,
                    movement_id: movement.id_typed(),
                    quantity: movement.quantity(),
                    occurred_at: at,
                });
                report.reversals.push(Allocation {
                    lot_id,
                    quantity: movement.quantity(),
                });
                tracing::info!(lot_id = %lot_id, quantity = %movement.quantity(), "allocation reversed");
            }
        }

        for lot in &lots {
            let lot_id = lot.id_typed();
            let dependents = self.tx.movements_for_lot(lot_id);
            if !dependents.is_empty() {
                match policy {
                    LotDeletionPolicy::Reject => {
                        return Err(LedgerError::LotInUse {
                            lot_id,
                            movements: dependents.len(),
                        });
                    }
                    LotDeletionPolicy::Cascade => {
                        for dependent in &dependents {
                            if self.tx.movement(dependent.id_typed()).is_none() {
                                continue;
                            }
                            self.remove(dependent, cause, at, &mut report)?;
                            touched.extend(dependent.bin_id());
                            self.remove_transfer_counterparts(dependent, cause, at, &mut report, &mut touched)?;
                        }
                    }
                }
            }

            if self.tx.remove_lot(lot_id).is_none() {
                return Err(LedgerError::cascade(format!("lot {lot_id} vanished mid-cascade")));
            }
            self.tx.append(LedgerEvent::LotRemoved {
                lot_id,
                cause,
                occurred_at: at,
            });
            report.lots_removed.push(lot_id);
        }

        self.recompute_touched(touched, &mut report)?;
        self.check_touched_lots(touched_lots)?;
        Ok(report)
    }

    /// Remove every movement referencing `bin_id` (and the other leg of any
    /// transfer through it), then the bin. Lots are never deleted here.
    pub fn delete_for_bin(&mut self, bin_id: BinId, at: DateTime<Utc>) -> LedgerResult<CascadeReport> {
        let mut report = CascadeReport::default();
        let bin_exists = self.tx.bin(bin_id).is_some();
        let movements = self.tx.movements_for_bin(bin_id);
        if !bin_exists && movements.is_empty() {
            return Ok(report);
        }

        let cause = CascadeCause::BinDeleted(bin_id);
        let mut touched: BTreeSet<BinId> = BTreeSet::new();
        let touched_lots: BTreeSet<LotId> = movements.iter().filter_map(Movement::source_lot_id).collect();

        for movement in &movements {
            if self.tx.movement(movement.id_typed()).is_none() {
                continue;
            }
            self.remove(movement, cause, at, &mut report)?;
            self.remove_transfer_counterparts(movement, cause, at, &mut report, &mut touched)?;
        }

        if bin_exists {
            self.tx.remove_bin(bin_id);
            report.bin_removed = Some(bin_id);
            self.tx.append(LedgerEvent::BinRemoved {
                bin_id,
                movements_removed: report.movements_removed.len(),
                occurred_at: at,
            });
        }

        self.recompute_touched(touched, &mut report)?;
        self.check_touched_lots(touched_lots)?;
        Ok(report)
    }

    /// Remove the other leg of `movement` when it is one side of a transfer.
    fn remove_transfer_counterparts(
        &mut self,
        movement: &Movement,
        cause: CascadeCause,
        at: DateTime<Utc>,
        report: &mut CascadeReport,
        touched: &mut BTreeSet<BinId>,
    ) -> LedgerResult<()> {
        let (Some(bin_id), Some(counterpart_bin)) = (movement.bin_id(), movement.transfer_bin_id()) else {
            return Ok(());
        };
        let counterparts = self
            .tx
            .movements_for_event(movement.source_event_id())
            .into_iter()
            .filter(|m| {
                m.bin_id() == Some(counterpart_bin)
                    && m.transfer_bin_id() == Some(bin_id)
                    && m.source_lot_id() == movement.source_lot_id()
                    && m.kind() != movement.kind()
            });
        for counterpart in counterparts {
            self.remove(&counterpart, cause, at, report)?;
            touched.extend(counterpart.bin_id());
        }
        Ok(())
    }

    fn check_touched_lots(&self, lots: BTreeSet<LotId>) -> LedgerResult<()> {
        for lot_id in lots {
            check_lot_holdings(&*self.tx, lot_id).inspect_err(|err| {
                tracing::warn!(lot_id = %lot_id, error = %err, "cascade would leave a lot's holdings inconsistent");
            })?;
        }
        Ok(())
    }

    fn recompute_touched(
        &mut self,
        touched: BTreeSet<BinId>,
        report: &mut CascadeReport,
    ) -> LedgerResult<()> {
        for bin_id in touched {
            if self.tx.bin(bin_id).is_none() {
                continue;
            }
            self.recompute_bin_level(bin_id)?;
            report.bins_recomputed.push(bin_id);
        }
        Ok(())
    }
}

/// A transfer re-submitted for an event that already has transfer legs.
fn replay_transfer(transfer: &BinTransfer, recorded: Vec<Movement>) -> LedgerResult<Vec<Movement>> {
    let moved: Quantity = recorded
        .iter()
        .filter(|m| m.kind() == MovementKind::OutOfBin)
        .map(Movement::quantity)
        .sum();
    let same_route = recorded.iter().all(|m| match m.kind() {
        MovementKind::OutOfBin => m.bin_id() == Some(transfer.from),
        _ => m.bin_id() == Some(transfer.to),
    });
    if moved != transfer.quantity || !same_route {
        return Err(LedgerError::conflict(format!(
            "event {} already moved {moved} along a different route or quantity",
            transfer.event_id
        )));
    }
    tracing::debug!(event_id = %transfer.event_id, "transfer already recorded; replay is a no-op");
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainledger_core::{Commodity, FarmId, FieldId};
    use grainledger_ledger::{HarvestEvent, Lot};
    use rust_decimal::Decimal;

    use crate::store::{InMemoryRecordStore, RecordStore};

    struct Fixture {
        store: InMemoryRecordStore,
        farm_id: FarmId,
        bin_id: BinId,
    }

    impl Fixture {
        fn new(capacity: u32) -> Self {
            let store = InMemoryRecordStore::new();
            let farm_id = FarmId::new();
            let bin = Bin::new(BinId::new(), farm_id, "north bin", Quantity::from(capacity)).unwrap();
            let bin_id = bin.id_typed();
            store.transact(farm_id, |tx| tx.put_bin(bin)).unwrap();
            Self { store, farm_id, bin_id }
        }

        fn lot(&self, qty: u32) -> Lot {
            let event = HarvestEvent {
                id: EventId::new(),
                farm_id: self.farm_id,
                field_id: FieldId::new(),
                occurred_at: Utc::now(),
            };
            self.store
                .transact(self.farm_id, |tx| {
                    LotStore::new(tx).create_lot(&event, Commodity::new("wheat")?, Quantity::from(qty), Utc::now())
                })
                .unwrap()
        }

        fn inbound(&self, lot: &Lot, qty: u32) -> LedgerResult<Movement> {
            self.store.transact(self.farm_id, |tx| {
                MovementRecorder::new(tx).record_inbound(
                    lot.event_id(),
                    self.bin_id,
                    Quantity::from(qty),
                    lot.id_typed(),
                    Utc::now(),
                )
            })
        }

        fn level(&self) -> Quantity {
            self.store
                .read(self.farm_id, |r| r.bin(self.bin_id).unwrap().current_level())
                .unwrap()
        }
    }

    #[test]
    fn inbound_raises_level_and_is_idempotent() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(400);

        let first = fx.inbound(&lot, 400).unwrap();
        let again = fx.inbound(&lot, 400).unwrap();
        assert_eq!(first, again);
        assert_eq!(fx.level(), Quantity::from(400));
        assert_eq!(
            fx.store.read(fx.farm_id, |r| r.movements_for_bin(fx.bin_id).len()).unwrap(),
            1
        );
    }

    #[test]
    fn inbound_past_capacity_is_rejected_not_clamped() {
        let fx = Fixture::new(300);
        let lot = fx.lot(400);

        let err = fx.inbound(&lot, 400).unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { .. }));
        assert_eq!(fx.level(), Quantity::ZERO);
        assert!(fx.store.read(fx.farm_id, |r| r.movements()).unwrap().is_empty());
    }

    #[test]
    fn inbound_cannot_bin_more_than_the_lot_holds() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(100);

        let err = fx.inbound(&lot, 150).unwrap_err();
        assert_eq!(
            err,
            LedgerError::LotHoldingOverflow {
                lot_id: lot.id_typed(),
                held: Decimal::from(150),
                remaining: Decimal::from(100),
            }
        );
    }

    #[test]
    fn inbound_is_capped_by_what_the_lot_has_left_outside_bins() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(400);
        let lot_id = lot.id_typed();

        // 300 leaves the field direct; only 100 is left to bin.
        fx.store
            .transact(fx.farm_id, |tx| {
                LotStore::new(&mut *tx).adjust_balance(
                    lot_id,
                    Decimal::from(-300),
                    AdjustmentReason::Allocation,
                    Utc::now(),
                )?;
                MovementRecorder::new(tx).record_outbound(
                    EventId::new(),
                    Disposition::Direct,
                    &[Allocation { lot_id, quantity: Quantity::from(300) }],
                    Utc::now(),
                )
            })
            .unwrap();

        let err = fx.inbound(&lot, 200).unwrap_err();
        assert_eq!(
            err,
            LedgerError::LotHoldingOverflow {
                lot_id,
                held: Decimal::from(200),
                remaining: Decimal::from(100),
            }
        );
        assert_eq!(fx.level(), Quantity::ZERO);

        fx.inbound(&lot, 100).unwrap();
        assert_eq!(fx.level(), Quantity::from(100));
    }

    #[test]
    fn withdrawal_from_a_bin_the_lot_is_not_in_is_rejected() {
        let fx = Fixture::new(1000);
        let binned = fx.lot(400);
        let unbinned = fx.lot(400);
        fx.inbound(&binned, 400).unwrap();

        let allocations = [Allocation {
            lot_id: unbinned.id_typed(),
            quantity: Quantity::from(100),
        }];
        let err = fx
            .store
            .transact(fx.farm_id, |tx| {
                MovementRecorder::new(tx).record_outbound(
                    EventId::new(),
                    Disposition::FromBin(fx.bin_id),
                    &allocations,
                    Utc::now(),
                )
            })
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::LotHoldingUnderflow {
                lot_id: unbinned.id_typed(),
                bin_id: fx.bin_id,
                held: Decimal::from(-100),
            }
        );
        assert_eq!(fx.level(), Quantity::from(400));
    }

    #[test]
    fn outbound_from_bin_lowers_level() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(400);
        fx.inbound(&lot, 400).unwrap();

        let allocations = [Allocation {
            lot_id: lot.id_typed(),
            quantity: Quantity::from(150),
        }];
        let movements = fx
            .store
            .transact(fx.farm_id, |tx| {
                MovementRecorder::new(tx).record_outbound(
                    EventId::new(),
                    Disposition::FromBin(fx.bin_id),
                    &allocations,
                    Utc::now(),
                )
            })
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind(), MovementKind::OutOfBin);
        assert_eq!(movements[0].source_lot_id(), Some(lot.id_typed()));
        assert_eq!(fx.level(), Quantity::from(250));
    }

    #[test]
    fn outbound_below_zero_is_rejected() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(400);
        fx.inbound(&lot, 100).unwrap();

        let allocations = [Allocation {
            lot_id: lot.id_typed(),
            quantity: Quantity::from(101),
        }];
        let err = fx
            .store
            .transact(fx.farm_id, |tx| {
                MovementRecorder::new(tx).record_outbound(
                    EventId::new(),
                    Disposition::FromBin(fx.bin_id),
                    &allocations,
                    Utc::now(),
                )
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::BinLevelUnderflow { .. }));
        assert_eq!(fx.level(), Quantity::from(100));
    }

    #[test]
    fn transfer_moves_level_between_bins() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(400);
        fx.inbound(&lot, 400).unwrap();
        let other = Bin::new(BinId::new(), fx.farm_id, "south bin", Quantity::from(200)).unwrap();
        let other_id = other.id_typed();
        fx.store.transact(fx.farm_id, |tx| tx.put_bin(other)).unwrap();

        let transfer = |qty: u32| BinTransfer {
            event_id: EventId::new(),
            from: fx.bin_id,
            to: other_id,
            quantity: Quantity::from(qty),
            occurred_at: Utc::now(),
        };

        let err = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).record_transfer(&transfer(250)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { .. }));

        let moved = transfer(150);
        let legs = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).record_transfer(&moved))
            .unwrap();
        let [out, into] = legs.as_slice() else {
            panic!("expected one pair of legs, got {legs:?}");
        };
        assert_eq!(out.kind(), MovementKind::OutOfBin);
        assert_eq!(out.transfer_bin_id(), Some(other_id));
        assert_eq!(into.transfer_bin_id(), Some(fx.bin_id));
        assert_eq!(into.source_lot_id(), Some(lot.id_typed()));
        assert_eq!(fx.level(), Quantity::from(250));
        let lot_after = fx.store.read(fx.farm_id, |r| r.lot(lot.id_typed())).unwrap().unwrap();
        assert_eq!(lot_after.remaining(), Quantity::from(400));

        let again = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).record_transfer(&moved))
            .unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(fx.level(), Quantity::from(250));
    }

    #[test]
    fn transfer_splits_across_lots_oldest_first() {
        let fx = Fixture::new(1000);
        let older = fx.lot(100);
        let newer = fx.lot(300);
        let unbinned = fx.lot(500);
        fx.inbound(&older, 100).unwrap();
        fx.inbound(&newer, 300).unwrap();
        let other = Bin::new(BinId::new(), fx.farm_id, "south bin", Quantity::from(1000)).unwrap();
        let other_id = other.id_typed();
        fx.store.transact(fx.farm_id, |tx| tx.put_bin(other)).unwrap();

        let transfer = BinTransfer {
            event_id: EventId::new(),
            from: fx.bin_id,
            to: other_id,
            quantity: Quantity::from(250),
            occurred_at: Utc::now(),
        };
        let legs = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).record_transfer(&transfer))
            .unwrap();
        assert_eq!(legs.len(), 4);

        let moved = |lot: &Lot| -> Quantity {
            legs.iter()
                .filter(|m| m.kind() == MovementKind::IntoBin && m.source_lot_id() == Some(lot.id_typed()))
                .map(Movement::quantity)
                .sum()
        };
        let (older_moved, newer_moved) = (moved(&older), moved(&newer));
        let expected = if older.fifo_key() < newer.fifo_key() {
            (Quantity::from(100), Quantity::from(150))
        } else {
            (Quantity::ZERO, Quantity::from(250))
        };
        assert_eq!((older_moved, newer_moved), expected);
        assert_eq!(moved(&unbinned), Quantity::ZERO);
    }

    #[test]
    fn deleting_a_missing_bin_journals_only_the_removed_movements() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(100);
        let missing = BinId::new();
        let stray = Movement::inbound(
            fx.farm_id,
            lot.event_id(),
            missing,
            lot.id_typed(),
            Quantity::from(40),
            Utc::now(),
        )
        .unwrap();
        fx.store.transact(fx.farm_id, |tx| tx.insert_movement(stray)).unwrap();
        let before = fx.store.read(fx.farm_id, |r| r.journal().len()).unwrap();

        let report = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).delete_for_bin(missing, Utc::now()))
            .unwrap();
        assert_eq!(report.movements_removed.len(), 1);
        assert_eq!(report.bin_removed, None);

        let journal = fx.store.read(fx.farm_id, |r| r.journal()).unwrap();
        let added: Vec<&LedgerEvent> = journal[before..].iter().map(|e| e.payload()).collect();
        assert_eq!(added.len(), 1);
        assert!(matches!(added[0], LedgerEvent::MovementRemoved { .. }));
        assert!(!journal.iter().any(|e| matches!(e.payload(), LedgerEvent::BinRemoved { .. })));

        let replay = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).delete_for_bin(missing, Utc::now()))
            .unwrap();
        assert!(replay.is_noop());
        assert_eq!(fx.store.read(fx.farm_id, |r| r.journal().len()).unwrap(), journal.len());
    }

    #[test]
    fn recompute_repairs_a_drifted_cache() {
        let fx = Fixture::new(1000);
        let lot = fx.lot(400);
        fx.inbound(&lot, 300).unwrap();

        fx.store
            .transact(fx.farm_id, |tx| {
                let mut bin = tx.bin(fx.bin_id).unwrap();
                bin.set_level(Decimal::from(900))?;
                tx.put_bin(bin)
            })
            .unwrap();
        assert_eq!(fx.level(), Quantity::from(900));

        let level = fx
            .store
            .transact(fx.farm_id, |tx| MovementRecorder::new(tx).recompute_bin_level(fx.bin_id))
            .unwrap();
        assert_eq!(level, Quantity::from(300));
        assert_eq!(fx.level(), Quantity::from(300));
    }
}
