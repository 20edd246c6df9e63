//! Per-farm ledger context.
//!
//! A `LedgerContext` is an explicit value built for one farm (per session,
//! per request, per sync pass) and handed to whoever needs the ledger. Every
//! operation is scoped to its farm, every mutation runs as a single store
//! transaction, and there is no shared process-wide instance.
//!
//! ```text
//! harvest ──► create lot ──► INTO_BIN movement        (record_harvest)
//! delivery ─► FIFO allocate ─► OUT_OF_BIN / DIRECT    (deliver)
//! delete ───► movements ─► lot / bin ─► bin levels    (delete_event / delete_bin)
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use grainledger_core::{
    AgreementId, BinId, Commodity, Entity, EventId, FarmId, LedgerError, LedgerResult, LotId,
    Quantity,
};
use grainledger_events::EventEnvelope;
use grainledger_ledger::{
    AdjustmentReason, AllocationPlan, Bin, BinTransfer, Delivery, Disposition, HarvestEvent,
    LedgerEvent, Lot, LotBalance, LotHoldings, Movement, RecordHarvest, RentalAgreement,
    Settlement, derive_bin_level, settle, summarize_balances,
};

use crate::allocator;
use crate::cascade::{self, CascadeReport};
use crate::config::LedgerConfig;
use crate::lot_store::{self, LotStore};
use crate::movement_recorder::{MovementRecorder, check_lot_holdings};
use crate::store::{LedgerReader, LedgerWriter, RecordStore};

/// Cached vs. derived level of a bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinCheck {
    pub bin_id: BinId,
    pub cached: Quantity,
    pub derived: Decimal,
    pub capacity: Quantity,
}

impl BinCheck {
    pub fn is_consistent(&self) -> bool {
        self.cached.value() == self.derived
    }
}

/// Ledger operations for one farm over a host record store.
#[derive(Debug, Clone)]
pub struct LedgerContext<S> {
    store: S,
    farm_id: FarmId,
    config: LedgerConfig,
}

impl<S> LedgerContext<S>
where
    S: RecordStore,
{
    pub fn new(store: S, farm_id: FarmId, config: LedgerConfig) -> Self {
        Self {
            store,
            farm_id,
            config,
        }
    }

    pub fn farm_id(&self) -> FarmId {
        self.farm_id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn transact<T>(&self, f: impl FnOnce(&mut dyn LedgerWriter) -> LedgerResult<T>) -> LedgerResult<T> {
        self.store.transact(self.farm_id, f)
    }

    // ---- reference records -------------------------------------------------

    /// Register (or replace) a bin definition. The level of an existing bin is
    /// kept; it is owned by the movements, not by the caller.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, bin_id = %bin.id_typed()))]
    pub fn register_bin(&self, bin: Bin) -> LedgerResult<Bin> {
        bin.ensure_farm(self.farm_id)?;
        self.transact(|tx| {
            let bin_id = bin.id_typed();
            let mut bin = bin;
            if tx.bin(bin_id).is_some() {
                bin.set_level(derive_bin_level(bin_id, &tx.movements_for_bin(bin_id)))?;
            }
            tx.put_bin(bin.clone())?;
            tx.append(LedgerEvent::BinRegistered {
                bin: bin.clone(),
                occurred_at: Utc::now(),
            });
            Ok(bin)
        })
    }

    /// Change a bin's capacity; rejected below the current level.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, bin_id = %bin_id))]
    pub fn resize_bin(&self, bin_id: BinId, capacity: Quantity) -> LedgerResult<Bin> {
        self.transact(|tx| {
            let mut bin = tx
                .bin(bin_id)
                .ok_or_else(|| LedgerError::not_found("bin", bin_id))?;
            bin.resize(capacity)?;
            tx.put_bin(bin.clone())?;
            tx.append(LedgerEvent::BinRegistered {
                bin: bin.clone(),
                occurred_at: Utc::now(),
            });
            Ok(bin)
        })
    }

    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, agreement_id = %agreement.id))]
    pub fn register_agreement(&self, agreement: RentalAgreement) -> LedgerResult<()> {
        agreement.ensure_farm(self.farm_id)?;
        self.transact(|tx| {
            let agreement_id = agreement.id;
            tx.put_agreement(agreement)?;
            tx.append(LedgerEvent::AgreementRegistered {
                agreement_id,
                occurred_at: Utc::now(),
            });
            Ok(())
        })
    }

    // ---- lots ----------------------------------------------------------------

    /// Create the lot for a harvest event (idempotent per event + commodity).
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, event_id = %event.id))]
    pub fn create_lot(
        &self,
        event: &HarvestEvent,
        commodity: Commodity,
        quantity: Quantity,
        created_at: DateTime<Utc>,
    ) -> LedgerResult<Lot> {
        self.transact(|tx| LotStore::new(tx).create_lot(event, commodity, quantity, created_at))
    }

    /// Open lots, oldest first.
    pub fn open_lots(&self, commodity: Option<&Commodity>) -> LedgerResult<Vec<Lot>> {
        self.store
            .read(self.farm_id, |r| lot_store::open_lots(r, commodity))
    }

    /// Explicit balance correction (journaled as such).
    ///
    /// A correction cannot take a lot below what it still holds in bins.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, lot_id = %lot_id, delta = %delta))]
    pub fn adjust_balance(&self, lot_id: LotId, delta: Decimal) -> LedgerResult<Quantity> {
        self.transact(|tx| {
            let remaining =
                LotStore::new(&mut *tx).adjust_balance(lot_id, delta, AdjustmentReason::Correction, Utc::now())?;
            check_lot_holdings(&*tx, lot_id)?;
            Ok(remaining)
        })
    }

    // ---- movements -----------------------------------------------------------

    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, event_id = %event_id, bin_id = %bin_id))]
    pub fn record_inbound(
        &self,
        event_id: EventId,
        bin_id: BinId,
        quantity: Quantity,
        lot_id: LotId,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Movement> {
        self.transact(|tx| {
            MovementRecorder::new(tx).record_inbound(event_id, bin_id, quantity, lot_id, recorded_at)
        })
    }

    /// Harvest: the event's lot plus, when binned, its `INTO_BIN` movement, atomically.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, event_id = %cmd.event.id))]
    pub fn record_harvest(&self, cmd: RecordHarvest) -> LedgerResult<(Lot, Option<Movement>)> {
        self.transact(|tx| {
            let lot = LotStore::new(&mut *tx).create_lot(
                &cmd.event,
                cmd.commodity,
                cmd.quantity,
                cmd.event.occurred_at,
            )?;
            let inbound = match cmd.bin_id {
                Some(bin_id) => Some(MovementRecorder::new(tx).record_inbound(
                    cmd.event.id,
                    bin_id,
                    cmd.quantity,
                    lot.id_typed(),
                    cmd.event.occurred_at,
                )?),
                None => None,
            };
            Ok((lot, inbound))
        })
    }

    /// What a delivery with `disposition` would draw, without committing anything.
    pub fn preview_allocation(
        &self,
        commodity: &Commodity,
        quantity: Quantity,
        disposition: Disposition,
    ) -> LedgerResult<AllocationPlan> {
        self.store
            .read(self.farm_id, |r| allocator::preview(r, commodity, quantity, disposition))
    }

    /// FIFO-allocate and record an outbound delivery as one atomic unit.
    ///
    /// Only grain that is where the delivery draws from counts: lots held in
    /// the bin for `FromBin`, unbinned lots for `Direct`. Fails with
    /// `InsufficientInventory` (exact shortfall) and no side effects when that
    /// grain cannot cover the request.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, event_id = %cmd.event_id, quantity = %cmd.quantity))]
    pub fn deliver(&self, cmd: Delivery) -> LedgerResult<Vec<Movement>> {
        if !cmd.quantity.is_positive() {
            return Err(LedgerError::InvalidQuantity(cmd.quantity.value()));
        }
        let replay = self.config.replay_outbound;

        let movements = self.transact(|tx| {
            let recorded: Vec<Movement> = tx
                .movements_for_event(cmd.event_id)
                .into_iter()
                .filter(Movement::is_allocation)
                .collect();
            if !recorded.is_empty() {
                return replay_delivery(&cmd, recorded, replay);
            }

            let allocations = allocator::allocate(
                &mut *tx,
                &cmd.commodity,
                cmd.quantity,
                cmd.disposition,
                cmd.occurred_at,
            )?;
            MovementRecorder::new(tx).record_outbound(
                cmd.event_id,
                cmd.disposition,
                &allocations,
                cmd.occurred_at,
            )
        })?;

        tracing::info!(movements = movements.len(), "delivery recorded");
        Ok(movements)
    }

    /// Bin-to-bin move: one pair of legs per lot moved, lot balances untouched.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, event_id = %cmd.event_id, from = %cmd.from, to = %cmd.to))]
    pub fn transfer(&self, cmd: BinTransfer) -> LedgerResult<Vec<Movement>> {
        self.transact(|tx| MovementRecorder::new(tx).record_transfer(&cmd))
    }

    // ---- deletion ------------------------------------------------------------

    /// Delete everything that hangs off a host event. Re-running it is a no-op.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, event_id = %event_id))]
    pub fn delete_event(&self, event_id: EventId) -> LedgerResult<CascadeReport> {
        let policy = self.config.lot_deletion;
        let report = self
            .transact(|tx| cascade::delete_event(tx, event_id, policy, Utc::now()))
            .inspect_err(|err| log_cascade_failure(err))?;
        log_cascade(&report);
        Ok(report)
    }

    /// Delete a bin and every movement referencing it. Re-running it is a no-op.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, bin_id = %bin_id))]
    pub fn delete_bin(&self, bin_id: BinId) -> LedgerResult<CascadeReport> {
        let report = self
            .transact(|tx| cascade::delete_bin(tx, bin_id, Utc::now()))
            .inspect_err(|err| log_cascade_failure(err))?;
        log_cascade(&report);
        Ok(report)
    }

    // ---- reads ---------------------------------------------------------------

    pub fn lot(&self, lot_id: LotId) -> LedgerResult<Option<Lot>> {
        self.store.read(self.farm_id, |r| r.lot(lot_id))
    }

    pub fn lots(&self) -> LedgerResult<Vec<Lot>> {
        self.store.read(self.farm_id, |r| r.lots())
    }

    /// Per-lot, per-bin quantities as the movements record them.
    pub fn holdings(&self) -> LedgerResult<LotHoldings> {
        self.store
            .read(self.farm_id, |r| LotHoldings::from_movements(&r.movements()))
    }

    pub fn lot_balances(&self) -> LedgerResult<Vec<LotBalance>> {
        self.store
            .read(self.farm_id, |r| summarize_balances(&r.lots()))
    }

    pub fn bin(&self, bin_id: BinId) -> LedgerResult<Option<Bin>> {
        self.store.read(self.farm_id, |r| r.bin(bin_id))
    }

    pub fn bins(&self) -> LedgerResult<Vec<Bin>> {
        self.store.read(self.farm_id, |r| r.bins())
    }

    /// Current (cached) level of a bin.
    pub fn bin_level(&self, bin_id: BinId) -> LedgerResult<Quantity> {
        self.bin(bin_id)?
            .map(|b| b.current_level())
            .ok_or_else(|| LedgerError::not_found("bin", bin_id))
    }

    /// Compare a bin's cached level with the level its movements imply.
    pub fn verify_bin(&self, bin_id: BinId) -> LedgerResult<BinCheck> {
        self.store.read(self.farm_id, |r| {
            let bin = r
                .bin(bin_id)
                .ok_or_else(|| LedgerError::not_found("bin", bin_id))?;
            Ok(BinCheck {
                bin_id,
                cached: bin.current_level(),
                derived: derive_bin_level(bin_id, &r.movements_for_bin(bin_id)),
                capacity: bin.capacity(),
            })
        })?
    }

    /// Re-derive a bin's cached level from its movements and store it.
    #[tracing::instrument(skip_all, fields(farm_id = %self.farm_id, bin_id = %bin_id))]
    pub fn recompute_bin_level(&self, bin_id: BinId) -> LedgerResult<Quantity> {
        self.transact(|tx| MovementRecorder::new(tx).recompute_bin_level(bin_id))
    }

    pub fn movements_for_event(&self, event_id: EventId) -> LedgerResult<Vec<Movement>> {
        self.store
            .read(self.farm_id, |r| r.movements_for_event(event_id))
    }

    pub fn movements_for_bin(&self, bin_id: BinId) -> LedgerResult<Vec<Movement>> {
        self.store.read(self.farm_id, |r| r.movements_for_bin(bin_id))
    }

    pub fn movements_for_lot(&self, lot_id: LotId) -> LedgerResult<Vec<Movement>> {
        self.store.read(self.farm_id, |r| r.movements_for_lot(lot_id))
    }

    /// Landlord entitlement under a registered agreement.
    pub fn settlement(&self, agreement_id: AgreementId) -> LedgerResult<Settlement> {
        self.store.read(self.farm_id, |r| {
            let agreement = r
                .agreement(agreement_id)
                .ok_or_else(|| LedgerError::not_found("rental agreement", agreement_id))?;
            Ok(settle(&agreement, &r.lots(), &r.movements()))
        })?
    }

    /// Committed journal for this farm, in sequence order.
    pub fn journal(&self) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        self.store.read(self.farm_id, |r| r.journal())
    }
}

/// A delivery re-submitted for an event that already has outbound movements.
fn replay_delivery(cmd: &Delivery, recorded: Vec<Movement>, replay: bool) -> LedgerResult<Vec<Movement>> {
    if !replay {
        return Err(LedgerError::conflict(format!(
            "event {} already has outbound movements",
            cmd.event_id
        )));
    }
    let total: Quantity = recorded.iter().map(Movement::quantity).sum();
    let same_target = recorded
        .iter()
        .all(|m| m.kind() == cmd.disposition.kind() && m.bin_id() == cmd.disposition.bin_id());
    if total != cmd.quantity || !same_target {
        return Err(LedgerError::conflict(format!(
            "event {} was delivered as {total} with a different disposition or quantity",
            cmd.event_id
        )));
    }
    tracing::debug!(event_id = %cmd.event_id, "delivery already recorded; replay is a no-op");
    Ok(recorded)
}

fn log_cascade(report: &CascadeReport) {
    if report.is_noop() {
        tracing::debug!("nothing left to delete; replay is a no-op");
        return;
    }
    tracing::info!(
        movements = report.movements_removed.len(),
        lots = report.lots_removed.len(),
        reversals = report.reversals.len(),
        bins_recomputed = report.bins_recomputed.len(),
        "cascade committed"
    );
}

fn log_cascade_failure(err: &LedgerError) {
    if err.is_integrity_fault() {
        tracing::error!(error = %err, "cascade aborted: integrity fault");
    } else {
        tracing::warn!(error = %err, "cascade rejected");
    }
}
