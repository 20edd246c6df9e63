//! Lot Store: the only writer of lot records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use grainledger_core::{Commodity, LedgerError, LedgerResult, LotId, Quantity};
use grainledger_ledger::{AdjustmentReason, HarvestEvent, LedgerEvent, Lot};

use crate::store::{LedgerReader, LedgerWriter};

/// Lot operations bound to one open transaction.
pub struct LotStore<'tx, W: ?Sized> {
    tx: &'tx mut W,
}

impl<'tx, W> LotStore<'tx, W>
where
    W: LedgerWriter + ?Sized,
{
    pub fn new(tx: &'tx mut W) -> Self {
        Self { tx }
    }

    /// Create the lot for `event`.
    ///
    /// Replaying the same event with the same attributes returns the lot already
    /// recorded (balance included); different attributes are a `Conflict`.
    pub fn create_lot(
        &mut self,
        event: &HarvestEvent,
        commodity: Commodity,
        quantity: Quantity,
        created_at: DateTime<Utc>,
    ) -> LedgerResult<Lot> {
        let farm_id = self.tx.farm_id();
        if event.farm_id != farm_id {
            return Err(LedgerError::FarmMismatch {
                expected: farm_id,
                found: event.farm_id,
            });
        }

        let lot = Lot::create(event, commodity, quantity, created_at)?;
        if let Some(existing) = self.tx.lot(lot.id_typed()) {
            if existing.same_origin(&lot) {
                tracing::debug!(lot_id = %existing.id_typed(), event_id = %event.id, "lot already recorded; replay is a no-op");
                return Ok(existing);
            }
            return Err(LedgerError::conflict(format!(
                "event {} already created lot {} with different attributes",
                event.id,
                existing.id_typed()
            )));
        }

        self.tx.put_lot(lot.clone())?;
        self.tx.append(LedgerEvent::LotCreated(lot.clone()));
        tracing::info!(lot_id = %lot.id_typed(), event_id = %event.id, commodity = %lot.commodity(), quantity = %quantity, "lot created");
        Ok(lot)
    }

    /// Apply `delta` to a lot's remaining balance.
    pub fn adjust_balance(
        &mut self,
        lot_id: LotId,
        delta: Decimal,
        reason: AdjustmentReason,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<Quantity> {
        if delta.is_zero() {
            return Err(LedgerError::validation("delta cannot be zero"));
        }
        let mut lot = self
            .tx
            .lot(lot_id)
            .ok_or_else(|| LedgerError::not_found("lot", lot_id))?;

        let remaining = lot.adjust_balance(delta).inspect_err(|err| {
            tracing::warn!(lot_id = %lot_id, %delta, error = %err, "lot adjustment rejected");
        })?;
        self.tx.put_lot(lot)?;
        self.tx.append(LedgerEvent::LotBalanceAdjusted {
            lot_id,
            delta,
            remaining,
            reason,
            occurred_at,
        });
        Ok(remaining)
    }
}

/// Open lots for a farm, optionally one commodity, oldest first.
pub fn open_lots<R>(reader: &R, commodity: Option<&Commodity>) -> Vec<Lot>
where
    R: LedgerReader + ?Sized,
{
    reader.open_lots(commodity)
}
