//! Where each lot's grain physically is.
//!
//! A lot's holding in a bin is the net of its `INTO_BIN` and `OUT_OF_BIN`
//! movements against that bin (transfer legs included). Whatever part of the
//! remaining balance is not held in any bin is still on the field side and can
//! only leave as `DIRECT`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use grainledger_core::{BinId, LedgerError, LedgerResult, LotId, Quantity};

use crate::lot::Lot;
use crate::movement::{Disposition, Movement};

/// Per-lot, per-bin net quantities derived from movements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotHoldings {
    by_lot: BTreeMap<LotId, BTreeMap<BinId, Decimal>>,
}

impl LotHoldings {
    pub fn from_movements<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> Self {
        let mut by_lot: BTreeMap<LotId, BTreeMap<BinId, Decimal>> = BTreeMap::new();
        for movement in movements {
            let (Some(lot_id), Some(bin_id)) = (movement.source_lot_id(), movement.bin_id()) else {
                continue;
            };
            *by_lot.entry(lot_id).or_default().entry(bin_id).or_default() += movement.level_delta(bin_id);
        }
        Self { by_lot }
    }

    /// Net quantity of `lot_id` in `bin_id`.
    pub fn in_bin(&self, lot_id: LotId, bin_id: BinId) -> Decimal {
        self.by_lot
            .get(&lot_id)
            .and_then(|bins| bins.get(&bin_id))
            .copied()
            .unwrap_or_default()
    }

    /// Net quantity of `lot_id` across all bins.
    pub fn binned(&self, lot_id: LotId) -> Decimal {
        self.by_lot
            .get(&lot_id)
            .map(|bins| bins.values().copied().sum())
            .unwrap_or_default()
    }

    /// Sum of every lot's holding in `bin_id`.
    pub fn bin_total(&self, bin_id: BinId) -> Decimal {
        self.by_lot
            .values()
            .filter_map(|bins| bins.get(&bin_id))
            .copied()
            .sum()
    }

    /// What `lot` can still give up from `bin_id`.
    pub fn available_in_bin(&self, lot: &Lot, bin_id: BinId) -> Quantity {
        let held = self.in_bin(lot.id_typed(), bin_id);
        floor_quantity(held.min(lot.remaining().value()))
    }

    /// What `lot` can still give up without touching a bin.
    pub fn unbinned(&self, lot: &Lot) -> Quantity {
        floor_quantity(lot.remaining().value() - self.binned(lot.id_typed()))
    }

    /// What `lot` can give up for an outbound with `disposition`.
    pub fn available(&self, lot: &Lot, disposition: Disposition) -> Quantity {
        match disposition {
            Disposition::FromBin(bin_id) => self.available_in_bin(lot, bin_id),
            Disposition::Direct => self.unbinned(lot),
        }
    }

    /// No negative holding in any bin, and never more binned than remaining.
    pub fn check(&self, lot: &Lot) -> LedgerResult<()> {
        let lot_id = lot.id_typed();
        let Some(bins) = self.by_lot.get(&lot_id) else {
            return Ok(());
        };
        if let Some((bin_id, held)) = bins.iter().find(|(_, held)| **held < Decimal::ZERO) {
            return Err(LedgerError::LotHoldingUnderflow {
                lot_id,
                bin_id: *bin_id,
                held: *held,
            });
        }
        let held: Decimal = bins.values().copied().sum();
        if held > lot.remaining().value() {
            return Err(LedgerError::LotHoldingOverflow {
                lot_id,
                held,
                remaining: lot.remaining().value(),
            });
        }
        Ok(())
    }
}

fn floor_quantity(value: Decimal) -> Quantity {
    Quantity::new(value.max(Decimal::ZERO)).unwrap_or(Quantity::ZERO)
}
