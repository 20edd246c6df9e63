use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grainledger_core::{
    Commodity, Entity, EventId, FarmId, FieldId, LedgerError, LedgerResult, LotId, Quantity,
};

/// The host's harvest / grain event a lot originates from.
///
/// The ledger does not own these records; it only reads the fields it needs
/// to trace a lot back to its farm and field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestEvent {
    pub id: EventId,
    pub farm_id: FarmId,
    pub field_id: FieldId,
    pub occurred_at: DateTime<Utc>,
}

/// A quantity of one commodity created by one harvest event.
///
/// Invariant: `0 <= remaining <= original_quantity`, checked on every adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    id: LotId,
    farm_id: FarmId,
    field_id: FieldId,
    event_id: EventId,
    commodity: Commodity,
    created_at: DateTime<Utc>,
    original_quantity: Quantity,
    remaining: Quantity,
}

impl Lot {
    /// Create the lot for `event`. The id is derived from the event and commodity.
    pub fn create(
        event: &HarvestEvent,
        commodity: Commodity,
        quantity: Quantity,
        created_at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        if !quantity.is_positive() {
            return Err(LedgerError::InvalidQuantity(quantity.value()));
        }
        Ok(Self {
            id: LotId::for_event(event.id, &commodity),
            farm_id: event.farm_id,
            field_id: event.field_id,
            event_id: event.id,
            commodity,
            created_at,
            original_quantity: quantity,
            remaining: quantity,
        })
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn commodity(&self) -> &Commodity {
        &self.commodity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn original_quantity(&self) -> Quantity {
        self.original_quantity
    }

    pub fn remaining(&self) -> Quantity {
        self.remaining
    }

    /// Quantity already drawn from this lot.
    pub fn allocated(&self) -> Quantity {
        self.original_quantity
            .checked_sub(self.remaining)
            .unwrap_or(Quantity::ZERO)
    }

    pub fn is_open(&self) -> bool {
        self.remaining.is_positive()
    }

    /// Oldest first; ties broken by id so ordering never depends on input order.
    pub fn fifo_key(&self) -> (DateTime<Utc>, LotId) {
        (self.created_at, self.id)
    }

    /// Same lot as far as a replay is concerned (identity and origin attributes).
    pub fn same_origin(&self, other: &Lot) -> bool {
        self.id == other.id
            && self.farm_id == other.farm_id
            && self.field_id == other.field_id
            && self.commodity == other.commodity
            && self.original_quantity == other.original_quantity
    }

    /// Apply `delta` to the remaining balance (negative consumes, positive reverses).
    ///
    /// Rejects instead of clamping when the result would leave `0..=original`.
    pub fn adjust_balance(&mut self, delta: Decimal) -> LedgerResult<Quantity> {
        let next = self.remaining.value() + delta;
        if next < Decimal::ZERO {
            return Err(LedgerError::BalanceUnderflow {
                lot_id: self.id,
                remaining: self.remaining.value(),
                delta,
            });
        }
        if next > self.original_quantity.value() {
            return Err(LedgerError::BalanceOverflow {
                lot_id: self.id,
                remaining: self.remaining.value(),
                delta,
                original: self.original_quantity.value(),
            });
        }
        self.remaining = Quantity::new(next)?;
        Ok(self.remaining)
    }
}

impl Entity for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn farm_id(&self) -> FarmId {
        self.farm_id
    }
}

/// Per-commodity balance summary over a set of lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotBalance {
    pub commodity: Commodity,
    pub lots: usize,
    pub open_lots: usize,
    pub original: Quantity,
    pub remaining: Quantity,
    pub allocated: Quantity,
}

/// Summarize `lots` per commodity, ordered by commodity name.
pub fn summarize_balances<'a>(lots: impl IntoIterator<Item = &'a Lot>) -> Vec<LotBalance> {
    let mut by_commodity: std::collections::BTreeMap<&Commodity, LotBalance> =
        std::collections::BTreeMap::new();

    for lot in lots {
        let entry = by_commodity
            .entry(lot.commodity())
            .or_insert_with(|| LotBalance {
                commodity: lot.commodity().clone(),
                lots: 0,
                open_lots: 0,
                original: Quantity::ZERO,
                remaining: Quantity::ZERO,
                allocated: Quantity::ZERO,
            });
        entry.lots += 1;
        if lot.is_open() {
            entry.open_lots += 1;
        }
        entry.original = entry.original + lot.original_quantity();
        entry.remaining = entry.remaining + lot.remaining();
        entry.allocated = entry.allocated + lot.allocated();
    }

    by_commodity.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn harvest() -> HarvestEvent {
        HarvestEvent {
            id: EventId::new(),
            farm_id: FarmId::new(),
            field_id: FieldId::new(),
            occurred_at: Utc::now(),
        }
    }

    fn corn() -> Commodity {
        Commodity::new("corn").unwrap()
    }

    #[test]
    fn create_rejects_non_positive_quantity() {
        let err = Lot::create(&harvest(), corn(), Quantity::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::InvalidQuantity(Decimal::ZERO));
    }

    #[test]
    fn create_derives_id_from_event() {
        let event = harvest();
        let a = Lot::create(&event, corn(), Quantity::from(500), event.occurred_at).unwrap();
        let b = Lot::create(&event, corn(), Quantity::from(500), event.occurred_at).unwrap();
        assert_eq!(a.id_typed(), b.id_typed());
        assert!(a.same_origin(&b));
        assert_eq!(a.remaining(), Quantity::from(500));
        assert_eq!(a.farm_id(), event.farm_id);
    }

    #[test]
    fn adjust_balance_rejects_underflow_and_overflow() {
        let event = harvest();
        let mut lot = Lot::create(&event, corn(), Quantity::from(100), Utc::now()).unwrap();

        assert_eq!(lot.adjust_balance(dec!(-40)).unwrap(), Quantity::from(60));

        let under = lot.adjust_balance(dec!(-60.01)).unwrap_err();
        assert!(matches!(under, LedgerError::BalanceUnderflow { .. }));
        assert_eq!(lot.remaining(), Quantity::from(60));

        let over = lot.adjust_balance(dec!(40.5)).unwrap_err();
        assert!(matches!(over, LedgerError::BalanceOverflow { .. }));
        assert_eq!(lot.remaining(), Quantity::from(60));

        assert_eq!(lot.adjust_balance(dec!(40)).unwrap(), Quantity::from(100));
        assert_eq!(lot.allocated(), Quantity::ZERO);
    }

    #[test]
    fn summary_groups_by_commodity() {
        let event = harvest();
        let mut corn_lot = Lot::create(&event, corn(), Quantity::from(500), Utc::now()).unwrap();
        corn_lot.adjust_balance(dec!(-500)).unwrap();
        let soy = Lot::create(
            &event,
            Commodity::new("soybeans").unwrap(),
            Quantity::from(200),
            Utc::now(),
        )
        .unwrap();

        let summary = summarize_balances([&corn_lot, &soy]);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].commodity, corn());
        assert_eq!(summary[0].open_lots, 0);
        assert_eq!(summary[0].allocated, Quantity::from(500));
        assert_eq!(summary[1].remaining, Quantity::from(200));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of adjustments is attempted, accepted ones
        /// keep the balance within `0..=original` and rejected ones change nothing.
        #[test]
        fn balance_stays_within_bounds(
            original in 1u32..10_000,
            deltas in prop::collection::vec(-5_000i64..5_000i64, 1..40)
        ) {
            let mut lot = Lot::create(&harvest(), corn(), Quantity::from(original), Utc::now()).unwrap();
            for delta in deltas {
                let before = lot.remaining();
                match lot.adjust_balance(Decimal::from(delta)) {
                    Ok(after) => prop_assert_eq!(after.value(), before.value() + Decimal::from(delta)),
                    Err(_) => prop_assert_eq!(lot.remaining(), before),
                }
                prop_assert!(lot.remaining() <= lot.original_quantity());
                prop_assert!(lot.remaining() >= Quantity::ZERO);
            }
        }
    }
}
