#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use grainledger_core::{BinId, Commodity, EventId, FarmId, FieldId, LedgerResult, Quantity};
use grainledger_infra::{InMemoryRecordStore, LedgerConfig, LedgerContext};
use grainledger_ledger::{
    Bin, BinTransfer, Delivery, Disposition, HarvestEvent, Lot, Movement, RecordHarvest,
};

pub type Ctx = LedgerContext<Arc<InMemoryRecordStore>>;

/// One farm with a single field, on a fresh in-memory store.
pub struct Farm {
    pub ctx: Ctx,
    pub field_id: FieldId,
    start: DateTime<Utc>,
}

impl Farm {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::on_store(Arc::new(InMemoryRecordStore::new()), config)
    }

    pub fn on_store(store: Arc<InMemoryRecordStore>, config: LedgerConfig) -> Self {
        config.init_observability();
        Self {
            ctx: LedgerContext::new(store, FarmId::new(), config),
            field_id: FieldId::new(),
            start: Utc::now() - Duration::days(365),
        }
    }

    pub fn day(&self, day: i64) -> DateTime<Utc> {
        self.start + Duration::days(day)
    }

    pub fn bin(&self, name: &str, capacity: u32) -> BinId {
        let bin = Bin::new(BinId::new(), self.ctx.farm_id(), name, Quantity::from(capacity)).unwrap();
        self.ctx.register_bin(bin).unwrap().id_typed()
    }

    pub fn harvest_event(&self, day: i64) -> HarvestEvent {
        HarvestEvent {
            id: EventId::new(),
            farm_id: self.ctx.farm_id(),
            field_id: self.field_id,
            occurred_at: self.day(day),
        }
    }

    pub fn try_harvest(
        &self,
        day: i64,
        commodity: &str,
        qty: u32,
        bin_id: Option<BinId>,
    ) -> LedgerResult<(Lot, Option<Movement>)> {
        self.ctx.record_harvest(RecordHarvest {
            event: self.harvest_event(day),
            commodity: Commodity::new(commodity)?,
            quantity: Quantity::from(qty),
            bin_id,
        })
    }

    pub fn harvest(&self, day: i64, commodity: &str, qty: u32, bin_id: Option<BinId>) -> Lot {
        self.try_harvest(day, commodity, qty, bin_id).unwrap().0
    }

    pub fn delivery(&self, commodity: &str, qty: u32, disposition: Disposition) -> Delivery {
        Delivery {
            event_id: EventId::new(),
            commodity: Commodity::new(commodity).unwrap(),
            quantity: Quantity::from(qty),
            disposition,
            occurred_at: Utc::now(),
        }
    }

    pub fn deliver(&self, commodity: &str, qty: u32, disposition: Disposition) -> LedgerResult<Vec<Movement>> {
        self.ctx.deliver(self.delivery(commodity, qty, disposition))
    }

    pub fn remaining(&self, lot: &Lot) -> Option<Quantity> {
        self.ctx.lot(lot.id_typed()).unwrap().map(|l| l.remaining())
    }

    pub fn level(&self, bin_id: BinId) -> Quantity {
        self.ctx.bin_level(bin_id).unwrap()
    }

    /// Every lot within `0..=original` and holding no more in bins than it has
    /// left; every bin within `0..=capacity`, matching the level its movements
    /// imply and the sum of what its lots hold in it.
    pub fn assert_invariants(&self) {
        let holdings = self.ctx.holdings().unwrap();
        for lot in self.ctx.lots().unwrap() {
            assert!(lot.remaining() <= lot.original_quantity(), "{lot:?}");
            if let Err(err) = holdings.check(&lot) {
                panic!("{err}: {lot:?}");
            }
        }
        for bin in self.ctx.bins().unwrap() {
            let check = self.ctx.verify_bin(bin.id_typed()).unwrap();
            assert!(check.is_consistent(), "{check:?}");
            assert!(check.cached <= check.capacity, "{check:?}");
            assert_eq!(holdings.bin_total(bin.id_typed()), check.derived, "{check:?}");
        }
    }

    /// What `lot` still holds in `bin_id`.
    pub fn held(&self, lot: &Lot, bin_id: BinId) -> Decimal {
        self.ctx.holdings().unwrap().in_bin(lot.id_typed(), bin_id)
    }

    pub fn transfer(&self, from: BinId, to: BinId, qty: u32) -> LedgerResult<Vec<Movement>> {
        self.ctx.transfer(BinTransfer {
            event_id: EventId::new(),
            from,
            to,
            quantity: Quantity::from(qty),
            occurred_at: Utc::now(),
        })
    }
}
