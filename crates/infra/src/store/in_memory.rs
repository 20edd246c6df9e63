use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use grainledger_core::{
    AgreementId, BinId, Commodity, Entity, EventId, FarmId, LedgerError, LedgerResult, LotId,
    MovementId,
};
use grainledger_events::EventEnvelope;
use grainledger_ledger::{Bin, LedgerEvent, Lot, Movement, RentalAgreement, sort_fifo};

use super::{LedgerReader, LedgerWriter, RecordStore};

type Journal = Vec<EventEnvelope<LedgerEvent>>;

/// One farm's records. Cloned into a working copy for every transaction; the
/// journal lives beside them in [`FarmState`] and is never cloned.
#[derive(Debug, Clone)]
struct FarmTables {
    farm_id: FarmId,
    lots: BTreeMap<LotId, Lot>,
    movements: BTreeMap<MovementId, Movement>,
    bins: BTreeMap<BinId, Bin>,
    agreements: BTreeMap<AgreementId, RentalAgreement>,
}

impl FarmTables {
    fn empty(farm_id: FarmId) -> Self {
        Self {
            farm_id,
            lots: BTreeMap::new(),
            movements: BTreeMap::new(),
            bins: BTreeMap::new(),
            agreements: BTreeMap::new(),
        }
    }

    fn movements_where(&self, pred: impl Fn(&Movement) -> bool) -> Vec<Movement> {
        self.movements.values().filter(|m| pred(m)).cloned().collect()
    }

    fn open_lots(&self, commodity: Option<&Commodity>) -> Vec<Lot> {
        let mut open: Vec<Lot> = self
            .lots
            .values()
            .filter(|l| l.is_open())
            .filter(|l| commodity.is_none_or(|c| l.commodity() == c))
            .cloned()
            .collect();
        sort_fifo(&mut open);
        open
    }

    fn lots_for_event(&self, event_id: EventId) -> Vec<Lot> {
        self.lots
            .values()
            .filter(|l| l.event_id() == event_id)
            .cloned()
            .collect()
    }
}

/// Record reads shared by the committed state and a working copy.
macro_rules! read_tables {
    ($tables:ident) => {
        fn farm_id(&self) -> FarmId {
            self.$tables.farm_id
        }

        fn lot(&self, lot_id: LotId) -> Option<Lot> {
            self.$tables.lots.get(&lot_id).cloned()
        }

        fn lots(&self) -> Vec<Lot> {
            self.$tables.lots.values().cloned().collect()
        }

        fn open_lots(&self, commodity: Option<&Commodity>) -> Vec<Lot> {
            self.$tables.open_lots(commodity)
        }

        fn lots_for_event(&self, event_id: EventId) -> Vec<Lot> {
            self.$tables.lots_for_event(event_id)
        }

        fn movement(&self, movement_id: MovementId) -> Option<Movement> {
            self.$tables.movements.get(&movement_id).cloned()
        }

        fn movements(&self) -> Vec<Movement> {
            self.$tables.movements.values().cloned().collect()
        }

        fn movements_for_event(&self, event_id: EventId) -> Vec<Movement> {
            self.$tables.movements_where(|m| m.source_event_id() == event_id)
        }

        fn movements_for_bin(&self, bin_id: BinId) -> Vec<Movement> {
            self.$tables.movements_where(|m| m.bin_id() == Some(bin_id))
        }

        fn movements_for_lot(&self, lot_id: LotId) -> Vec<Movement> {
            self.$tables.movements_where(|m| m.source_lot_id() == Some(lot_id))
        }

        fn bin(&self, bin_id: BinId) -> Option<Bin> {
            self.$tables.bins.get(&bin_id).cloned()
        }

        fn bins(&self) -> Vec<Bin> {
            self.$tables.bins.values().cloned().collect()
        }

        fn agreement(&self, agreement_id: AgreementId) -> Option<RentalAgreement> {
            self.$tables.agreements.get(&agreement_id).cloned()
        }
    };
}

/// Committed state of one farm.
#[derive(Debug)]
struct FarmState {
    tables: FarmTables,
    journal: Journal,
}

impl FarmState {
    fn empty(farm_id: FarmId) -> Self {
        Self {
            tables: FarmTables::empty(farm_id),
            journal: Vec::new(),
        }
    }
}

impl LedgerReader for FarmState {
    read_tables!(tables);

    fn journal(&self) -> Vec<EventEnvelope<LedgerEvent>> {
        self.journal.clone()
    }
}

/// A transaction's view: its own copy of the records, the committed journal
/// by reference, and the entries it has appended so far.
struct WorkingCopy<'a> {
    tables: FarmTables,
    committed: &'a [EventEnvelope<LedgerEvent>],
    pending: Journal,
}

impl LedgerReader for WorkingCopy<'_> {
    read_tables!(tables);

    fn journal(&self) -> Vec<EventEnvelope<LedgerEvent>> {
        self.committed.iter().chain(&self.pending).cloned().collect()
    }
}

impl LedgerWriter for WorkingCopy<'_> {
    fn put_lot(&mut self, lot: Lot) -> LedgerResult<()> {
        lot.ensure_farm(self.tables.farm_id)?;
        self.tables.lots.insert(lot.id_typed(), lot);
        Ok(())
    }

    fn remove_lot(&mut self, lot_id: LotId) -> Option<Lot> {
        self.tables.lots.remove(&lot_id)
    }

    fn insert_movement(&mut self, movement: Movement) -> LedgerResult<()> {
        movement.ensure_farm(self.tables.farm_id)?;
        let id = movement.id_typed();
        if self.tables.movements.contains_key(&id) {
            return Err(LedgerError::conflict(format!("movement {id} already recorded")));
        }
        self.tables.movements.insert(id, movement);
        Ok(())
    }

    fn remove_movement(&mut self, movement_id: MovementId) -> Option<Movement> {
        self.tables.movements.remove(&movement_id)
    }

    fn put_bin(&mut self, bin: Bin) -> LedgerResult<()> {
        bin.ensure_farm(self.tables.farm_id)?;
        self.tables.bins.insert(bin.id_typed(), bin);
        Ok(())
    }

    fn remove_bin(&mut self, bin_id: BinId) -> Option<Bin> {
        self.tables.bins.remove(&bin_id)
    }

    fn put_agreement(&mut self, agreement: RentalAgreement) -> LedgerResult<()> {
        agreement.ensure_farm(self.tables.farm_id)?;
        self.tables.agreements.insert(agreement.id, agreement);
        Ok(())
    }

    fn append(&mut self, event: LedgerEvent) {
        let seq = (self.committed.len() + self.pending.len()) as u64 + 1;
        self.pending
            .push(EventEnvelope::wrap(self.tables.farm_id, seq, event));
    }
}

/// In-memory record store with per-farm transactions.
///
/// Intended for tests/dev and as the reference for host adapters. Each farm's
/// state sits behind its own `RwLock`: a transaction holds the write lock for
/// its whole duration and works on a copy of the records that is swapped in
/// only when the closure succeeds, so a failed transaction leaves nothing
/// behind and readers never see half of one. Journal entries are buffered per
/// transaction and appended on commit.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    farms: RwLock<HashMap<FarmId, Arc<RwLock<FarmState>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_farm(&self, farm_id: FarmId) -> LedgerResult<Option<Arc<RwLock<FarmState>>>> {
        let farms = self
            .farms
            .read()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;
        Ok(farms.get(&farm_id).cloned())
    }

    fn farm(&self, farm_id: FarmId) -> LedgerResult<Arc<RwLock<FarmState>>> {
        if let Some(state) = self.existing_farm(farm_id)? {
            return Ok(state);
        }
        let mut farms = self
            .farms
            .write()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;
        Ok(farms
            .entry(farm_id)
            .or_insert_with(|| Arc::new(RwLock::new(FarmState::empty(farm_id))))
            .clone())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn read<T>(&self, farm_id: FarmId, f: impl FnOnce(&dyn LedgerReader) -> T) -> LedgerResult<T> {
        let Some(state) = self.existing_farm(farm_id)? else {
            return Ok(f(&FarmState::empty(farm_id)));
        };
        let state = state
            .read()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;
        Ok(f(&*state))
    }

    fn transact<T>(
        &self,
        farm_id: FarmId,
        f: impl FnOnce(&mut dyn LedgerWriter) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let state = self.farm(farm_id)?;
        let mut committed = state
            .write()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;

        let mut working = WorkingCopy {
            tables: committed.tables.clone(),
            committed: &committed.journal,
            pending: Vec::new(),
        };
        let out = f(&mut working)?;
        let WorkingCopy { tables, pending, .. } = working;
        committed.tables = tables;
        committed.journal.extend(pending);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use grainledger_core::{FieldId, Quantity};
    use grainledger_ledger::HarvestEvent;

    fn lot(farm_id: FarmId, qty: u32) -> Lot {
        let event = HarvestEvent {
            id: EventId::new(),
            farm_id,
            field_id: FieldId::new(),
            occurred_at: Utc::now(),
        };
        Lot::create(&event, Commodity::new("corn").unwrap(), Quantity::from(qty), Utc::now()).unwrap()
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryRecordStore::new();
        let farm_id = FarmId::new();
        let l = lot(farm_id, 100);

        let err = store
            .transact(farm_id, |tx| {
                tx.put_lot(l.clone())?;
                Err::<(), _>(LedgerError::validation("boom"))
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::validation("boom"));

        let lots = store.read(farm_id, |r| r.lots()).unwrap();
        assert!(lots.is_empty());
    }

    #[test]
    fn farms_are_isolated() {
        let store = InMemoryRecordStore::new();
        let (farm_a, farm_b) = (FarmId::new(), FarmId::new());
        let l = lot(farm_a, 100);

        let err = store.transact(farm_b, |tx| tx.put_lot(l.clone())).unwrap_err();
        assert_eq!(
            err,
            LedgerError::FarmMismatch {
                expected: farm_b,
                found: farm_a
            }
        );

        store.transact(farm_a, |tx| tx.put_lot(l.clone())).unwrap();
        assert_eq!(store.read(farm_a, |r| r.lots().len()).unwrap(), 1);
        assert_eq!(store.read(farm_b, |r| r.lot(l.id_typed())).unwrap(), None);
    }

    #[test]
    fn journal_sequence_is_monotonic_per_farm() {
        let store = InMemoryRecordStore::new();
        let farm_id = FarmId::new();

        for qty in [10, 20] {
            let l = lot(farm_id, qty);
            store
                .transact(farm_id, |tx| {
                    tx.put_lot(l.clone())?;
                    tx.append(LedgerEvent::LotCreated(l.clone()));
                    Ok(())
                })
                .unwrap();
        }

        let journal = store.read(farm_id, |r| r.journal()).unwrap();
        let seqs: Vec<u64> = journal.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(journal.iter().all(|e| e.farm_id() == farm_id));
    }

    #[test]
    fn failed_transaction_appends_nothing_and_sequence_continues() {
        let store = InMemoryRecordStore::new();
        let farm_id = FarmId::new();
        let first = lot(farm_id, 10);
        store
            .transact(farm_id, |tx| {
                tx.append(LedgerEvent::LotCreated(first.clone()));
                Ok(())
            })
            .unwrap();

        let err = store
            .transact(farm_id, |tx| {
                tx.append(LedgerEvent::LotCreated(lot(farm_id, 20)));
                tx.append(LedgerEvent::LotCreated(lot(farm_id, 30)));
                assert_eq!(tx.journal().len(), 3);
                Err::<(), _>(LedgerError::validation("boom"))
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::validation("boom"));
        assert_eq!(store.read(farm_id, |r| r.journal().len()).unwrap(), 1);

        let second = lot(farm_id, 40);
        store
            .transact(farm_id, |tx| {
                tx.append(LedgerEvent::LotCreated(second.clone()));
                Ok(())
            })
            .unwrap();
        let journal = store.read(farm_id, |r| r.journal()).unwrap();
        let seqs: Vec<u64> = journal.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(journal[1].payload(), &LedgerEvent::LotCreated(second));
    }

    #[test]
    fn duplicate_movement_id_conflicts() {
        let store = InMemoryRecordStore::new();
        let farm_id = FarmId::new();
        let m = Movement::inbound(
            farm_id,
            EventId::new(),
            BinId::new(),
            LotId::new(),
            Quantity::from(5),
            Utc::now(),
        )
        .unwrap();

        store.transact(farm_id, |tx| tx.insert_movement(m.clone())).unwrap();
        let err = store.transact(farm_id, |tx| tx.insert_movement(m.clone())).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }
}
