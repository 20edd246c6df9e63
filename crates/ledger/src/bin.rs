use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grainledger_core::{BinId, Entity, FarmId, LedgerError, LedgerResult, Quantity};

/// A physical storage container.
///
/// `current_level` is a cache of the net movements into the bin; the movements
/// are the source of truth. Invariant: `0 <= current_level <= capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    id: BinId,
    farm_id: FarmId,
    name: String,
    capacity: Quantity,
    current_level: Quantity,
}

impl Bin {
    /// A new, empty bin.
    pub fn new(id: BinId, farm_id: FarmId, name: impl Into<String>, capacity: Quantity) -> LedgerResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::validation("bin name cannot be empty"));
        }
        if !capacity.is_positive() {
            return Err(LedgerError::InvalidQuantity(capacity.value()));
        }
        Ok(Self {
            id,
            farm_id,
            name,
            capacity,
            current_level: Quantity::ZERO,
        })
    }

    pub fn id_typed(&self) -> BinId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> Quantity {
        self.capacity
    }

    pub fn current_level(&self) -> Quantity {
        self.current_level
    }

    /// Space left before the bin is full.
    pub fn headroom(&self) -> Quantity {
        self.capacity
            .checked_sub(self.current_level)
            .unwrap_or(Quantity::ZERO)
    }

    /// Raise the cached level by `quantity`, rejecting anything past capacity.
    pub fn admit(&mut self, quantity: Quantity) -> LedgerResult<()> {
        let next = self.current_level + quantity;
        if next > self.capacity {
            return Err(LedgerError::CapacityExceeded {
                bin_id: self.id,
                level: self.current_level.value(),
                quantity: quantity.value(),
                capacity: self.capacity.value(),
            });
        }
        self.current_level = next;
        Ok(())
    }

    /// Lower the cached level by `quantity`, rejecting anything below zero.
    pub fn withdraw(&mut self, quantity: Quantity) -> LedgerResult<()> {
        self.current_level = self.current_level.checked_sub(quantity).ok_or_else(|| {
            LedgerError::BinLevelUnderflow {
                bin_id: self.id,
                level: self.current_level.value() - quantity.value(),
            }
        })?;
        Ok(())
    }

    /// Replace the cached level with one derived from movements.
    pub fn set_level(&mut self, level: Decimal) -> LedgerResult<()> {
        if level < Decimal::ZERO {
            return Err(LedgerError::BinLevelUnderflow { bin_id: self.id, level });
        }
        let level = Quantity::new(level)?;
        if level > self.capacity {
            return Err(LedgerError::CapacityExceeded {
                bin_id: self.id,
                level: self.current_level.value(),
                quantity: level.value() - self.current_level.value(),
                capacity: self.capacity.value(),
            });
        }
        self.current_level = level;
        Ok(())
    }

    /// Change capacity; never below what is already stored.
    pub fn resize(&mut self, capacity: Quantity) -> LedgerResult<()> {
        if !capacity.is_positive() {
            return Err(LedgerError::InvalidQuantity(capacity.value()));
        }
        if capacity < self.current_level {
            return Err(LedgerError::CapacityExceeded {
                bin_id: self.id,
                level: self.current_level.value(),
                quantity: Decimal::ZERO,
                capacity: capacity.value(),
            });
        }
        self.capacity = capacity;
        Ok(())
    }
}

impl Entity for Bin {
    type Id = BinId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn farm_id(&self) -> FarmId {
        self.farm_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(capacity: u32) -> Bin {
        Bin::new(BinId::new(), FarmId::new(), "North 1", Quantity::from(capacity)).unwrap()
    }

    #[test]
    fn admit_rejects_past_capacity_without_clamping() {
        let mut b = bin(1000);
        b.admit(Quantity::from(900)).unwrap();
        let err = b.admit(Quantity::from(101)).unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { .. }));
        assert_eq!(b.current_level(), Quantity::from(900));
        assert_eq!(b.headroom(), Quantity::from(100));
        b.admit(Quantity::from(100)).unwrap();
        assert_eq!(b.headroom(), Quantity::ZERO);
    }

    #[test]
    fn withdraw_rejects_below_zero() {
        let mut b = bin(1000);
        b.admit(Quantity::from(10)).unwrap();
        let err = b.withdraw(Quantity::from(11)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::BinLevelUnderflow {
                bin_id: b.id_typed(),
                level: Decimal::from(-1)
            }
        );
        assert_eq!(b.current_level(), Quantity::from(10));
    }

    #[test]
    fn resize_cannot_drop_below_level() {
        let mut b = bin(1000);
        b.admit(Quantity::from(600)).unwrap();
        assert!(b.resize(Quantity::from(500)).is_err());
        b.resize(Quantity::from(600)).unwrap();
        assert_eq!(b.capacity(), Quantity::from(600));
    }

    #[test]
    fn set_level_validates_range() {
        let mut b = bin(100);
        assert!(matches!(
            b.set_level(Decimal::from(-5)),
            Err(LedgerError::BinLevelUnderflow { .. })
        ));
        assert!(matches!(
            b.set_level(Decimal::from(101)),
            Err(LedgerError::CapacityExceeded { .. })
        ));
        b.set_level(Decimal::from(40)).unwrap();
        assert_eq!(b.current_level(), Quantity::from(40));
    }
}
