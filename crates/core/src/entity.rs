//! Entity trait: identity + continuity across state changes.

use crate::error::{LedgerError, LedgerResult};
use crate::id::FarmId;

/// Entity marker + minimal interface.
///
/// Every ledger record lives inside exactly one farm.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the farm that owns this entity.
    fn farm_id(&self) -> FarmId;

    /// Rejects the entity unless it belongs to `farm_id`.
    fn ensure_farm(&self, farm_id: FarmId) -> LedgerResult<()> {
        let found = self.farm_id();
        if found != farm_id {
            return Err(LedgerError::FarmMismatch {
                expected: farm_id,
                found,
            });
        }
        Ok(())
    }
}
