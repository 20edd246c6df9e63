use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grainledger_core::{
    BinId, Entity, EventId, FarmId, LedgerError, LedgerResult, LotId, MovementId, Quantity,
};

use crate::fifo::Allocation;

/// Direction of a movement relative to storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    IntoBin,
    OutOfBin,
    Direct,
}

impl MovementKind {
    /// Outbound kinds are the ones produced from a lot allocation.
    pub fn is_outbound(self) -> bool {
        matches!(self, MovementKind::OutOfBin | MovementKind::Direct)
    }
}

/// Where an outbound quantity goes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "bin_id", rename_all = "snake_case")]
pub enum Disposition {
    /// Withdrawn from a bin (`OUT_OF_BIN`).
    FromBin(BinId),
    /// Delivered straight from the field (`DIRECT`).
    Direct,
}

impl Disposition {
    pub fn kind(self) -> MovementKind {
        match self {
            Disposition::FromBin(_) => MovementKind::OutOfBin,
            Disposition::Direct => MovementKind::Direct,
        }
    }

    pub fn bin_id(self) -> Option<BinId> {
        match self {
            Disposition::FromBin(bin_id) => Some(bin_id),
            Disposition::Direct => None,
        }
    }
}

/// One recorded transfer of quantity. Immutable once created; only deleted.
///
/// Outbound movements reference the single lot allocation they were produced
/// from. Transfer legs (bin-to-bin) also name the lot whose grain moved, plus
/// the counterpart bin in `transfer_bin_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    id: MovementId,
    farm_id: FarmId,
    kind: MovementKind,
    bin_id: Option<BinId>,
    source_lot_id: Option<LotId>,
    source_event_id: EventId,
    quantity: Quantity,
    recorded_at: DateTime<Utc>,
    /// Counterpart bin when this movement is one leg of a bin-to-bin transfer.
    transfer_bin_id: Option<BinId>,
}

impl Movement {
    /// `INTO_BIN` for lot `lot_id`.
    pub fn inbound(
        farm_id: FarmId,
        source_event_id: EventId,
        bin_id: BinId,
        lot_id: LotId,
        quantity: Quantity,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        ensure_positive(quantity)?;
        Ok(Self {
            id: MovementId::for_event(source_event_id, &format!("in/{bin_id}/{lot_id}")),
            farm_id,
            kind: MovementKind::IntoBin,
            bin_id: Some(bin_id),
            source_lot_id: Some(lot_id),
            source_event_id,
            quantity,
            recorded_at,
            transfer_bin_id: None,
        })
    }

    /// `OUT_OF_BIN` or `DIRECT` for the `index`-th allocation of an outbound request.
    pub fn outbound(
        farm_id: FarmId,
        source_event_id: EventId,
        disposition: Disposition,
        index: usize,
        lot_id: LotId,
        quantity: Quantity,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        ensure_positive(quantity)?;
        Ok(Self {
            id: MovementId::for_event(source_event_id, &format!("out/{index}")),
            farm_id,
            kind: disposition.kind(),
            bin_id: disposition.bin_id(),
            source_lot_id: Some(lot_id),
            source_event_id,
            quantity,
            recorded_at,
            transfer_bin_id: None,
        })
    }

    /// The two legs moving one lot's share of a bin-to-bin transfer:
    /// `OUT_OF_BIN` from `from`, `INTO_BIN` to `to`, both tagged with the lot.
    pub fn transfer(
        farm_id: FarmId,
        source_event_id: EventId,
        from: BinId,
        to: BinId,
        index: usize,
        allocation: Allocation,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<(Self, Self)> {
        ensure_positive(allocation.quantity)?;
        if from == to {
            return Err(LedgerError::validation("transfer source and target bin are the same"));
        }
        let leg = |kind, bin_id, counterpart, tag: &str| Self {
            id: MovementId::for_event(source_event_id, &format!("{tag}/{index}")),
            farm_id,
            kind,
            bin_id: Some(bin_id),
            source_lot_id: Some(allocation.lot_id),
            source_event_id,
            quantity: allocation.quantity,
            recorded_at,
            transfer_bin_id: Some(counterpart),
        };
        Ok((
            leg(MovementKind::OutOfBin, from, to, "transfer-out"),
            leg(MovementKind::IntoBin, to, from, "transfer-in"),
        ))
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn bin_id(&self) -> Option<BinId> {
        self.bin_id
    }

    pub fn source_lot_id(&self) -> Option<LotId> {
        self.source_lot_id
    }

    pub fn source_event_id(&self) -> EventId {
        self.source_event_id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn transfer_bin_id(&self) -> Option<BinId> {
        self.transfer_bin_id
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer_bin_id.is_some()
    }

    /// A lot allocation (outbound, not a transfer leg).
    pub fn is_allocation(&self) -> bool {
        self.kind.is_outbound() && !self.is_transfer()
    }

    /// Signed effect on `bin_id`'s level (zero for other bins).
    pub fn level_delta(&self, bin_id: BinId) -> Decimal {
        if self.bin_id != Some(bin_id) {
            return Decimal::ZERO;
        }
        match self.kind {
            MovementKind::IntoBin => self.quantity.value(),
            MovementKind::OutOfBin => -self.quantity.value(),
            MovementKind::Direct => Decimal::ZERO,
        }
    }

    /// Same movement as far as a replay is concerned.
    pub fn same_effect(&self, other: &Movement) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.bin_id == other.bin_id
            && self.source_lot_id == other.source_lot_id
            && self.quantity == other.quantity
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn farm_id(&self) -> FarmId {
        self.farm_id
    }
}

fn ensure_positive(quantity: Quantity) -> LedgerResult<()> {
    if !quantity.is_positive() {
        return Err(LedgerError::InvalidQuantity(quantity.value()));
    }
    Ok(())
}

/// Net level of `bin_id` derived from `movements`.
pub fn derive_bin_level<'a>(bin_id: BinId, movements: impl IntoIterator<Item = &'a Movement>) -> Decimal {
    movements.into_iter().map(|m| m.level_delta(bin_id)).sum()
}
