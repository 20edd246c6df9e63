use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grainledger_core::{AgreementId, BinId, EventId, LotId, MovementId, Quantity};
use grainledger_events::Event;

use crate::bin::Bin;
use crate::lot::Lot;
use crate::movement::Movement;

/// Why a lot balance moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// FIFO allocation for an outbound movement.
    Allocation,
    /// An outbound movement was deleted and its quantity handed back.
    Reversal,
    /// Explicit correction by the host.
    Correction,
}

/// What triggered a cascade.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum CascadeCause {
    EventDeleted(EventId),
    BinDeleted(BinId),
}

/// Journal record of one committed ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    LotCreated(Lot),
    LotBalanceAdjusted {
        lot_id: LotId,
        delta: Decimal,
        remaining: Quantity,
        reason: AdjustmentReason,
        occurred_at: DateTime<Utc>,
    },
    LotRemoved {
        lot_id: LotId,
        cause: CascadeCause,
        occurred_at: DateTime<Utc>,
    },
    MovementRecorded(Movement),
    MovementRemoved {
        movement_id: MovementId,
        cause: CascadeCause,
        occurred_at: DateTime<Utc>,
    },
    AllocationReversed {
        lot_id: LotId,
        movement_id: MovementId,
        quantity: Quantity,
        occurred_at: DateTime<Utc>,
    },
    BinRegistered {
        bin: Bin,
        occurred_at: DateTime<Utc>,
    },
    BinRemoved {
        bin_id: BinId,
        movements_removed: usize,
        occurred_at: DateTime<Utc>,
    },
    AgreementRegistered {
        agreement_id: AgreementId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::LotCreated(_) => "ledger.lot.created",
            LedgerEvent::LotBalanceAdjusted { .. } => "ledger.lot.balance_adjusted",
            LedgerEvent::LotRemoved { .. } => "ledger.lot.removed",
            LedgerEvent::MovementRecorded(_) => "ledger.movement.recorded",
            LedgerEvent::MovementRemoved { .. } => "ledger.movement.removed",
            LedgerEvent::AllocationReversed { .. } => "ledger.allocation.reversed",
            LedgerEvent::BinRegistered { .. } => "ledger.bin.registered",
            LedgerEvent::BinRemoved { .. } => "ledger.bin.removed",
            LedgerEvent::AgreementRegistered { .. } => "ledger.agreement.registered",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::LotCreated(lot) => lot.created_at(),
            LedgerEvent::MovementRecorded(m) => m.recorded_at(),
            LedgerEvent::LotBalanceAdjusted { occurred_at, .. }
            | LedgerEvent::LotRemoved { occurred_at, .. }
            | LedgerEvent::MovementRemoved { occurred_at, .. }
            | LedgerEvent::AllocationReversed { occurred_at, .. }
            | LedgerEvent::BinRegistered { occurred_at, .. }
            | LedgerEvent::BinRemoved { occurred_at, .. }
            | LedgerEvent::AgreementRegistered { occurred_at, .. } => *occurred_at,
        }
    }
}
