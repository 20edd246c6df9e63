//! Ledger error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{BinId, FarmId, LotId};

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Every variant is surfaced synchronously by the operation that detected it.
/// Nothing is retried internally and no out-of-range value is ever clamped;
/// the mutation that would have caused it is rejected instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A quantity was zero or negative where a positive amount is required.
    #[error("invalid quantity: {0} (must be greater than zero)")]
    InvalidQuantity(Decimal),

    /// A lot adjustment would leave a negative remaining balance.
    #[error("balance underflow on lot {lot_id}: remaining {remaining}, delta {delta}")]
    BalanceUnderflow {
        lot_id: LotId,
        remaining: Decimal,
        delta: Decimal,
    },

    /// A lot adjustment would push the remaining balance above the original quantity.
    #[error(
        "balance overflow on lot {lot_id}: remaining {remaining} + delta {delta} exceeds original {original}"
    )]
    BalanceOverflow {
        lot_id: LotId,
        remaining: Decimal,
        delta: Decimal,
        original: Decimal,
    },

    /// Open lots cannot cover the requested outbound quantity.
    #[error("insufficient inventory: requested {requested}, short by {shortfall}")]
    InsufficientInventory { requested: Decimal, shortfall: Decimal },

    /// An inbound movement would exceed the bin's capacity.
    #[error("capacity exceeded on bin {bin_id}: level {level} + {quantity} > capacity {capacity}")]
    CapacityExceeded {
        bin_id: BinId,
        level: Decimal,
        quantity: Decimal,
        capacity: Decimal,
    },

    /// A bin level would drop below zero.
    #[error("bin {bin_id} level would drop below zero (resulting level {level})")]
    BinLevelUnderflow { bin_id: BinId, level: Decimal },

    /// More of a lot would leave a bin than the lot ever put into it.
    #[error("lot {lot_id} would hold {held} in bin {bin_id}")]
    LotHoldingUnderflow {
        lot_id: LotId,
        bin_id: BinId,
        held: Decimal,
    },

    /// A lot's binned grain would exceed its remaining balance.
    #[error("lot {lot_id} would hold {held} in bins but has only {remaining} remaining")]
    LotHoldingOverflow {
        lot_id: LotId,
        held: Decimal,
        remaining: Decimal,
    },

    /// A deletion cascade could not be applied as one unit. Fatal; never retried.
    #[error("inconsistent cascade: {0}")]
    InconsistentCascade(String),

    /// A lot cannot be deleted while movements from other events still reference it.
    #[error("lot {lot_id} is still referenced by {movements} movement(s)")]
    LotInUse { lot_id: LotId, movements: usize },

    /// A share percentage outside 0..=100.
    #[error("invalid share percentage: {0}")]
    InvalidPercentage(Decimal),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist in the farm's scope.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A record belonging to one farm was presented to another farm's scope.
    #[error("farm mismatch: expected {expected}, found {found}")]
    FarmMismatch { expected: FarmId, found: FarmId },

    /// A replayed operation disagrees with what was already recorded.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing record store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn cascade(msg: impl Into<String>) -> Self {
        Self::InconsistentCascade(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Errors that indicate the backing state can no longer be trusted.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, Self::InconsistentCascade(_) | Self::Storage(_))
    }
}
