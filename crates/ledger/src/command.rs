//! Requests the host submits to the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grainledger_core::{BinId, Commodity, EventId, Quantity};

use crate::lot::HarvestEvent;
use crate::movement::Disposition;

/// A harvest event: creates the event's lot and, when binned, its inbound movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHarvest {
    pub event: HarvestEvent,
    pub commodity: Commodity,
    pub quantity: Quantity,
    /// `None` when the grain goes straight out of the field.
    pub bin_id: Option<BinId>,
}

/// An outbound delivery or bin withdrawal, satisfied FIFO from open lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub event_id: EventId,
    pub commodity: Commodity,
    pub quantity: Quantity,
    pub disposition: Disposition,
    pub occurred_at: DateTime<Utc>,
}

/// A bin-to-bin move; lot balances are untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinTransfer {
    pub event_id: EventId,
    pub from: BinId,
    pub to: BinId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}
