use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use grainledger_core::FarmId;

use crate::Event;

/// Envelope for a journaled ledger event.
///
/// This is the unit appended to a farm's journal.
///
/// Notes:
/// - **Farm isolation** is enforced here via `farm_id`.
/// - **Append-only**: `sequence_number` increases monotonically per farm journal,
///   starting at 1.
/// - `event_type` and `event_version` are copied from the payload so consumers can
///   route without deserializing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    farm_id: FarmId,

    /// Monotonically increasing position in the farm journal.
    sequence_number: u64,

    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap `payload` at `sequence_number` of `farm_id`'s journal.
    pub fn wrap(farm_id: FarmId, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            farm_id,
            sequence_number,
            event_type: payload.event_type().to_string(),
            event_version: payload.version(),
            occurred_at: payload.occurred_at(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn farm_id(&self) -> FarmId {
        self.farm_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
