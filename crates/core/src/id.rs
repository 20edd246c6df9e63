//! Strongly-typed identifiers used across the ledger.
//!
//! Every record is keyed by farm plus its own id. Ids of records the ledger
//! creates itself (lots, movements) can be derived deterministically from the
//! originating event so that a replayed operation lands on the same rows.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::value::Commodity;

/// Namespace for UUIDv5 derivations of ledger-owned ids.
const LEDGER_NAMESPACE: Uuid = Uuid::from_u128(0x5f0c_2a7e_91d4_4b63_a8e2_3c1d_7b90_e4f1);

/// Identifier of a farm (the isolation boundary for every read and write).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FarmId(Uuid);

/// Identifier of a field (owned by the host application).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(Uuid);

/// Identifier of a harvest / grain event (owned by the host application).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

/// Identifier of a grain lot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(Uuid);

/// Identifier of a lot movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(Uuid);

/// Identifier of a storage bin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinId(Uuid);

/// Identifier of a rental agreement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| LedgerError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(FarmId, "FarmId");
impl_uuid_newtype!(FieldId, "FieldId");
impl_uuid_newtype!(EventId, "EventId");
impl_uuid_newtype!(LotId, "LotId");
impl_uuid_newtype!(MovementId, "MovementId");
impl_uuid_newtype!(BinId, "BinId");
impl_uuid_newtype!(AgreementId, "AgreementId");

impl LotId {
    /// The lot an event creates for a commodity. Same inputs, same id.
    pub fn for_event(event_id: EventId, commodity: &Commodity) -> Self {
        let name = format!("lot/{}/{}", event_id, commodity);
        Self(Uuid::new_v5(&LEDGER_NAMESPACE, name.as_bytes()))
    }
}

impl MovementId {
    /// A movement produced by `event_id`, distinguished by `discriminator`
    /// (e.g. the allocation index or the target bin).
    pub fn for_event(event_id: EventId, discriminator: &str) -> Self {
        let name = format!("movement/{}/{}", event_id, discriminator);
        Self(Uuid::new_v5(&LEDGER_NAMESPACE, name.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_id_is_stable_per_event_and_commodity() {
        let event = EventId::new();
        let corn = Commodity::new("Corn").unwrap();
        let soy = Commodity::new("soybeans").unwrap();

        assert_eq!(LotId::for_event(event, &corn), LotId::for_event(event, &corn));
        assert_ne!(LotId::for_event(event, &corn), LotId::for_event(event, &soy));
        assert_ne!(
            LotId::for_event(event, &corn),
            LotId::for_event(EventId::new(), &corn)
        );
    }

    #[test]
    fn movement_id_depends_on_discriminator() {
        let event = EventId::new();
        assert_eq!(
            MovementId::for_event(event, "out/0"),
            MovementId::for_event(event, "out/0")
        );
        assert_ne!(
            MovementId::for_event(event, "out/0"),
            MovementId::for_event(event, "out/1")
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<BinId>().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(msg) if msg.starts_with("BinId")));
    }
}
