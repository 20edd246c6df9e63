use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grainledger_core::{AgreementId, Entity, FarmId, FieldId, SharePercentage};

/// How the landlord is paid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentType {
    Share,
    Cash,
}

/// Rent terms; the share percentage only exists for share rent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rent_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentTerms {
    Share { landlord_share: SharePercentage },
    /// Negotiated elsewhere; passed through unchanged.
    Cash { amount: Decimal },
}

impl RentTerms {
    pub fn rent_type(&self) -> RentType {
        match self {
            RentTerms::Share { .. } => RentType::Share,
            RentTerms::Cash { .. } => RentType::Cash,
        }
    }
}

/// Rental agreement governing the landlord share for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalAgreement {
    pub id: AgreementId,
    pub farm_id: FarmId,
    pub field_id: FieldId,
    pub terms: RentTerms,
}

impl Entity for RentalAgreement {
    type Id = AgreementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn farm_id(&self) -> FarmId {
        self.farm_id
    }
}
