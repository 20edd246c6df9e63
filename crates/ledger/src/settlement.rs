//! Landlord settlement under a rental agreement.
//!
//! Values are returned at full precision; display rounding belongs to callers.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grainledger_core::{AgreementId, Entity, FieldId, LotId, SharePercentage};

use crate::agreement::{RentTerms, RentalAgreement};
use crate::holdings::LotHoldings;
use crate::lot::Lot;
use crate::movement::Movement;

/// Share-rent settlement for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSettlement {
    pub agreement_id: AgreementId,
    pub field_id: FieldId,
    pub landlord_share: SharePercentage,
    /// Sum of the field's `OUT_OF_BIN` and `DIRECT` allocations.
    pub delivered_quantity: Decimal,
    pub delivered_landlord_share: Decimal,
    /// What the field's lots still hold in bins, net of withdrawals.
    pub in_storage_quantity: Decimal,
    pub in_storage_landlord_share: Decimal,
}

impl ShareSettlement {
    pub fn total_landlord_share(&self) -> Decimal {
        self.delivered_landlord_share + self.in_storage_landlord_share
    }
}

/// Landlord entitlement under an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rent_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Settlement {
    Share(ShareSettlement),
    Cash {
        agreement_id: AgreementId,
        amount: Decimal,
    },
}

/// Compute the landlord entitlement for `agreement`.
///
/// `lots` and `movements` may cover more than the agreement's field; anything
/// not traceable to a lot of that field (and farm) is ignored. Transfer legs
/// never count as deliveries. Stored grain is what each lot still holds in
/// bins, so grain a lot delivered direct never counts as stored.
pub fn settle(agreement: &RentalAgreement, lots: &[Lot], movements: &[Movement]) -> Settlement {
    let landlord_share = match &agreement.terms {
        RentTerms::Cash { amount } => {
            return Settlement::Cash {
                agreement_id: agreement.id,
                amount: *amount,
            };
        }
        RentTerms::Share { landlord_share } => *landlord_share,
    };

    let field_lots: Vec<&Lot> = lots
        .iter()
        .filter(|l| l.farm_id() == agreement.farm_id && l.field_id() == agreement.field_id)
        .collect();
    let field_lot_ids: BTreeSet<LotId> = field_lots.iter().map(|l| l.id_typed()).collect();

    let traced = |m: &&Movement| {
        m.farm_id() == agreement.farm_id
            && m.source_lot_id().is_some_and(|id| field_lot_ids.contains(&id))
    };

    let mut delivered_quantity = Decimal::ZERO;
    let mut delivered_landlord_share = Decimal::ZERO;

    for movement in movements.iter().filter(traced).filter(|m| m.is_allocation()) {
        let quantity = movement.quantity().value();
        delivered_quantity += quantity;
        delivered_landlord_share += landlord_share.share_of(quantity);
    }

    let holdings = LotHoldings::from_movements(movements.iter().filter(traced));
    let in_storage_quantity: Decimal = field_lots
        .iter()
        .map(|l| holdings.binned(l.id_typed()))
        .sum();

    Settlement::Share(ShareSettlement {
        agreement_id: agreement.id,
        field_id: agreement.field_id,
        landlord_share,
        delivered_quantity,
        delivered_landlord_share,
        in_storage_quantity,
        in_storage_landlord_share: landlord_share.share_of(in_storage_quantity),
    })
}
