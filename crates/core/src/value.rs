//! Fixed-point value objects: quantities, share percentages, commodities.
//!
//! Quantities are exact decimals (bushels, or whatever unit the host uses).
//! Nothing here rounds; display rounding is the caller's concern.

use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::value_object::ValueObject;

/// A non-negative grain quantity.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// Any value `>= 0`.
    pub fn new(value: Decimal) -> LedgerResult<Self> {
        if value < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(value));
        }
        Ok(Self(value))
    }

    /// Any value `> 0`. Movements and requests are built from these.
    pub fn positive(value: Decimal) -> LedgerResult<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// `self - other`, or `None` if the result would be negative.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        let diff = self.0 - other.0;
        if diff < Decimal::ZERO { None } else { Some(Quantity(diff)) }
    }
}

impl ValueObject for Quantity {}

impl TryFrom<Decimal> for Quantity {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl From<u32> for Quantity {
    fn from(value: u32) -> Self {
        Quantity(Decimal::from(value))
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, Add::add)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

/// Landlord share as the literal percentage entered (e.g. `33.33`, never `1/3`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct SharePercentage(Decimal);

impl SharePercentage {
    pub fn new(percent: Decimal) -> LedgerResult<Self> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(LedgerError::InvalidPercentage(percent));
        }
        Ok(Self(percent))
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// `percent / 100`, exact.
    pub fn fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// Full-precision share of `amount`.
    pub fn share_of(&self, amount: Decimal) -> Decimal {
        amount * self.fraction()
    }
}

impl ValueObject for SharePercentage {}

impl TryFrom<Decimal> for SharePercentage {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        SharePercentage::new(value)
    }
}

impl From<SharePercentage> for Decimal {
    fn from(value: SharePercentage) -> Self {
        value.0
    }
}

impl core::fmt::Display for SharePercentage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

/// Crop name, normalized to trimmed lowercase so "Corn" and "corn " match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commodity(String);

impl Commodity {
    pub fn new(name: impl AsRef<str>) -> LedgerResult<Self> {
        let normalized = name.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(LedgerError::validation("commodity cannot be empty"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Commodity {}

impl TryFrom<String> for Commodity {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Commodity::new(value)
    }
}

impl From<Commodity> for String {
    fn from(value: Commodity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Commodity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
