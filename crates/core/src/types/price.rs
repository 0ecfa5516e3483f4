//! Non-negative monetary amounts using decimal arithmetic.
//!
//! Prices are never represented as floats. Every line subtotal, bag total and
//! order total in the system is built from [`Price::times`] and summed with
//! [`Price`]'s `Sum` implementation, so totals always equal the sum of their
//! lines exactly.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,

    /// More than two decimal places.
    #[error("price cannot have more than 2 decimal places")]
    TooPrecise,

    /// Above [`Price::MAX_UNIT`].
    #[error("price cannot exceed 99999999.99")]
    TooLarge,
}

/// A non-negative amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest price a single book can carry (`NUMERIC(10, 2)`).
    pub const MAX_UNIT: Self = Self(Decimal::from_parts(0x540B_E3FF, 0x2, 0, false, 2)); // 99_999_999.99

    /// Largest bag or order total that can be stored (`NUMERIC(12, 2)`).
    pub const MAX_TOTAL: Self = Self(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2)); // 9_999_999_999.99

    /// Create a price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Validate a catalog unit price: non-negative, at most two decimal
    /// places and no more than [`Price::MAX_UNIT`].
    ///
    /// # Errors
    ///
    /// Returns the first rule the amount breaks.
    pub fn unit(amount: Decimal) -> Result<Self, PriceError> {
        let price = Self::new(amount)?;
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        if price > Self::MAX_UNIT {
            return Err(PriceError::TooLarge);
        }
        Ok(price)
    }

    /// Whether this amount fits a stored total.
    #[must_use]
    pub fn fits_total(self) -> bool {
        self <= Self::MAX_TOTAL
    }

    /// Create a price from minor units (e.g. cents / paise).
    ///
    /// ```
    /// use bookstore_core::Price;
    ///
    /// assert_eq!(Price::from_minor(1999).to_string(), "Rs. 19.99");
    /// ```
    #[must_use]
    pub fn from_minor(minor: u32) -> Self {
        Self(Decimal::new(i64::from(minor), 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Unit price multiplied by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Subtract, flooring at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl core::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| acc + p)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rs. {:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert_eq!(Price::new(Decimal::new(-1, 2)), Err(PriceError::Negative));
        assert!(Price::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_unit_price_bounds() {
        assert_eq!(
            Price::unit(Decimal::new(9_999_999_999, 2)).unwrap(),
            Price::MAX_UNIT
        );
        assert_eq!(
            Price::unit("123456789012.00".parse().unwrap()),
            Err(PriceError::TooLarge)
        );
        assert_eq!(
            Price::unit(Decimal::new(1005, 3)),
            Err(PriceError::TooPrecise)
        );
        // Trailing zeros are not extra precision
        assert_eq!(
            Price::unit(Decimal::new(12_500, 3)).unwrap(),
            Price::from_minor(1250)
        );
        assert_eq!(Price::unit(Decimal::new(-1, 0)), Err(PriceError::Negative));
    }

    #[test]
    fn test_fits_total() {
        assert!(Price::MAX_UNIT.times(100).fits_total());
        assert!(!Price::MAX_UNIT.times(1000).fits_total());
    }

    #[test]
    fn test_times_and_sum() {
        let lines = [
            Price::from_minor(1250).times(2),
            Price::from_minor(399).times(3),
        ];
        let total: Price = lines.iter().sum();
        assert_eq!(total, Price::from_minor(2500 + 1197));
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Price::from_minor(500);
        let b = Price::from_minor(800);
        assert_eq!(a.saturating_sub(b), Price::ZERO);
        assert_eq!(b.saturating_sub(a), Price::from_minor(300));
    }

    #[test]
    fn test_deserialize_accepts_numbers_and_rejects_negative() {
        let p: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(p, Price::from_minor(1250));
        let p: Price = serde_json::from_str("\"7.25\"").unwrap();
        assert_eq!(p, Price::from_minor(725));
        assert!(serde_json::from_str::<Price>("-3").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_minor(5).to_string(), "Rs. 0.05");
    }
}
