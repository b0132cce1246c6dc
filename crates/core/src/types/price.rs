//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog prices are stored in the backend as `numeric` rupee amounts. The
//! payment gateway wants integer minor units (paise), so conversion lives
//! here, next to the arithmetic that produces order totals.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting a [`Price`] to the gateway's minor units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Gateways reject negative amounts.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount does not fit in an `i64` of minor units.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a zero price in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Create a price from integer minor units (e.g., paise).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, 2), currency_code)
    }

    /// Convert to integer minor units, rounding half away from zero.
    ///
    /// # Errors
    ///
    /// Returns an error for negative amounts or amounts too large for `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        self.amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|minor| minor.to_i64())
            .ok_or(PriceError::OutOfRange(self.amount))
    }

    /// Price for `quantity` units at this unit price.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Sum a sequence of prices, all assumed to share `currency_code`.
    #[must_use]
    pub fn sum<I>(prices: I, currency_code: CurrencyCode) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let amount = prices.into_iter().map(|p| p.amount).sum();
        Self::new(amount, currency_code)
    }

    /// Format for display (e.g., "₹249.00").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
        }
    }

    /// ISO 4217 code, as the payment gateway expects it.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn inr(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap(), CurrencyCode::INR)
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(inr("249").to_minor_units().unwrap(), 24_900);
        assert_eq!(inr("249.99").to_minor_units().unwrap(), 24_999);
        assert_eq!(inr("0").to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        assert_eq!(inr("10.005").to_minor_units().unwrap(), 1_001);
        assert_eq!(inr("10.004").to_minor_units().unwrap(), 1_000);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert!(matches!(
            inr("-1").to_minor_units(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(Price::from_minor_units(149_950, CurrencyCode::INR), inr("1499.50"));
    }

    #[test]
    fn test_line_total_and_sum() {
        let lines = [inr("249").line_total(2), inr("399.50").line_total(1)];
        let total = Price::sum(lines, CurrencyCode::INR);
        assert_eq!(total, inr("897.50"));
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        assert_eq!(
            Price::sum(Vec::new(), CurrencyCode::INR),
            Price::zero(CurrencyCode::INR)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(inr("249").display(), "₹249.00");
        assert_eq!(inr("1499.5").to_string(), "₹1499.50");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!(CurrencyCode::from_str("inr").unwrap(), CurrencyCode::INR);
        assert!(CurrencyCode::from_str("EUR").is_err());
    }
}
