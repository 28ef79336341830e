//! Money arithmetic and currency codes.
//!
//! All amounts are `rust_decimal::Decimal` in the store's base currency.
//! Anything that is shown to a customer or stored as a total goes through
//! [`round_money`] first.
//!
//! Amounts are stored as `NUMERIC(12, 2)` and quantities as `NUMERIC(14, 3)`.
//! Client input is checked against those columns before any arithmetic, and
//! sums use checked addition so a hostile cart cannot overflow.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Number of decimal places kept for quantities.
pub const QUANTITY_SCALE: u32 = 3;

/// Largest storable amount, `9999999999.99`.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, MONEY_SCALE);

/// Largest storable quantity, `99999999999.999`.
pub const MAX_QUANTITY: Decimal =
    Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, QUANTITY_SCALE);

/// Round an amount to [`MONEY_SCALE`] places, midpoint away from zero.
///
/// ```
/// use counterline_core::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
/// assert_eq!(round_money(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether `amount` has at most [`MONEY_SCALE`] places and fits a money column.
#[must_use]
pub fn is_storable_money(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE && amount.abs() <= MAX_MONEY
}

/// Whether `quantity` has at most [`QUANTITY_SCALE`] places and fits a
/// quantity column.
#[must_use]
pub fn is_storable_quantity(quantity: Decimal) -> bool {
    quantity.normalize().scale() <= QUANTITY_SCALE && quantity.abs() <= MAX_QUANTITY
}

/// `quantity * unit_price`, rounded.
///
/// `None` when the product overflows or does not fit a money column.
#[must_use]
pub fn checked_line_total(quantity: Decimal, unit_price: Decimal) -> Option<Decimal> {
    quantity
        .checked_mul(unit_price)
        .map(round_money)
        .filter(|total| total.abs() <= MAX_MONEY)
}

/// Sum amounts and round the result.
///
/// `None` when the sum overflows or does not fit a money column.
///
/// ```
/// use counterline_core::{MAX_MONEY, checked_sum_money};
/// use rust_decimal::Decimal;
///
/// assert_eq!(checked_sum_money([Decimal::ONE, Decimal::TWO]), Some(Decimal::new(300, 2)));
/// assert_eq!(checked_sum_money([MAX_MONEY, Decimal::ONE]), None);
/// ```
#[must_use]
pub fn checked_sum_money<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .map(round_money)
        .filter(|total| total.abs() <= MAX_MONEY)
}

/// Error returned when parsing an unknown currency code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported currency code: {0}")]
pub struct CurrencyCodeError(pub String);

/// ISO 4217 currency codes accepted for store and exchange-rate records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    MXN,
    COP,
    VES,
    PEN,
    CLP,
    ARS,
    BRL,
}

impl CurrencyCode {
    /// Every supported code, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::USD,
        Self::EUR,
        Self::GBP,
        Self::CAD,
        Self::MXN,
        Self::COP,
        Self::VES,
        Self::PEN,
        Self::CLP,
        Self::ARS,
        Self::BRL,
    ];

    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::MXN => "MXN",
            Self::COP => "COP",
            Self::VES => "VES",
            Self::PEN => "PEN",
            Self::CLP => "CLP",
            Self::ARS => "ARS",
            Self::BRL => "BRL",
        }
    }

    /// Symbol printed on tickets.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::MXN | Self::COP | Self::CLP | Self::ARS => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::VES => "Bs.",
            Self::PEN => "S/",
            Self::BRL => "R$",
        }
    }

    /// Format an amount for display, e.g. `$12.50`.
    #[must_use]
    pub fn format(self, amount: Decimal) -> String {
        format!("{}{:.2}", self.symbol(), round_money(amount))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| CurrencyCodeError(s.to_string()))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CurrencyCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CurrencyCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CurrencyCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_cent() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(12344, 3)), Decimal::new(1234, 2));
    }

    #[test]
    fn test_sum_money_rounds_once() {
        let total =
            checked_sum_money([Decimal::new(3333, 4), Decimal::new(3333, 4), Decimal::new(3334, 4)]);
        assert_eq!(total, Some(Decimal::new(100, 2)));
    }

    #[test]
    fn test_column_limits() {
        assert_eq!(MAX_MONEY, Decimal::new(999_999_999_999, 2));
        assert_eq!(MAX_QUANTITY, Decimal::new(99_999_999_999_999, 3));
    }

    #[test]
    fn test_storable_money() {
        assert!(is_storable_money(Decimal::new(1050, 2)));
        // Trailing zeros are not extra precision
        assert!(is_storable_money(Decimal::new(10_5000, 4)));
        assert!(!is_storable_money(Decimal::new(4, 3)));
        assert!(!is_storable_money(MAX_MONEY + Decimal::new(1, 2)));
    }

    #[test]
    fn test_storable_quantity() {
        assert!(is_storable_quantity(Decimal::new(1_250, 3)));
        assert!(!is_storable_quantity(Decimal::new(1_0005, 4)));
        assert!(!is_storable_quantity(Decimal::MAX));
    }

    #[test]
    fn test_line_total_overflow_is_none() {
        assert_eq!(
            checked_line_total(Decimal::from(3), Decimal::new(250, 2)),
            Some(Decimal::new(750, 2))
        );
        assert_eq!(checked_line_total(Decimal::MAX, Decimal::TWO), None);
        // Fits a Decimal but not a money column
        assert_eq!(checked_line_total(MAX_QUANTITY, Decimal::TEN), None);
    }

    #[test]
    fn test_sum_overflow_is_none() {
        assert_eq!(checked_sum_money([Decimal::MAX, Decimal::MAX]), None);
    }

    #[test]
    fn test_currency_code_parse_case_insensitive() {
        assert_eq!("ves".parse::<CurrencyCode>().unwrap(), CurrencyCode::VES);
        assert_eq!(" usd ".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_format() {
        assert_eq!(CurrencyCode::USD.format(Decimal::new(125, 1)), "$12.50");
        assert_eq!(CurrencyCode::VES.format(Decimal::new(3, 0)), "Bs.3.00");
    }
}
