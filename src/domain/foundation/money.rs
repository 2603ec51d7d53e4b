//! Money and currency value objects.
//!
//! Amounts are integer minor units (cents). Currencies are a hard partition:
//! no conversion exists anywhere in the crate, and arithmetic across two
//! currencies is refused rather than coerced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// ISO 4217 currencies a session may be priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
    Chf,
    Cad,
}

impl Currency {
    /// Three-letter ISO code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Chf => "CHF",
            Currency::Cad => "CAD",
        }
    }

    /// Lowercase code as expected by card gateways.
    pub fn gateway_code(&self) -> String {
        self.code().to_lowercase()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "CHF" => Ok(Currency::Chf),
            "CAD" => Ok(Currency::Cad),
            other => Err(ValidationError::invalid_format(
                "currency",
                format!("unsupported currency '{}'", other),
            )),
        }
    }
}

/// An amount of money in minor units of a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: i64,
    currency: Currency,
}

impl Money {
    /// Creates an amount from minor units (e.g. cents).
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Creates an amount from whole major units (e.g. euros).
    pub fn from_major(major_units: i64, currency: Currency) -> Self {
        Self::from_minor(major_units * 100, currency)
    }

    /// Zero in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Adds two amounts of the same currency.
    ///
    /// Returns `None` on currency mismatch or overflow.
    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor_units
            .checked_add(other.minor_units)
            .map(|sum| Money::from_minor(sum, self.currency))
    }

    /// Decimal string with exactly two fraction digits, e.g. `1200.00`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_parses_case_insensitively() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!(" CHF ".parse::<Currency>().unwrap(), Currency::Chf);
        assert!("XYZ".parse::<Currency>().is_err());
    }

    #[test]
    fn currency_serializes_as_iso_code() {
        assert_eq!(serde_json::to_string(&Currency::Gbp).unwrap(), "\"GBP\"");
    }

    #[test]
    fn money_formats_two_decimals() {
        assert_eq!(Money::from_minor(120_000, Currency::Eur).to_string(), "1200.00 EUR");
        assert_eq!(Money::from_minor(5, Currency::Usd).to_decimal_string(), "0.05");
        assert_eq!(Money::from_minor(-1_050, Currency::Usd).to_decimal_string(), "-10.50");
    }

    #[test]
    fn checked_add_refuses_currency_mismatch() {
        let eur = Money::from_major(10, Currency::Eur);
        let usd = Money::from_major(10, Currency::Usd);
        assert!(eur.checked_add(&usd).is_none());
        assert_eq!(
            eur.checked_add(&eur),
            Some(Money::from_major(20, Currency::Eur))
        );
    }
}
