//! VAT rate and the HT / VAT / TTC breakdown.
//!
//! The breakdown is computed once, in integer minor units, and the same value
//! is handed to the in-app summary and to every rendered document so the two
//! can never disagree by a cent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Money, ValidationError};

const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// A VAT rate held in basis points (2000 = 20%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VatRate(u32);

impl VatRate {
    /// Creates a rate from basis points, rejecting anything above 100%.
    pub fn from_basis_points(bp: u32) -> Result<Self, ValidationError> {
        if i64::from(bp) > BASIS_POINTS_PER_UNIT {
            return Err(ValidationError::out_of_range(
                "vat_rate",
                0,
                BASIS_POINTS_PER_UNIT,
                i64::from(bp),
            ));
        }
        Ok(Self(bp))
    }

    /// Creates a rate from a fraction such as `0.20`.
    pub fn from_fraction(rate: f64) -> Result<Self, ValidationError> {
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(ValidationError::invalid_format(
                "vat_rate",
                format!("must be a fraction between 0 and 1, got {}", rate),
            ));
        }
        Self::from_basis_points((rate * BASIS_POINTS_PER_UNIT as f64).round() as u32)
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    /// VAT owed on an amount, rounded half-up to the nearest minor unit.
    pub fn tax_on(&self, amount: &Money) -> Money {
        let product = i128::from(amount.minor_units()) * i128::from(self.0);
        let divisor = i128::from(BASIS_POINTS_PER_UNIT);
        let half = divisor / 2;
        let rounded = if product >= 0 {
            (product + half) / divisor
        } else {
            (product - half) / divisor
        };
        Money::from_minor(rounded as i64, amount.currency())
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

/// Pre-tax, tax and tax-inclusive figures for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBreakdown {
    /// Pre-tax amount (HT).
    pub ht: Money,
    /// Tax amount.
    pub vat: Money,
    /// Tax-inclusive total (TTC).
    pub ttc: Money,
    pub vat_rate: VatRate,
}

impl AmountBreakdown {
    /// Computes the breakdown for a pre-tax price.
    pub fn compute(ht: Money, vat_rate: VatRate) -> Self {
        let vat = vat_rate.tax_on(&ht);
        let ttc = Money::from_minor(ht.minor_units() + vat.minor_units(), ht.currency());
        Self {
            ht,
            vat,
            ttc,
            vat_rate,
        }
    }

    /// The amount actually charged.
    pub fn amount_due(&self) -> Money {
        self.ttc
    }
}
