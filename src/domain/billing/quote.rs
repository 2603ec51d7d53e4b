//! Quote reference numbers for the bank-transfer branch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Reference printed on a quote and quoted back by the learner on the wire
/// transfer, e.g. `Q2026-000042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuoteNumber(String);

impl QuoteNumber {
    /// Builds the reference from the issue year and a store-allocated sequence.
    pub fn issue(year: i32, sequence: u64) -> Self {
        Self(format!("Q{}-{:06}", year, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QuoteNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::invalid_format("quote_number", "expected Q<year>-<sequence>");

        let rest = s.strip_prefix('Q').ok_or_else(invalid)?;
        let (year, sequence) = rest.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence.len() < 6 || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for QuoteNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuoteNumber> for String {
    fn from(value: QuoteNumber) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_pads_sequence() {
        assert_eq!(QuoteNumber::issue(2026, 42).as_str(), "Q2026-000042");
        assert_eq!(QuoteNumber::issue(2026, 1_234_567).as_str(), "Q2026-1234567");
    }

    #[test]
    fn parses_issued_numbers() {
        let issued = QuoteNumber::issue(2027, 7);
        let parsed: QuoteNumber = issued.as_str().parse().unwrap();
        assert_eq!(parsed, issued);
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!("2026-000042".parse::<QuoteNumber>().is_err());
        assert!("Q26-000042".parse::<QuoteNumber>().is_err());
        assert!("Q2026-42".parse::<QuoteNumber>().is_err());
        assert!("Q2026_000042".parse::<QuoteNumber>().is_err());
    }
}
