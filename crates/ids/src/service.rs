//! Implementation of record identifiers and document number generators.

use crate::{IdError, IdResult};
use chrono::NaiveDate;
use rand::Rng;
use std::{fmt, str::FromStr};

pub use ::uuid::Uuid;

/// CareLink's canonical record identifier (32 lowercase hex characters, no hyphens).
///
/// Once constructed the inner UUID is known to be valid, and its string form is always the
/// canonical one. Ordering follows the underlying UUID bytes, which lets the entity store keep
/// records in ordered maps.
///
/// # Construction
/// - [`RecordId::new`] allocates a fresh v4 identifier.
/// - [`RecordId::parse`] validates an externally supplied identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordId {
    /// Generates a new identifier in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// # Arguments
    ///
    /// * `input` - Candidate identifier. Must be exactly 32 lowercase hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> IdResult<Self> {
        if !Self::is_canonical(input) {
            return Err(IdError::InvalidInput(format!(
                "id must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| IdError::InvalidInput(e.to_string()))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is exactly 32 characters of `0-9a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An invoice number of the form `INV-YYYYMMDD-NNNN`.
///
/// The date is the issue date and `NNNN` is a random suffix in `1000..=9999`. Uniqueness is
/// not guaranteed by the format alone; the store rejects duplicates at issue time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn generate(issued_on: NaiveDate) -> Self {
        let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
        Self::with_suffix(issued_on, suffix)
    }

    pub(crate) fn with_suffix(issued_on: NaiveDate, suffix: u16) -> Self {
        Self(format!("INV-{}-{:04}", issued_on.format("%Y%m%d"), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment transaction reference: `TXN` followed by 8 uppercase hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Self(format!("TXN{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display_is_canonical() {
        let id = RecordId::new();
        let s = id.to_string();
        assert!(RecordId::is_canonical(&s));
        assert_eq!(RecordId::parse(&s).expect("canonical id should parse"), id);
    }

    #[test]
    fn test_parse_rejects_hyphenated_and_uppercase() {
        assert!(RecordId::parse("550e8400-e29b-41d4-a716-446655440000").is_err());
        assert!(RecordId::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(RecordId::parse("").is_err());
    }

    #[test]
    fn test_record_id_serde_uses_string_form() {
        let id = RecordId::parse("550e8400e29b41d4a716446655440000").expect("valid id");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");
        let bad: Result<RecordId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_invoice_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).expect("valid date");
        assert_eq!(InvoiceNumber::with_suffix(date, 1234).as_str(), "INV-20260309-1234");

        let generated = InvoiceNumber::generate(date);
        let suffix: u16 = generated.as_str()["INV-20260309-".len()..]
            .parse()
            .expect("numeric suffix");
        assert!((1000..=9999).contains(&suffix));
    }

    #[test]
    fn test_transaction_id_format() {
        let txn = TransactionId::generate();
        let s = txn.as_str();
        assert_eq!(s.len(), 11);
        assert!(s.starts_with("TXN"));
        assert!(s[3..]
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')));
    }
}
