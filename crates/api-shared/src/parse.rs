//! Field parsers for request bodies and query strings.
//!
//! Every failure is a [`CareError::Validation`] naming the offending field.

use carelink_core::{CareError, CareResult, RecordId};
use carelink_types::Money;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn id(field: &str, value: &str) -> CareResult<RecordId> {
    RecordId::parse(value.trim())
        .map_err(|_| CareError::validation(format!("{field} is not a valid id: '{value}'")))
}

pub fn optional_id(field: &str, value: Option<&str>) -> CareResult<Option<RecordId>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| id(field, v))
        .transpose()
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn date(field: &str, value: &str) -> CareResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| CareError::validation(format!("{field} must be a YYYY-MM-DD date")))
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn time(field: &str, value: &str) -> CareResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| CareError::validation(format!("{field} must be an HH:MM time")))
}

pub fn money(field: &str, value: &str) -> CareResult<Money> {
    value
        .trim()
        .parse()
        .map_err(|_| CareError::validation(format!("{field} must be a non-negative amount")))
}

pub fn decimal(field: &str, value: &str) -> CareResult<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| CareError::validation(format!("{field} must be a number")))
}

/// Parses one of the wire names of a status or type enum (case-insensitive).
pub fn wire<T>(value: &str) -> CareResult<T>
where
    T: FromStr<Err = CareError>,
{
    value.parse()
}

pub fn optional_wire<T>(value: Option<&str>) -> CareResult<Option<T>>
where
    T: FromStr<Err = CareError>,
{
    value.filter(|v| !v.trim().is_empty()).map(wire).transpose()
}
