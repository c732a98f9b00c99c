//! French locale normalization for portal amounts and dates.
//!
//! The portal renders currency as `"1 234,56 €"` (space-grouped thousands,
//! decimal comma, trailing euro sign) and dates as `DD/MM/YYYY`.

use crate::error::{NormalizeError, NormalizeResult};
use chrono::{Months, NaiveDate};

/// Date format used by every table and form field on the portal.
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a portal currency string into a value rounded to cents.
///
/// ```
/// use mgen_core::locale::normalize_amount;
///
/// assert_eq!(normalize_amount("1 234,56 €").unwrap(), 1234.56);
/// assert_eq!(normalize_amount("0,00 €").unwrap(), 0.0);
/// ```
pub fn normalize_amount(text: &str) -> NormalizeResult<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        // no-break and narrow no-break spaces are whitespace too
        .filter(|c| !c.is_whitespace() && *c != '€')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return Err(NormalizeError::MalformedAmount(text.to_string()));
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(round_cents(value)),
        _ => Err(NormalizeError::MalformedAmount(text.to_string())),
    }
}

/// Round to two decimal places, halves away from zero.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a `DD/MM/YYYY` portal date.
pub fn parse_portal_date(text: &str) -> NormalizeResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), PORTAL_DATE_FORMAT)
        .map_err(|_| NormalizeError::MalformedDate(text.to_string()))
}

/// Format a date the way the portal's form fields expect it.
#[must_use]
pub fn format_portal_date(date: NaiveDate) -> String {
    date.format(PORTAL_DATE_FORMAT).to_string()
}

/// Shift a date back by whole calendar months, clamping to month end.
pub fn months_before(date: NaiveDate, months: u32) -> NormalizeResult<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| NormalizeError::MalformedDate(format_portal_date(date)))
}
