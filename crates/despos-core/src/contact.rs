//! # Contact Normalizer
//!
//! Canonicalizes the calendar-date fields of a contact (`date_open`,
//! `birthdate`) on every read.
//!
//! ## Accepted Inputs
//! - `YYYY-MM-DD` (month/day may be one digit)
//! - RFC 3339 timestamps, converted to the local calendar day
//! - `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` without offset
//!
//! ## Output Styles
//! ```text
//! input "1990-01-05"
//!   Legacy → "1990-01-5"    month padded, day NOT padded
//!   Iso    → "1990-01-05"
//! ```
//! `Legacy` reproduces what earlier clients stored and displayed, and is the
//! default so existing listings keep matching.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::Contact;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactDateStyle {
    #[default]
    Legacy,
    Iso,
}

impl ContactDateStyle {
    pub fn format(self, date: NaiveDate) -> String {
        match self {
            ContactDateStyle::Legacy => {
                format!("{}-{:02}-{}", date.year(), date.month(), date.day())
            }
            ContactDateStyle::Iso => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Parses a raw date value into a calendar date.
///
/// Blank input yields `Ok(None)`.
pub fn parse_calendar_date(field: &str, raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Local).date_naive()));
    }

    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Ok(Some(ts.date()));
        }
    }

    Err(ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: format!("'{}' is not a calendar date", raw),
    })
}

fn normalize_field(
    field: &str,
    value: Option<String>,
    style: ContactDateStyle,
) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(raw) => Ok(parse_calendar_date(field, &raw)?.map(|d| style.format(d))),
    }
}

/// Read-side variant of [`normalize_contact`].
///
/// A field that does not parse is kept exactly as stored and reported in
/// the returned list, so one bad row never hides the rest of a listing.
pub fn normalize_contact_lenient(
    mut contact: Contact,
    style: ContactDateStyle,
) -> (Contact, Vec<ValidationError>) {
    let mut issues = Vec::new();

    for (field, value) in [
        ("date_open", &mut contact.date_open),
        ("birthdate", &mut contact.birthdate),
    ] {
        match normalize_field(field, value.clone(), style) {
            Ok(normalized) => *value = normalized,
            Err(e) => issues.push(e),
        }
    }

    (contact, issues)
}

/// Normalizes `date_open` and `birthdate` of a contact.
pub fn normalize_contact(
    mut contact: Contact,
    style: ContactDateStyle,
) -> Result<Contact, ValidationError> {
    contact.date_open = normalize_field("date_open", contact.date_open.take(), style)?;
    contact.birthdate = normalize_field("birthdate", contact.birthdate.take(), style)?;
    Ok(contact)
}
