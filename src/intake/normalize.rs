//! Free-text validation for each booking field.
//!
//! Every parser takes the raw message body and returns either the canonical
//! value or an [`InvalidInput`] the state machine turns into a re-prompt.
//! The value types ([`SizeSpec`], [`LocationCode`], [`BudgetTier`]) can only
//! be built by these parsers, so anything stored has passed validation.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{3})/([0-9]{2})[Rr]?([0-9]{2})$").expect("valid size regex")
});

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{1,2}[0-9][A-Z0-9]?) ?([0-9][A-Z]{2})$").expect("valid location regex")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date regex"));

static TIME_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}:[0-9]{2}$").expect("valid time regex"));

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Why a message was rejected for the field being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("not a tyre size")]
    Size,
    #[error("not a postcode")]
    Location,
    #[error("not a budget option")]
    Budget,
    #[error("not a YYYY-MM-DD date")]
    Date,
    #[error("date is in the past")]
    PastDate,
    #[error("not an HH:MM time")]
    Time,
}

/// Canonical tyre size, e.g. `225/40R18`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SizeSpec(String);

impl SizeSpec {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SizeSpec {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_size_spec(&value)
    }
}

impl From<SizeSpec> for String {
    fn from(value: SizeSpec) -> Self {
        value.0
    }
}

/// Canonical postcode, e.g. `B74 2AA`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationCode(String);

impl LocationCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocationCode {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_location_code(&value)
    }
}

impl From<LocationCode> for String {
    fn from(value: LocationCode) -> Self {
        value.0
    }
}

/// The three budget levels a customer can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetTier {
    #[serde(rename = "Budget")]
    Budget,
    #[serde(rename = "Mid-range")]
    MidRange,
    #[serde(rename = "Premium")]
    Premium,
}

impl BudgetTier {
    /// Stored and displayed label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Budget => "Budget",
            Self::MidRange => "Mid-range",
            Self::Premium => "Premium",
        }
    }

    /// Inverse of [`label`](Self::label), used when reading rows back.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Budget" => Some(Self::Budget),
            "Mid-range" => Some(Self::MidRange),
            "Premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts `225/40R18`, `225/40 18`, `225/40r18`, `225 / 40 R 18`.
pub fn parse_size_spec(text: &str) -> Result<SizeSpec, InvalidInput> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = SIZE_PATTERN.captures(&compact).ok_or(InvalidInput::Size)?;
    Ok(SizeSpec(format!("{}/{}R{}", &caps[1], &caps[2], &caps[3])))
}

/// Loose UK postcode match; output is `OUTWARD INWARD` in uppercase.
pub fn parse_location_code(text: &str) -> Result<LocationCode, InvalidInput> {
    let upper = text.trim().to_uppercase();
    let collapsed = WHITESPACE_RUN.replace_all(&upper, " ");
    let caps = LOCATION_PATTERN
        .captures(&collapsed)
        .ok_or(InvalidInput::Location)?;
    Ok(LocationCode(format!("{} {}", &caps[1], &caps[2])))
}

pub fn parse_budget_tier(text: &str) -> Result<BudgetTier, InvalidInput> {
    match text.trim().to_lowercase().as_str() {
        "1" | "budget" => Ok(BudgetTier::Budget),
        "2" | "mid" | "mid-range" => Ok(BudgetTier::MidRange),
        "3" | "premium" => Ok(BudgetTier::Premium),
        _ => Err(InvalidInput::Budget),
    }
}

/// Strict `YYYY-MM-DD`; anything before `today` is rejected.
pub fn parse_date(text: &str, today: NaiveDate) -> Result<NaiveDate, InvalidInput> {
    let t = text.trim();
    if !DATE_SHAPE.is_match(t) {
        return Err(InvalidInput::Date);
    }
    let date = NaiveDate::parse_from_str(t, DATE_FORMAT).map_err(|_| InvalidInput::Date)?;
    if date < today {
        return Err(InvalidInput::PastDate);
    }
    Ok(date)
}

/// Strict 24-hour `HH:MM`.
pub fn parse_time(text: &str) -> Result<NaiveTime, InvalidInput> {
    let t = text.trim();
    if !TIME_SHAPE.is_match(t) {
        return Err(InvalidInput::Time);
    }
    NaiveTime::parse_from_str(t, TIME_FORMAT).map_err(|_| InvalidInput::Time)
}
