//! Confirmed booking records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::{BudgetTier, LocationCode, SizeSpec};

/// Lifecycle of a booking. Only confirmed bookings exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(Self::Confirmed),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// The five answers, all present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub size_spec: SizeSpec,
    pub location_code: LocationCode,
    pub budget_tier: BudgetTier,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// A booking about to be inserted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub details: BookingDetails,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn confirmed(user_id: impl Into<String>, details: BookingDetails) -> Self {
        Self {
            user_id: user_id.into(),
            details,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    /// Attach the id assigned by storage.
    pub fn with_id(self, id: i64) -> BookingRecord {
        BookingRecord {
            id,
            user_id: self.user_id,
            details: self.details,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Stored booking. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: i64,
    pub user_id: String,
    #[serde(flatten)]
    pub details: BookingDetails,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}
