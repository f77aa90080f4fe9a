//! Conversation state machine: which question a user is on, and what they
//! have answered so far.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::booking::BookingDetails;
use super::normalize::{BudgetTier, LocationCode, SizeSpec};

/// The steps of the booking conversation.
///
/// Progresses linearly: Menu → AskSize → AskLocation → AskBudget → AskDate →
/// AskTime → Confirm, and back to Menu once confirmed or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Menu,
    AskSize,
    AskLocation,
    AskBudget,
    AskDate,
    AskTime,
    Confirm,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Menu,
        Step::AskSize,
        Step::AskLocation,
        Step::AskBudget,
        Step::AskDate,
        Step::AskTime,
        Step::Confirm,
    ];

    /// Next question after a valid answer, if this step collects a field.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            AskSize => Some(AskLocation),
            AskLocation => Some(AskBudget),
            AskBudget => Some(AskDate),
            AskDate => Some(AskTime),
            AskTime => Some(Confirm),
            Menu | Confirm => None,
        }
    }

    /// The field this step collects.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::AskSize => Some(Field::SizeSpec),
            Self::AskLocation => Some(Field::LocationCode),
            Self::AskBudget => Some(Field::BudgetTier),
            Self::AskDate => Some(Field::Date),
            Self::AskTime => Some(Field::Time),
            Self::Menu | Self::Confirm => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "MENU",
            Self::AskSize => "ASK_SIZE",
            Self::AskLocation => "ASK_LOCATION",
            Self::AskBudget => "ASK_BUDGET",
            Self::AskDate => "ASK_DATE",
            Self::AskTime => "ASK_TIME",
            Self::Confirm => "CONFIRM",
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::Menu
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for step names that are not part of the enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step: {0}")]
pub struct UnknownStep(pub String);

impl FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

/// The five booking attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SizeSpec,
    LocationCode,
    BudgetTier,
    Date,
    Time,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::SizeSpec,
        Field::LocationCode,
        Field::BudgetTier,
        Field::Date,
        Field::Time,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SizeSpec => "size_spec",
            Self::LocationCode => "location_code",
            Self::BudgetTier => "budget_tier",
            Self::Date => "date",
            Self::Time => "time",
        }
    }
}

/// One validated answer, tagged by the field it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    SizeSpec(SizeSpec),
    LocationCode(LocationCode),
    BudgetTier(BudgetTier),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            Self::SizeSpec(_) => Field::SizeSpec,
            Self::LocationCode(_) => Field::LocationCode,
            Self::BudgetTier(_) => Field::BudgetTier,
            Self::Date(_) => Field::Date,
            Self::Time(_) => Field::Time,
        }
    }
}

/// Answers collected so far. `None` means not yet asked or cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedFields {
    pub size_spec: Option<SizeSpec>,
    pub location_code: Option<LocationCode>,
    pub budget_tier: Option<BudgetTier>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl CollectedFields {
    pub fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::SizeSpec(v) => self.size_spec = Some(v),
            FieldValue::LocationCode(v) => self.location_code = Some(v),
            FieldValue::BudgetTier(v) => self.budget_tier = Some(v),
            FieldValue::Date(v) => self.date = Some(v),
            FieldValue::Time(v) => self.time = Some(v),
        }
    }

    pub fn is_set(&self, field: Field) -> bool {
        match field {
            Field::SizeSpec => self.size_spec.is_some(),
            Field::LocationCode => self.location_code.is_some(),
            Field::BudgetTier => self.budget_tier.is_some(),
            Field::Date => self.date.is_some(),
            Field::Time => self.time.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| !self.is_set(*f))
    }

    /// Fields still missing, in question order.
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| !self.is_set(*f)).collect()
    }

    /// Snapshot for a booking; `None` unless all five are present.
    pub fn to_details(&self) -> Option<BookingDetails> {
        Some(BookingDetails {
            size_spec: self.size_spec.clone()?,
            location_code: self.location_code.clone()?,
            budget_tier: self.budget_tier?,
            date: self.date?,
            time: self.time?,
        })
    }
}

/// Persisted per-user conversation. One row per `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub step: Step,
    pub fields: CollectedFields,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Fresh idle conversation for a user seen for the first time.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            step: Step::Menu,
            fields: CollectedFields::default(),
            updated_at: Utc::now(),
        }
    }

    /// Back to the menu with every field cleared.
    pub fn reset(&mut self) {
        self.step = Step::Menu;
        self.fields = CollectedFields::default();
    }

    /// Start a new booking: fields cleared, first question next.
    pub fn begin_booking(&mut self) {
        self.fields = CollectedFields::default();
        self.step = Step::AskSize;
    }

    /// Store an answer for the current step and move to the next question.
    ///
    /// Returns `false` (and changes nothing) when the value is not the field
    /// the current step collects.
    pub fn accept(&mut self, value: FieldValue) -> bool {
        let Some(next) = self.step.next() else {
            return false;
        };
        if self.step.field() != Some(value.field()) {
            return false;
        }
        self.fields.set(value);
        self.step = next;
        true
    }

    /// Whether the conversation differs from `other` in anything but the
    /// timestamp.
    pub fn differs_from(&self, other: &ConversationState) -> bool {
        self.user_id != other.user_id || self.step != other.step || self.fields != other.fields
    }
}
