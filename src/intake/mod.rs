//! Conversational booking intake.
//!
//! A user moves through a fixed sequence of questions (tyre size, postcode,
//! budget, date, time), confirms, and a booking is recorded. Each inbound
//! message is one unit of work:
//!
//! 1. [`IntakeManager`] loads the user's [`ConversationState`] (or starts one)
//! 2. [`machine::dispatch`] decides the reply and the new state, touching no storage
//! 3. the manager applies the outcome: persist the state, look up the latest
//!    booking, or commit a confirmed booking

pub mod booking;
pub mod machine;
pub mod manager;
pub mod normalize;
pub mod prompts;
pub mod state;

pub use booking::{BookingDetails, BookingRecord, BookingStatus, NewBooking};
pub use machine::{GlobalCommand, Outcome, dispatch};
pub use manager::IntakeManager;
pub use normalize::{
    BudgetTier, InvalidInput, LocationCode, SizeSpec, parse_budget_tier, parse_date,
    parse_location_code, parse_size_spec, parse_time,
};
pub use state::{CollectedFields, ConversationState, Field, FieldValue, Step, UnknownStep};
