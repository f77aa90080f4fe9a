//! Pure step dispatch: given the stored conversation and one inbound message,
//! decide the new state and the reply.
//!
//! Storage is not touched here. Outcomes that need it ([`Outcome::ShowStatus`],
//! [`Outcome::Confirm`]) are handed back to [`super::IntakeManager`].

use chrono::NaiveDate;

use crate::config::BusinessConfig;

use super::normalize::{
    InvalidInput, parse_budget_tier, parse_date, parse_location_code, parse_size_spec, parse_time,
};
use super::prompts;
use super::state::{ConversationState, Field, FieldValue, Step};

/// Keywords recognised at every step, ahead of step dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCommand {
    Reset,
    Menu,
    Info,
    Status,
}

impl GlobalCommand {
    /// Match a trimmed, lowercased message.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "cancel" | "reset" => Some(Self::Reset),
            "menu" | "start" => Some(Self::Menu),
            "info" | "help" => Some(Self::Info),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Choices only offered from the menu (numeric shortcuts double as budget
/// answers, so they cannot be global).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Book,
    Info,
    Status,
}

impl MenuChoice {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "1" | "book" | "booking" => Some(Self::Book),
            "2" => Some(Self::Info),
            "3" => Some(Self::Status),
            _ => None,
        }
    }
}

/// What the caller must do after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this text; persist the state if it changed.
    Reply(String),
    /// Look up the user's latest booking and summarise it. State unchanged.
    ShowStatus,
    /// Turn the collected fields into a booking, then reset the state.
    Confirm,
}

/// Advance `state` by one inbound message.
pub fn dispatch(
    state: &mut ConversationState,
    body: &str,
    config: &BusinessConfig,
    today: NaiveDate,
) -> Outcome {
    let text = body.trim().to_lowercase();

    if let Some(command) = GlobalCommand::parse(&text) {
        return match command {
            GlobalCommand::Reset => {
                state.reset();
                Outcome::Reply(prompts::cancelled_text(config))
            }
            GlobalCommand::Menu => {
                state.step = Step::Menu;
                Outcome::Reply(prompts::menu_text(config))
            }
            GlobalCommand::Info => Outcome::Reply(prompts::info_text(config)),
            GlobalCommand::Status => Outcome::ShowStatus,
        };
    }

    match state.step {
        Step::Menu => match MenuChoice::parse(&text) {
            Some(MenuChoice::Book) => {
                state.begin_booking();
                Outcome::Reply(prompts::start_booking_text())
            }
            Some(MenuChoice::Info) => Outcome::Reply(prompts::info_text(config)),
            Some(MenuChoice::Status) => Outcome::ShowStatus,
            None => Outcome::Reply(prompts::menu_text(config)),
        },
        Step::Confirm => match text.as_str() {
            "yes" | "y" => Outcome::Confirm,
            "no" | "n" => Outcome::Reply(prompts::DECLINED_TEXT.to_string()),
            _ => Outcome::Reply(prompts::CONFIRM_HINT.to_string()),
        },
        step => {
            let Some(field) = step.field() else {
                return Outcome::Reply(prompts::menu_text(config));
            };
            match parse_answer(field, body, today) {
                Ok(value) => {
                    state.accept(value);
                    Outcome::Reply(question_after(state))
                }
                Err(reason) => {
                    tracing::debug!(
                        user_id = %state.user_id,
                        step = %step,
                        field = field.name(),
                        reason = %reason,
                        "Answer rejected"
                    );
                    Outcome::Reply(prompts::reprompt_text(step, reason))
                }
            }
        }
    }
}

fn parse_answer(field: Field, body: &str, today: NaiveDate) -> Result<FieldValue, InvalidInput> {
    match field {
        Field::SizeSpec => parse_size_spec(body).map(FieldValue::SizeSpec),
        Field::LocationCode => parse_location_code(body).map(FieldValue::LocationCode),
        Field::BudgetTier => parse_budget_tier(body).map(FieldValue::BudgetTier),
        Field::Date => parse_date(body, today).map(FieldValue::Date),
        Field::Time => parse_time(body).map(FieldValue::Time),
    }
}

/// Reply after a field was accepted: the next question, or the summary once
/// everything is in.
fn question_after(state: &ConversationState) -> String {
    match state.step {
        Step::Confirm => match state.fields.to_details() {
            Some(details) => prompts::confirm_text(&details),
            None => prompts::CONFIRM_HINT.to_string(),
        },
        step => prompts::ask_text(step).to_string(),
    }
}
