//! Reply text for every step of the intake conversation.

use crate::config::BusinessConfig;

use super::booking::{BookingDetails, BookingRecord};
use super::normalize::{DATE_FORMAT, InvalidInput, TIME_FORMAT};
use super::state::Step;

pub fn menu_text(config: &BusinessConfig) -> String {
    format!(
        "👋 Welcome to {}\n\n\
         Reply with:\n\
         1️⃣ BOOK a fitting\n\
         2️⃣ INFO (prices / service)\n\
         3️⃣ STATUS (check your last booking)\n\n\
         You can also type: MENU, CANCEL",
        config.name
    )
}

pub fn cancelled_text(config: &BusinessConfig) -> String {
    format!("✅ Cancelled. {}", menu_text(config))
}

pub fn info_text(config: &BusinessConfig) -> String {
    let mut text = format!(
        "ℹ️ {} Info\n\n\
         • Areas: {}\n\
         • Call-out fee: {}\n\
         • Payment: {}\n\n\
         {}\n\n\
         To book, reply: 1",
        config.name, config.areas, config.call_out_fee, config.payment_methods, config.info
    );
    if !config.phone.is_empty() {
        text.push_str(&format!("\n\nCall/Text: {}", config.phone));
    }
    text
}

/// The question asked when entering `step`.
pub fn ask_text(step: Step) -> &'static str {
    match step {
        Step::AskSize => {
            "What's your tyre size?\n\
             Example: 225/40R18\n\n\
             Tip: it's printed on the tyre sidewall."
        }
        Step::AskLocation => "What's your postcode? (Example: B74 2AA)",
        Step::AskBudget => {
            "What budget level do you want?\n\
             Reply with:\n\
             1 = Budget\n\
             2 = Mid-range\n\
             3 = Premium"
        }
        Step::AskDate => {
            "What date do you want?\n\
             Reply in this format: YYYY-MM-DD\n\
             Example: 2026-03-05"
        }
        Step::AskTime => {
            "What time suits you?\n\
             Reply in 24h format HH:MM\n\
             Example: 10:30"
        }
        Step::Confirm => CONFIRM_HINT,
        Step::Menu => "Reply MENU to see the options.",
    }
}

pub fn start_booking_text() -> String {
    format!("Great, let's book you in ✅\n\n{}", ask_text(Step::AskSize))
}

/// Corrective hint for a rejected answer.
pub fn hint_text(reason: InvalidInput) -> &'static str {
    match reason {
        InvalidInput::Size => "Sorry, I didn't catch that. Please enter like 225/40R18.",
        InvalidInput::Location => "Please enter a valid UK postcode (example: B74 2AA).",
        InvalidInput::Budget => "Reply 1 (Budget), 2 (Mid-range), or 3 (Premium).",
        InvalidInput::Date | InvalidInput::PastDate => {
            "Please reply with a valid future date in YYYY-MM-DD format. Example: 2026-03-05"
        }
        InvalidInput::Time => "Please reply with time as HH:MM (24h). Example: 10:30",
    }
}

/// Hint followed by the step's question again.
pub fn reprompt_text(step: Step, reason: InvalidInput) -> String {
    format!("{}\n\n{}", hint_text(reason), ask_text(step))
}

pub const CONFIRM_HINT: &str = "Reply YES to confirm, or CANCEL to start over.";

pub const DECLINED_TEXT: &str = "No problem. Reply CANCEL to restart or YES to confirm.";

pub const MATERIALIZE_FAILED_TEXT: &str =
    "Something went wrong saving your booking. Please reply 1 to start again.";

pub const NO_BOOKINGS_TEXT: &str = "You don't have any bookings yet. Reply 1 to book.";

/// Generic reply when storage fails underneath the conversation.
pub const UNAVAILABLE_TEXT: &str =
    "Sorry, we couldn't process your message right now. Please try again in a moment.";

fn details_lines(details: &BookingDetails) -> String {
    format!(
        "Tyre size: {}\n\
         Postcode: {}\n\
         Budget: {}\n\
         Date: {}\n\
         Time: {}",
        details.size_spec,
        details.location_code,
        details.budget_tier,
        details.date.format(DATE_FORMAT),
        details.time.format(TIME_FORMAT),
    )
}

pub fn confirm_text(details: &BookingDetails) -> String {
    format!(
        "✅ Please confirm your booking:\n\n{}\n\n{}",
        details_lines(details),
        CONFIRM_HINT
    )
}

pub fn confirmed_text(booking: &BookingRecord) -> String {
    format!(
        "✅ Booking confirmed!\n\n{}\n\nIf anything changes, reply MENU.",
        details_lines(&booking.details)
    )
}

pub fn status_text(booking: &BookingRecord) -> String {
    format!(
        "📌 Your latest booking:\n\n{}\nStatus: {}\n\nReply MENU to start again.",
        details_lines(&booking.details),
        booking.status
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::intake::booking::NewBooking;
    use crate::intake::normalize::{BudgetTier, parse_location_code, parse_size_spec};

    fn details() -> BookingDetails {
        BookingDetails {
            size_spec: parse_size_spec("225/40R18").unwrap(),
            location_code: parse_location_code("b742aa").unwrap(),
            budget_tier: BudgetTier::MidRange,
            date: NaiveDate::from_ymd_opt(2030, 3, 5).unwrap(),
            time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn menu_uses_business_name() {
        let config = BusinessConfig {
            name: "Tyres R Us".into(),
            ..Default::default()
        };
        assert!(menu_text(&config).contains("Welcome to Tyres R Us"));
        assert!(cancelled_text(&config).starts_with("✅ Cancelled."));
    }

    #[test]
    fn info_includes_phone_only_when_set() {
        let mut config = BusinessConfig {
            areas: "Birmingham".into(),
            call_out_fee: "£15".into(),
            ..Default::default()
        };
        let text = info_text(&config);
        assert!(text.contains("Areas: Birmingham"));
        assert!(text.contains("Call-out fee: £15"));
        assert!(!text.contains("Call/Text"));

        config.phone = "0121 000 0000".into();
        assert!(info_text(&config).ends_with("Call/Text: 0121 000 0000"));
    }

    #[test]
    fn confirm_lists_all_five_fields() {
        let text = confirm_text(&details());
        for needle in ["225/40R18", "B74 2AA", "Mid-range", "2030-03-05", "10:30", CONFIRM_HINT] {
            assert!(text.contains(needle), "missing {needle:?} in {text}");
        }
    }

    #[test]
    fn status_includes_status_line() {
        let record = NewBooking::confirmed("u", details()).with_id(3);
        let text = status_text(&record);
        assert!(text.contains("Status: CONFIRMED"));
        assert!(text.contains("10:30"));
        assert!(confirmed_text(&record).starts_with("✅ Booking confirmed!"));
    }

    #[test]
    fn every_question_step_has_a_prompt() {
        for step in Step::ALL {
            assert!(!ask_text(step).is_empty());
        }
        assert!(ask_text(Step::AskSize).contains("225/40R18"));
        assert!(start_booking_text().ends_with(ask_text(Step::AskSize)));
    }

    #[test]
    fn reprompt_repeats_question_after_hint() {
        let text = reprompt_text(Step::AskBudget, InvalidInput::Budget);
        assert!(text.starts_with(hint_text(InvalidInput::Budget)));
        assert!(text.ends_with(ask_text(Step::AskBudget)));
    }

    #[test]
    fn past_and_malformed_dates_share_a_hint() {
        assert_eq!(hint_text(InvalidInput::Date), hint_text(InvalidInput::PastDate));
    }
}
