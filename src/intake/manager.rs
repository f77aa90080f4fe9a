//! IntakeManager: applies dispatch outcomes against storage.

use std::sync::Arc;

use chrono::Utc;

use crate::config::BusinessConfig;
use crate::error::DatabaseError;
use crate::store::Database;

use super::booking::NewBooking;
use super::machine::{Outcome, dispatch};
use super::prompts;
use super::state::ConversationState;

/// Handles one inbound message per call: load, dispatch, write back.
///
/// Holds no per-user state of its own; every call reads the conversation
/// fresh from storage, so any number of handlers can share one manager.
pub struct IntakeManager {
    db: Arc<dyn Database>,
    config: Arc<BusinessConfig>,
}

impl IntakeManager {
    pub fn new(db: Arc<dyn Database>, config: Arc<BusinessConfig>) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &BusinessConfig {
        &self.config
    }

    /// Process one message from `user_id` and return the reply text.
    ///
    /// Invalid answers are not errors; they produce a re-prompt. `Err` means
    /// storage failed and nothing is known about what was persisted beyond
    /// the confirm transaction being all-or-nothing.
    pub async fn handle_message(&self, user_id: &str, body: &str) -> Result<String, DatabaseError> {
        let (loaded, is_new) = match self.db.get_conversation(user_id).await? {
            Some(state) => (state, false),
            None => (ConversationState::new(user_id), true),
        };

        let mut state = loaded.clone();
        let outcome = dispatch(&mut state, body, &self.config, self.config.today());

        tracing::debug!(
            user_id,
            from = %loaded.step,
            to = %state.step,
            "Message dispatched"
        );

        match outcome {
            Outcome::Reply(reply) => {
                if is_new || state.differs_from(&loaded) {
                    state.updated_at = Utc::now();
                    self.db.upsert_conversation(&state).await?;
                }
                Ok(reply)
            }
            Outcome::ShowStatus => {
                if is_new {
                    self.db.upsert_conversation(&state).await?;
                }
                match self.db.latest_booking(user_id).await? {
                    Some(booking) => Ok(prompts::status_text(&booking)),
                    None => Ok(prompts::NO_BOOKINGS_TEXT.to_string()),
                }
            }
            Outcome::Confirm => self.confirm(state).await,
        }
    }

    async fn confirm(&self, mut state: ConversationState) -> Result<String, DatabaseError> {
        let details = state.fields.to_details();
        let missing = state.fields.missing();
        state.reset();
        state.updated_at = Utc::now();

        let Some(details) = details else {
            tracing::warn!(
                user_id = %state.user_id,
                ?missing,
                "Confirm reached with incomplete fields, resetting"
            );
            self.db.upsert_conversation(&state).await?;
            return Ok(prompts::MATERIALIZE_FAILED_TEXT.to_string());
        };

        let booking = NewBooking::confirmed(state.user_id.clone(), details);
        let record = self.db.confirm_booking(&booking, &state).await?;

        tracing::info!(
            booking_id = record.id,
            user_id = %record.user_id,
            size = %record.details.size_spec,
            location = %record.details.location_code,
            "Booking confirmed"
        );
        Ok(prompts::confirmed_text(&record))
    }
}
