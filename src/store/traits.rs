//! Backend-agnostic `Database` trait: the storage contract the conversation
//! core depends on.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::intake::{BookingRecord, ConversationState, NewBooking};

/// Keyed persistence for conversations (one row per user, upserted) and
/// bookings (append-only).
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    /// Get the conversation for a user, if one has been stored.
    async fn get_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationState>, DatabaseError>;

    /// Insert or replace the user's conversation row.
    async fn upsert_conversation(&self, state: &ConversationState) -> Result<(), DatabaseError>;

    // ── Bookings ────────────────────────────────────────────────────

    /// Append a booking. Returns it with its assigned id.
    async fn insert_booking(&self, booking: &NewBooking) -> Result<BookingRecord, DatabaseError>;

    /// Most recently created booking for a user (highest id).
    async fn latest_booking(&self, user_id: &str)
    -> Result<Option<BookingRecord>, DatabaseError>;

    /// Append `booking` and store `reset` as the user's conversation in one
    /// transaction: either both land or neither does.
    async fn confirm_booking(
        &self,
        booking: &NewBooking,
        reset: &ConversationState,
    ) -> Result<BookingRecord, DatabaseError>;
}
