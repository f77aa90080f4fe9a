//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Column names are fixed in
//! this module; nothing caller-supplied is spliced into SQL.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::intake::normalize::{DATE_FORMAT, TIME_FORMAT};
use crate::intake::{
    BookingDetails, BookingRecord, BookingStatus, BudgetTier, CollectedFields, ConversationState,
    NewBooking, Step, parse_location_code, parse_size_spec,
};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Every
/// statement runs under `conn_lock`, so nothing else touches the shared
/// connection while the confirm transaction is open: writes cannot join it
/// and reads never see its uncommitted rows.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    conn_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            conn_lock: Mutex::new(()),
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime() output
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Read a nullable text column. NULL and non-text both read as `None`.
fn opt_column(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

/// Re-validate a stored field. A value that no longer parses is dropped so
/// the conversation never carries invalid data.
fn revalidate<T, E>(
    user_id: &str,
    column: &str,
    raw: Option<String>,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Option<T> {
    let raw = raw?;
    match parse(&raw) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(user_id, column, value = %raw, "Dropping invalid stored field");
            None
        }
    }
}

fn parse_stored_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
}

fn parse_stored_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
}

/// Map a libsql Row to a ConversationState.
///
/// Column order matches CONVERSATION_COLUMNS:
/// 0:user_id, 1:step, 2:size_spec, 3:location_code, 4:budget_tier,
/// 5:preferred_date, 6:preferred_time, 7:updated_at
fn row_to_conversation(row: &libsql::Row) -> Result<ConversationState, libsql::Error> {
    let user_id: String = row.get(0)?;
    let step_str: String = row.get(1)?;
    let updated_str: String = row.get(7)?;

    let step = step_str.parse::<Step>().unwrap_or_else(|e| {
        warn!(user_id = %user_id, error = %e, "Unknown stored step, resetting to menu");
        Step::Menu
    });

    let fields = CollectedFields {
        size_spec: revalidate(&user_id, "size_spec", opt_column(row, 2), parse_size_spec),
        location_code: revalidate(&user_id, "location_code", opt_column(row, 3), parse_location_code),
        budget_tier: revalidate(&user_id, "budget_tier", opt_column(row, 4), |s| {
            BudgetTier::from_label(s).ok_or(())
        }),
        date: revalidate(&user_id, "preferred_date", opt_column(row, 5), parse_stored_date),
        time: revalidate(&user_id, "preferred_time", opt_column(row, 6), parse_stored_time),
    };

    Ok(ConversationState {
        user_id,
        step,
        fields,
        updated_at: parse_datetime(&updated_str),
    })
}

fn serialization(column: &str, value: &str) -> DatabaseError {
    DatabaseError::Serialization(format!("invalid {column} in bookings row: {value:?}"))
}

/// Map a libsql Row to a BookingRecord.
///
/// Column order matches BOOKING_COLUMNS:
/// 0:id, 1:user_id, 2:size_spec, 3:location_code, 4:budget_tier,
/// 5:preferred_date, 6:preferred_time, 7:status, 8:created_at
fn row_to_booking(row: &libsql::Row) -> Result<BookingRecord, DatabaseError> {
    let text = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))
    };

    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
    let size = text(2)?;
    let location = text(3)?;
    let budget = text(4)?;
    let date = text(5)?;
    let time = text(6)?;
    let status = text(7)?;

    let details = BookingDetails {
        size_spec: parse_size_spec(&size).map_err(|_| serialization("size_spec", &size))?,
        location_code: parse_location_code(&location)
            .map_err(|_| serialization("location_code", &location))?,
        budget_tier: BudgetTier::from_label(&budget)
            .ok_or_else(|| serialization("budget_tier", &budget))?,
        date: parse_stored_date(&date).map_err(|_| serialization("preferred_date", &date))?,
        time: parse_stored_time(&time).map_err(|_| serialization("preferred_time", &time))?,
    };

    Ok(BookingRecord {
        id,
        user_id: text(1)?,
        details,
        status: status
            .parse::<BookingStatus>()
            .map_err(DatabaseError::Serialization)?,
        created_at: parse_datetime(&text(8)?),
    })
}

const CONVERSATION_COLUMNS: &str = "user_id, step, size_spec, location_code, budget_tier, preferred_date, preferred_time, updated_at";

const BOOKING_COLUMNS: &str = "id, user_id, size_spec, location_code, budget_tier, preferred_date, preferred_time, status, created_at";

async fn upsert_conversation_on(
    conn: &Connection,
    state: &ConversationState,
) -> Result<(), DatabaseError> {
    let fields = &state.fields;
    conn.execute(
        &format!(
            "INSERT INTO conversations ({CONVERSATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (user_id) DO UPDATE SET
                step = excluded.step,
                size_spec = excluded.size_spec,
                location_code = excluded.location_code,
                budget_tier = excluded.budget_tier,
                preferred_date = excluded.preferred_date,
                preferred_time = excluded.preferred_time,
                updated_at = excluded.updated_at"
        ),
        params![
            state.user_id.as_str(),
            state.step.as_str(),
            opt_text_owned(fields.size_spec.as_ref().map(|v| v.to_string())),
            opt_text_owned(fields.location_code.as_ref().map(|v| v.to_string())),
            opt_text_owned(fields.budget_tier.map(|v| v.label().to_string())),
            opt_text_owned(fields.date.map(|d| d.format(DATE_FORMAT).to_string())),
            opt_text_owned(fields.time.map(|t| t.format(TIME_FORMAT).to_string())),
            state.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("upsert_conversation: {e}")))?;

    debug!(user_id = %state.user_id, step = %state.step, "Conversation upserted");
    Ok(())
}

async fn insert_booking_on(
    conn: &Connection,
    booking: &NewBooking,
) -> Result<BookingRecord, DatabaseError> {
    let details = &booking.details;
    let mut rows = conn
        .query(
            "INSERT INTO bookings (user_id, size_spec, location_code, budget_tier,
                preferred_date, preferred_time, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING id",
            params![
                booking.user_id.as_str(),
                details.size_spec.as_str(),
                details.location_code.as_str(),
                details.budget_tier.label(),
                details.date.format(DATE_FORMAT).to_string(),
                details.time.format(TIME_FORMAT).to_string(),
                booking.status.as_str(),
                booking.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_booking: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_booking: {e}")))?
        .ok_or_else(|| DatabaseError::Query("insert_booking: no id returned".to_string()))?;
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("insert_booking id: {e}")))?;

    Ok(booking.clone().with_id(id))
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Conversations ───────────────────────────────────────────────

    async fn get_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationState>, DatabaseError> {
        let _guard = self.conn_lock.lock().await;
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let state = row_to_conversation(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_conversation: {e}"))),
        }
    }

    async fn upsert_conversation(&self, state: &ConversationState) -> Result<(), DatabaseError> {
        let _guard = self.conn_lock.lock().await;
        upsert_conversation_on(self.conn(), state).await
    }

    // ── Bookings ────────────────────────────────────────────────────

    async fn insert_booking(&self, booking: &NewBooking) -> Result<BookingRecord, DatabaseError> {
        let _guard = self.conn_lock.lock().await;
        let record = insert_booking_on(self.conn(), booking).await?;
        debug!(booking_id = record.id, user_id = %record.user_id, "Booking inserted into DB");
        Ok(record)
    }

    async fn latest_booking(
        &self,
        user_id: &str,
    ) -> Result<Option<BookingRecord>, DatabaseError> {
        let _guard = self.conn_lock.lock().await;
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY id DESC LIMIT 1"
                ),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_booking: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_booking(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("latest_booking: {e}"))),
        }
    }

    async fn confirm_booking(
        &self,
        booking: &NewBooking,
        reset: &ConversationState,
    ) -> Result<BookingRecord, DatabaseError> {
        let _guard = self.conn_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("confirm_booking begin: {e}")))?;

        let result = async {
            let record = insert_booking_on(&tx, booking).await?;
            upsert_conversation_on(&tx, reset).await?;
            Ok::<_, DatabaseError>(record)
        }
        .await;

        match result {
            Ok(record) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("confirm_booking commit: {e}")))?;
                debug!(booking_id = record.id, user_id = %record.user_id, "Booking committed");
                Ok(record)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "confirm_booking rollback failed");
                }
                Err(e)
            }
        }
    }
}
