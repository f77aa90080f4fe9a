//! Integration tests for the messaging webhook and JSON endpoints.
//!
//! Each test spins up an Axum server on a random port backed by an on-disk
//! libSQL database and drives the real HTTP contract with reqwest.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Days;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use intake_bot::config::BusinessConfig;
use intake_bot::intake::{BudgetTier, IntakeManager, Step};
use intake_bot::routes::{AppState, intake_routes};
use intake_bot::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const SENDER: &str = "whatsapp:+447700900456";

/// Start an Axum server on a random port, return (port, db).
async fn start_server(db_path: &Path) -> (u16, Arc<dyn Database>) {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(db_path).await.unwrap());
    let config = BusinessConfig {
        name: "Test Tyres".to_string(),
        phone: "0121 496 0000".to_string(),
        ..Default::default()
    };
    let manager = Arc::new(IntakeManager::new(Arc::clone(&db), Arc::new(config)));
    let app = intake_routes(AppState { manager });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, db)
}

/// POST one webhook message and return the TwiML body.
async fn send(client: &reqwest::Client, port: u16, body: &str) -> String {
    let resp = client
        .post(format!("http://127.0.0.1:{port}/whatsapp"))
        .form(&[("From", SENDER), ("Body", body), ("NumMedia", "0")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/xml");
    resp.text().await.unwrap()
}

fn future_date(days: u64) -> String {
    let today = BusinessConfig::default().today();
    (today + Days::new(days)).format("%Y-%m-%d").to_string()
}

// ── Webhook Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn webhook_full_booking_flow() {
    timeout(TEST_TIMEOUT, async {
        let tmp = tempfile::tempdir().unwrap();
        let (port, db) = start_server(&tmp.path().join("intake.db")).await;
        let client = reqwest::Client::new();
        let date = future_date(2);

        let menu = send(&client, port, "hello").await;
        assert!(menu.contains("Welcome to Test Tyres"));

        send(&client, port, "book").await;
        send(&client, port, "225/40r18").await;
        send(&client, port, "b742aa").await;
        send(&client, port, "2").await;
        send(&client, port, &date).await;
        let summary = send(&client, port, "10:30").await;
        assert!(summary.contains("Postcode: B74 2AA"));
        assert!(summary.contains("Tyre size: 225/40R18"));

        let confirmed = send(&client, port, "YES").await;
        assert!(confirmed.contains("Booking confirmed!"));

        let booking = db.latest_booking(SENDER).await.unwrap().unwrap();
        assert_eq!(booking.details.budget_tier, BudgetTier::MidRange);
        assert_eq!(booking.details.location_code.as_str(), "B74 2AA");

        let state = db.get_conversation(SENDER).await.unwrap().unwrap();
        assert_eq!(state.step, Step::Menu);
        assert!(state.fields.is_empty());

        let status = send(&client, port, "status").await;
        assert!(status.contains("Status: CONFIRMED"));
        assert!(status.contains(&date));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn webhook_escapes_reply_markup() {
    timeout(TEST_TIMEOUT, async {
        let tmp = tempfile::tempdir().unwrap();
        let (port, _db) = start_server(&tmp.path().join("intake.db")).await;
        let client = reqwest::Client::new();

        let text = send(&client, port, "info").await;
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<Response><Message>"));
        assert!(text.contains("Call/Text: 0121 496 0000"));
        assert!(text.ends_with("</Message></Response>"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn conversation_survives_restart() {
    timeout(TEST_TIMEOUT, async {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("intake.db");
        let client = reqwest::Client::new();

        {
            let (port, _db) = start_server(&db_path).await;
            send(&client, port, "book").await;
            send(&client, port, "205/55R16").await;
        }

        let (port, db) = start_server(&db_path).await;
        let state = db.get_conversation(SENDER).await.unwrap().unwrap();
        assert_eq!(state.step, Step::AskLocation);

        let reply = send(&client, port, "M1 1AE").await;
        assert!(reply.contains("What budget level"));
    })
    .await
    .expect("test timed out");
}

// ── REST Endpoint Tests ──────────────────────────────────────────────

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let tmp = tempfile::tempdir().unwrap();
        let (port, _db) = start_server(&tmp.path().join("intake.db")).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert!(body["time"].is_string());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_message_endpoint_shares_conversation() {
    timeout(TEST_TIMEOUT, async {
        let tmp = tempfile::tempdir().unwrap();
        let (port, _db) = start_server(&tmp.path().join("intake.db")).await;
        let client = reqwest::Client::new();

        send(&client, port, "book").await;

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/messages"))
            .json(&serde_json::json!({"sender": SENDER, "body": "not a size"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        let reply = body["reply"].as_str().unwrap();
        assert!(reply.starts_with("Sorry, I didn't catch that."));
        assert!(reply.contains("What's your tyre size?"));
    })
    .await
    .expect("test timed out");
}
