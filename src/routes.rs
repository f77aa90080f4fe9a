//! HTTP surface: messaging webhook, JSON message endpoint, health.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::intake::{IntakeManager, prompts};

/// User id recorded when the webhook arrives without a sender.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<IntakeManager>,
}

/// Build the Axum router with the webhook, JSON and health routes.
pub fn intake_routes(state: AppState) -> Router {
    Router::new()
        .route("/whatsapp", post(whatsapp_webhook))
        .route("/api/messages", post(post_message))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.manager.config().now();
    Json(serde_json::json!({
        "ok": true,
        "time": now.to_rfc3339_opts(SecondsFormat::Secs, false),
    }))
}

// ── Webhook ─────────────────────────────────────────────────────────────

/// Twilio-style form body. Any other fields the provider sends are ignored.
#[derive(Debug, Deserialize)]
struct WebhookForm {
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

async fn whatsapp_webhook(
    State(state): State<AppState>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let user_id = match form.from.trim() {
        "" => UNKNOWN_SENDER,
        from => from,
    };

    let reply = match state.manager.handle_message(user_id, &form.body).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to handle webhook message");
            prompts::UNAVAILABLE_TEXT.to_string()
        }
    };

    twiml(&reply)
}

/// Wrap a single reply in a TwiML messaging response.
fn twiml(reply: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Message>{}</Message></Response>",
        escape_xml(reply)
    );
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

// ── JSON ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessageRequest {
    sender: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    reply: String,
}

async fn post_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Response {
    let sender = request.sender.trim();
    if sender.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "sender is required"})),
        )
            .into_response();
    }

    match state.manager.handle_message(sender, &request.body).await {
        Ok(reply) => Json(MessageResponse { reply }).into_response(),
        Err(e) => {
            tracing::error!(user_id = sender, error = %e, "Failed to handle message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": prompts::UNAVAILABLE_TEXT})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::BusinessConfig;
    use crate::error::DatabaseError;
    use crate::intake::{BookingRecord, ConversationState, NewBooking};
    use crate::store::{Database, LibSqlBackend};

    /// Storage that fails every call.
    struct BrokenDb;

    #[async_trait]
    impl Database for BrokenDb {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn get_conversation(
            &self,
            _user_id: &str,
        ) -> Result<Option<ConversationState>, DatabaseError> {
            Err(DatabaseError::Query("disk on fire".into()))
        }
        async fn upsert_conversation(&self, _: &ConversationState) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("disk on fire".into()))
        }
        async fn insert_booking(&self, _: &NewBooking) -> Result<BookingRecord, DatabaseError> {
            Err(DatabaseError::Query("disk on fire".into()))
        }
        async fn latest_booking(&self, _: &str) -> Result<Option<BookingRecord>, DatabaseError> {
            Err(DatabaseError::Query("disk on fire".into()))
        }
        async fn confirm_booking(
            &self,
            _: &NewBooking,
            _: &ConversationState,
        ) -> Result<BookingRecord, DatabaseError> {
            Err(DatabaseError::Query("disk on fire".into()))
        }
    }

    fn router_with(db: Arc<dyn Database>) -> Router {
        let manager = IntakeManager::new(db, Arc::new(BusinessConfig::default()));
        intake_routes(AppState {
            manager: Arc::new(manager),
        })
    }

    async fn router() -> Router {
        router_with(Arc::new(LibSqlBackend::new_memory().await.unwrap()))
    }

    fn form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/whatsapp")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn escape_xml_covers_markup() {
        assert_eq!(escape_xml("a & b <c> \"d\" 'e'"), "a &amp; b &lt;c&gt; &quot;d&quot; &apos;e&apos;");
        assert_eq!(escape_xml("✅ plain"), "✅ plain");
    }

    #[tokio::test]
    async fn webhook_replies_with_twiml() {
        let response = router()
            .await
            .oneshot(form("From=whatsapp%3A%2B447700900123&Body=book&MessageSid=SM1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/xml"
        );
        let text = body_text(response).await;
        assert!(text.contains("<Response><Message>Great, let&apos;s book you in"));
        assert_eq!(text.matches("<Message>").count(), 1);
    }

    #[tokio::test]
    async fn webhook_without_sender_uses_unknown() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let app = router_with(db.clone());
        let response = app.oneshot(form("Body=book")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(db.get_conversation(UNKNOWN_SENDER).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn webhook_storage_failure_still_replies() {
        let response = router_with(Arc::new(BrokenDb))
            .oneshot(form("From=u1&Body=hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.contains(&escape_xml(prompts::UNAVAILABLE_TEXT)));
    }

    #[tokio::test]
    async fn json_endpoint_returns_reply() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sender": "u1", "body": "info"}"#))
            .unwrap();
        let response = router().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(json["reply"].as_str().unwrap().contains("Mobile Tyre Fitter Info"));
    }

    #[tokio::test]
    async fn json_endpoint_storage_failure_is_500() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sender": "u1", "body": "hi"}"#))
            .unwrap();
        let response = router_with(Arc::new(BrokenDb)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn json_endpoint_rejects_blank_sender() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sender": "  ", "body": "hi"}"#))
            .unwrap();
        let response = router().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_ok_with_time() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router_with(Arc::new(BrokenDb)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["ok"], true);
        let time = json["time"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok());
        assert!(!time.contains('.'));
    }
}
