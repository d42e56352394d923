//! HTTP-level tests against the full router with in-process collaborators.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use nagpur_events_server::auth::{Claims, SessionKeys, SESSION_COOKIE};
use nagpur_events_server::config::BucketConfig;
use nagpur_events_server::mocks::{self, RecordingNotifier, StaticGateway};
use nagpur_events_server::models::{Event, Role, User};
use nagpur_events_server::routes::create_routes;
use nagpur_events_server::services::fonts::FontStyle;
use nagpur_events_server::services::pdf::DocumentRenderer;
use nagpur_events_server::services::signature::{sign, SignatureVerifier};
use nagpur_events_server::services::MemoryObjectStore;
use nagpur_events_server::state::{AppState, Collaborators};
use nagpur_events_server::store::MemoryLedger;

const KEY_SECRET: &[u8] = b"rzp_key_secret";
const WEBHOOK_SECRET: &[u8] = b"rzp_webhook_secret";
const SESSION_SECRET: &[u8] = b"session_secret";

struct TestApp {
    router: Router,
    ledger: MemoryLedger,
    store: MemoryObjectStore,
    gateway: StaticGateway,
    notifier: RecordingNotifier,
    sessions: SessionKeys,
    user: User,
    other: User,
    admin: User,
    event: Event,
}

impl TestApp {
    fn new() -> Self {
        let ledger = MemoryLedger::new();
        let user = mocks::user("Asha Deshmukh", "asha@example.com", Role::User);
        let other = mocks::user("Rohan Kale", "rohan@example.com", Role::User);
        let admin = mocks::user("Gate Admin", "admin@example.com", Role::Admin);
        let event = mocks::event("Orange City Music Festival", Decimal::new(2499, 0));
        for u in [&user, &other, &admin] {
            ledger.insert_user(u.clone());
        }
        ledger.insert_event(event.clone());

        let store = MemoryObjectStore::new();
        let gateway = StaticGateway::new();
        let notifier = RecordingNotifier::new();
        let sessions = SessionKeys::new(SESSION_SECRET);

        let state = AppState::new(
            Collaborators {
                ledger: Arc::new(ledger.clone()),
                store: Arc::new(store.clone()),
                notifier: Arc::new(notifier.clone()),
                gateway: Arc::new(gateway.clone()),
                renderer: Arc::new(DocumentRenderer::new(FontStyle::builtin())),
            },
            SignatureVerifier::new(KEY_SECRET, WEBHOOK_SECRET),
            sessions.clone(),
            BucketConfig::default(),
        );

        Self {
            router: create_routes(state, false, None),
            ledger,
            store,
            gateway,
            notifier,
            sessions,
            user,
            other,
            admin,
            event,
        }
    }

    fn token_for(&self, user: &User) -> String {
        self.sessions
            .issue(&Claims {
                id: user.id,
                email: user.email.clone(),
                role: user.role,
                name: user.name.clone(),
                exp: Utc::now().timestamp() + 3600,
            })
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        session: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = session {
            builder = builder.header(
                header::COOKIE,
                format!("{}={}", SESSION_COOKIE, self.token_for(user)),
            );
        }
        let request = match body {
            Some(payload) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&payload).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, _, bytes) = self.send(request).await;
        let parsed = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, parsed)
    }

    async fn webhook(&self, body: &Value, secret: &[u8]) -> (StatusCode, Value) {
        let bytes = serde_json::to_vec(body).unwrap();
        let signature = sign(secret, &[bytes.as_slice()]).unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/razorpay/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-razorpay-signature", signature)
            .body(Body::from(bytes))
            .unwrap();

        let (status, _, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn checkout_body(&self, payment_id: &str) -> Value {
        let signature = sign(KEY_SECRET, &[format!("order_abc|{payment_id}").as_bytes()]).unwrap();
        json!({
            "razorpay_order_id": "order_abc",
            "razorpay_payment_id": payment_id,
            "razorpay_signature": signature,
            "eventId": self.event.id,
            "amount": 2499
        })
    }

    fn captured_event(&self, payment_id: &str, event_id: Uuid) -> Value {
        json!({
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": payment_id,
                        "order_id": "order_abc",
                        "amount": 249900,
                        "currency": "INR",
                        "notes": {
                            "eventId": event_id.to_string(),
                            "userId": self.user.id.to_string(),
                            "quantity": "1"
                        }
                    }
                }
            }
        })
    }

    async fn issue_via_checkout(&self, payment_id: &str) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/razorpay/verify-payment",
                Some(&self.user),
                Some(self.checkout_body(payment_id)),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["booking"].clone()
    }
}

#[tokio::test]
async fn health_check_reports_ok_with_security_headers() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn verify_payment_issues_once_and_is_idempotent() {
    let app = TestApp::new();
    let first = app.issue_via_checkout("pay_abc").await;
    let second = app.issue_via_checkout("pay_abc").await;

    assert_eq!(first["bookingId"], second["bookingId"]);
    assert_eq!(first["entryStatus"], "NOT_USED");
    assert_eq!(first["status"], "completed");
    assert!(first["ticketId"].as_str().unwrap().starts_with("NE-"));
    assert_eq!(app.ledger.payments().len(), 1);
    assert_eq!(app.ledger.bookings().len(), 1);
    assert_eq!(app.notifier.sent().len(), 1);
    assert_eq!(app.store.len(), 3);
}

#[tokio::test]
async fn verify_payment_requires_session() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/razorpay/verify-payment",
            None,
            Some(app.checkout_body("pay_abc")),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
    assert!(app.ledger.payments().is_empty());
}

#[tokio::test]
async fn verify_payment_rejects_bad_signature_without_side_effects() {
    let app = TestApp::new();
    let mut body = app.checkout_body("pay_abc");
    body["razorpay_signature"] = json!(hex_of_zeroes());

    let (status, response) = app
        .json(
            Method::POST,
            "/api/razorpay/verify-payment",
            Some(&app.user),
            Some(body),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);
    assert_eq!(response["error"]["code"], "INVALID_SIGNATURE");
    assert!(app.ledger.payments().is_empty());
    assert!(app.ledger.bookings().is_empty());
    assert!(app.store.is_empty());
}

fn hex_of_zeroes() -> String {
    "0".repeat(64)
}

#[tokio::test]
async fn verify_payment_rejects_missing_fields() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/razorpay/verify-payment",
            Some(&app.user),
            Some(json!({ "razorpay_order_id": "order_abc" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn verify_payment_for_unknown_event_is_not_found() {
    let app = TestApp::new();
    let mut body = app.checkout_body("pay_abc");
    body["eventId"] = json!(Uuid::new_v4());

    let (status, _) = app
        .json(
            Method::POST,
            "/api/razorpay/verify-payment",
            Some(&app.user),
            Some(body),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.ledger.payments().is_empty());
}

#[tokio::test]
async fn webhook_then_checkout_share_one_booking() {
    let app = TestApp::new();
    let (status, ack) = app
        .webhook(&app.captured_event("pay_xyz", app.event.id), WEBHOOK_SECRET)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "ok": true }));

    let booking = app.issue_via_checkout("pay_xyz").await;

    let stored = app.ledger.bookings();
    assert_eq!(stored.len(), 1);
    assert_eq!(booking["bookingId"], stored[0].booking_id.as_str());
    assert_eq!(stored[0].amount, Decimal::new(2499, 0));
    assert_eq!(app.ledger.payments().len(), 1);
}

#[tokio::test]
async fn webhook_redelivery_is_acknowledged() {
    let app = TestApp::new();
    let event = app.captured_event("pay_xyz", app.event.id);
    assert_eq!(app.webhook(&event, WEBHOOK_SECRET).await.0, StatusCode::OK);
    assert_eq!(app.webhook(&event, WEBHOOK_SECRET).await.0, StatusCode::OK);

    assert_eq!(app.ledger.bookings().len(), 1);
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn webhook_rejects_bad_signature() {
    let app = TestApp::new();
    let (status, ack) = app
        .webhook(&app.captured_event("pay_xyz", app.event.id), KEY_SECRET)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack, json!({ "ok": false }));
    assert!(app.ledger.payments().is_empty());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn webhook_rejects_missing_signature_header() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/razorpay/webhook")
        .body(Body::from(
            serde_json::to_vec(&app.captured_event("pay_xyz", app.event.id)).unwrap(),
        ))
        .unwrap();

    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.ledger.payments().is_empty());
}

#[tokio::test]
async fn webhook_ignores_other_events() {
    let app = TestApp::new();
    let (status, ack) = app
        .webhook(&json!({ "event": "payment.failed", "payload": {} }), WEBHOOK_SECRET)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["ok"], true);
    assert!(app.ledger.payments().is_empty());
}

#[tokio::test]
async fn webhook_with_incomplete_notes_is_bad_request() {
    let app = TestApp::new();
    let mut event = app.captured_event("pay_xyz", app.event.id);
    event["payload"]["payment"]["entity"]["notes"] = json!([]);

    let (status, ack) = app.webhook(&event, WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["ok"], false);
}

#[tokio::test]
async fn webhook_for_unknown_event_is_not_found() {
    let app = TestApp::new();
    let (status, ack) = app
        .webhook(&app.captured_event("pay_xyz", Uuid::new_v4()), WEBHOOK_SECRET)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(ack["ok"], false);
    assert!(app.ledger.payments().is_empty());
}

#[tokio::test]
async fn admin_verification_admits_once() {
    let app = TestApp::new();
    let booking = app.issue_via_checkout("pay_abc").await;
    let ticket = json!({ "ticketId": booking["ticketId"] });

    let (status, first) = app
        .json(
            Method::POST,
            "/api/admin/verify-ticket",
            Some(&app.admin),
            Some(ticket.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["booking"]["entryStatus"], "USED");
    assert_eq!(first["attendee"]["email"], "asha@example.com");
    assert_eq!(first["event"]["title"], "Orange City Music Festival");

    let (status, second) = app
        .json(
            Method::POST,
            "/api/admin/verify-ticket",
            Some(&app.admin),
            Some(ticket),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], false);
    assert!(second["message"]
        .as_str()
        .unwrap()
        .starts_with("Ticket already used at "));
    assert!(second["usedAt"].is_string());
}

#[tokio::test]
async fn admin_verification_checks_role_and_ticket() {
    let app = TestApp::new();
    let ticket = json!({ "ticketId": "NE-DEADBEEF-0000" });

    let (status, _) = app
        .json(Method::POST, "/api/admin/verify-ticket", None, Some(ticket.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/admin/verify-ticket",
            Some(&app.user),
            Some(ticket.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/admin/verify-ticket",
            Some(&app.admin),
            Some(ticket),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid Ticket ID. Booking not found.");
}

#[tokio::test]
async fn bookings_are_visible_to_owner_and_admin_only() {
    let app = TestApp::new();
    let booking = app.issue_via_checkout("pay_abc").await;
    let uri = format!("/api/booking/{}", booking["bookingId"].as_str().unwrap());

    let (status, body) = app.json(Method::GET, &uri, Some(&app.user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["ticketId"], booking["ticketId"]);

    let (status, _) = app.json(Method::GET, &uri, Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.json(Method::GET, &uri, Some(&app.other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(Method::GET, "/api/booking/BK-000000-0000", Some(&app.user), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_bookings_lists_only_callers_bookings() {
    let app = TestApp::new();
    app.issue_via_checkout("pay_1").await;
    app.issue_via_checkout("pay_2").await;

    let (status, body) = app
        .json(Method::GET, "/api/user/bookings", Some(&app.user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .json(Method::GET, "/api/user/bookings", Some(&app.other), None)
        .await;
    assert!(body["bookings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn ticket_download_streams_stored_pdf() {
    let app = TestApp::new();
    let booking = app.issue_via_checkout("pay_abc").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/api/download/ticket/{booking_id}"))
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", app.token_for(&app.user)),
        )
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        format!("attachment; filename=\"Ticket-{booking_id}.pdf\"").as_str()
    );
    assert!(body.starts_with(b"%PDF-"));

    let (status, _) = app
        .json(
            Method::GET,
            &format!("/api/download/invoice/{booking_id}"),
            Some(&app.other),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_order_prices_event_and_carries_notes() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/razorpay/create-order",
            Some(&app.user),
            Some(json!({ "eventId": app.event.id, "quantity": 2 })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderId"], "order_test_1");
    assert_eq!(body["amount"], 499_800);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["event"]["title"], "Orange City Music Festival");

    let orders = app.gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].notes.user_id, app.user.id.to_string());
    assert_eq!(orders[0].notes.quantity, "2");
    assert!(orders[0].receipt.starts_with("rcpt_"));
}

#[tokio::test]
async fn create_order_validates_quantity_and_event() {
    let app = TestApp::new();
    let (status, _) = app
        .json(
            Method::POST,
            "/api/razorpay/create-order",
            Some(&app.user),
            Some(json!({ "eventId": app.event.id, "quantity": 11 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/razorpay/create-order",
            Some(&app.user),
            Some(json!({ "eventId": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.gateway.orders().is_empty());
}

#[tokio::test]
async fn pay_later_reserves_event_at_current_price() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/booking/pay-later",
            Some(&app.user),
            Some(json!({ "eventId": app.event.id })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Booking requested successfully");
    assert_eq!(body["booking"]["status"], "pending");
    assert_eq!(body["booking"]["paymentStatus"], "pay_later");
    assert_eq!(body["booking"]["paymentMethod"], "cod");
    assert_eq!(body["booking"]["amount"], "2499");
    assert_eq!(body["event"]["title"], "Orange City Music Festival");

    assert_eq!(app.ledger.reservations().len(), 1);
    assert!(app.ledger.payments().is_empty());
    assert!(app.ledger.bookings().is_empty());
    assert!(app.store.is_empty());
    assert!(app.notifier.sent().is_empty());

    let (_, listed) = app
        .json(Method::GET, "/api/user/bookings", Some(&app.user), None)
        .await;
    assert_eq!(listed["reservations"].as_array().unwrap().len(), 1);
    assert!(listed["bookings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn pay_later_custom_booking_has_no_event() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/booking/pay-later",
            Some(&app.user),
            Some(json!({ "customBooking": true })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["booking"]["isCustom"], true);
    assert_eq!(body["booking"]["amount"], "0");
    assert!(body.get("event").is_none());
}

#[tokio::test]
async fn pay_later_rejects_missing_target_unknown_event_and_anonymous() {
    let app = TestApp::new();
    let (status, _) = app
        .json(
            Method::POST,
            "/api/booking/pay-later",
            Some(&app.user),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/booking/pay-later",
            Some(&app.user),
            Some(json!({ "eventId": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/booking/pay-later",
            None,
            Some(json!({ "eventId": app.event.id })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.ledger.reservations().is_empty());
}
