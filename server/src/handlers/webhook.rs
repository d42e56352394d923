//! Razorpay webhook receiver.
//!
//! Answers use the bare `{ok}` shape Razorpay's dashboard expects. Razorpay
//! redelivers on any non-2xx answer; issuance is idempotent, so a redelivery
//! of a payload that can never succeed only costs a lookup.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::services::{IssuanceError, IssueRequest};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
enum WebhookEnvelope {
    #[serde(rename = "payment.captured")]
    PaymentCaptured { payload: CapturedPayload },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
struct CapturedPayload {
    payment: PaymentWrapper,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: String,
    /// Paise. Absent amounts are recorded as zero.
    #[serde(default)]
    amount: i64,
    /// An object of string values, or an empty array when the order had none.
    #[serde(default)]
    notes: Value,
}

impl PaymentEntity {
    fn note(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.notes.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn quantity(&self) -> Option<i32> {
        match self.notes.get("quantity")? {
            Value::String(text) => text.trim().parse().ok(),
            Value::Number(number) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
            _ => None,
        }
    }

    fn into_request(self) -> Result<IssueRequest, &'static str> {
        if self.id.trim().is_empty() || self.order_id.trim().is_empty() {
            return Err("payment id and order id are required");
        }
        let event_id = self
            .note(&["eventId", "event_id"])
            .ok_or("notes.eventId is required")
            .and_then(|id| Uuid::parse_str(id).map_err(|_| "notes.eventId is not a UUID"))?;
        let payer_id = self
            .note(&["userId", "user_id"])
            .ok_or("notes.userId is required")
            .and_then(|id| Uuid::parse_str(id).map_err(|_| "notes.userId is not a UUID"))?;
        let quantity = self.quantity().filter(|q| *q >= 1).unwrap_or(1);

        Ok(IssueRequest {
            payer_id,
            event_id,
            amount: Decimal::new(self.amount, 2),
            payment_id: self.id,
            order_id: self.order_id,
            quantity,
        })
    }
}

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
}

fn ack(status: StatusCode) -> Response {
    let body = Ack {
        ok: status.is_success(),
    };
    (status, Json(body)).into_response()
}

pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = state.signatures.verify_webhook(&body, signature) {
        tracing::warn!(error = %err, "webhook signature rejected");
        return ack(StatusCode::BAD_REQUEST);
    }

    let entity = match serde_json::from_slice::<WebhookEnvelope>(&body) {
        Ok(WebhookEnvelope::PaymentCaptured { payload }) => payload.payment.entity,
        Ok(WebhookEnvelope::Ignored) => {
            tracing::debug!("webhook event ignored");
            return ack(StatusCode::OK);
        }
        Err(err) => {
            tracing::warn!(error = %err, "webhook body rejected");
            return ack(StatusCode::BAD_REQUEST);
        }
    };

    let request = match entity.into_request() {
        Ok(request) => request,
        Err(reason) => {
            tracing::warn!(reason, "webhook payment entity incomplete");
            return ack(StatusCode::BAD_REQUEST);
        }
    };

    let payment_id = request.payment_id.clone();
    match state.pipeline.issue(request).await {
        Ok(issuance) => {
            tracing::info!(
                %payment_id,
                booking_id = %issuance.booking().booking_id,
                fresh = issuance.is_fresh(),
                "webhook payment handled"
            );
            ack(StatusCode::OK)
        }
        Err(err @ IssuanceError::NotFound { .. }) => {
            tracing::warn!(%payment_id, error = %err, "webhook references unknown entity");
            ack(StatusCode::NOT_FOUND)
        }
        Err(err) => {
            tracing::error!(%payment_id, error = %err, "webhook payment not processed");
            ack(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn captured(notes: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_abc",
                        "order_id": "order_abc",
                        "amount": 249900,
                        "currency": "INR",
                        "notes": notes
                    }
                }
            }
        }))
        .unwrap()
    }

    fn entity(body: &[u8]) -> PaymentEntity {
        match serde_json::from_slice::<WebhookEnvelope>(body).unwrap() {
            WebhookEnvelope::PaymentCaptured { payload } => payload.payment.entity,
            WebhookEnvelope::Ignored => panic!("expected payment.captured"),
        }
    }

    #[test]
    fn test_captured_payment_becomes_issue_request() {
        let event_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let body = captured(json!({
            "eventId": event_id.to_string(),
            "userId": user_id.to_string(),
            "quantity": "2"
        }));

        let request = entity(&body).into_request().unwrap();
        assert_eq!(request.event_id, event_id);
        assert_eq!(request.payer_id, user_id);
        assert_eq!(request.amount, Decimal::new(2499, 0));
        assert_eq!(request.quantity, 2);
        assert_eq!(request.payment_id, "pay_abc");
    }

    #[test]
    fn test_snake_case_note_keys_are_accepted() {
        let body = captured(json!({
            "event_id": Uuid::new_v4().to_string(),
            "user_id": Uuid::new_v4().to_string()
        }));
        assert_eq!(entity(&body).into_request().unwrap().quantity, 1);
    }

    #[test]
    fn test_missing_or_invalid_notes_are_rejected() {
        assert!(entity(&captured(json!([]))).into_request().is_err());
        let body = captured(json!({ "eventId": "evt_1", "userId": Uuid::new_v4().to_string() }));
        assert_eq!(
            entity(&body).into_request().unwrap_err(),
            "notes.eventId is not a UUID"
        );
    }

    #[test]
    fn test_missing_amount_defaults_to_zero() {
        let body = serde_json::to_vec(&json!({
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_abc",
                        "order_id": "order_abc",
                        "notes": {
                            "eventId": Uuid::new_v4().to_string(),
                            "userId": Uuid::new_v4().to_string()
                        }
                    }
                }
            }
        }))
        .unwrap();

        let request = entity(&body).into_request().unwrap();
        assert_eq!(request.amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failure_ack_carries_no_error_detail() {
        let response = ack(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"ok":false}"#);
    }

    #[test]
    fn test_other_events_are_ignored() {
        let body = br#"{"event":"order.paid","payload":{}}"#;
        assert!(matches!(
            serde_json::from_slice::<WebhookEnvelope>(body).unwrap(),
            WebhookEnvelope::Ignored
        ));
    }

    #[test]
    fn test_captured_without_entity_is_malformed() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        assert!(serde_json::from_slice::<WebhookEnvelope>(body).is_err());
    }
}
