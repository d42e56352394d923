use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_quantity, parse_body, require};
use crate::auth::Caller;
use crate::models::BookingRecord;
use crate::services::{CreateOrder, IssueRequest, OrderNotes};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub event_id: Uuid,
    #[serde(default)]
    pub quantity: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderEvent {
    id: Uuid,
    title: String,
    price: Decimal,
    date: DateTime<Utc>,
    location: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreated {
    order_id: String,
    /// Paise.
    amount: i64,
    currency: String,
    event: OrderEvent,
}

pub async fn create_order(
    State(state): State<AppState>,
    Caller(claims): Caller,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(payload)?;
    let quantity = check_quantity(request.quantity)?;

    let event = state
        .ledger
        .find_event(request.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let total = event.price * Decimal::from(quantity);
    let amount_paise = (total * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| AppError::ValidationError("Order amount is out of range".to_string()))?;

    let order = CreateOrder::inr(
        amount_paise,
        &format!("rcpt_{}", Utc::now().timestamp_millis()),
        OrderNotes {
            event_id: event.id.to_string(),
            event_title: event.title.clone(),
            quantity: quantity.to_string(),
            user_id: claims.id.to_string(),
            user_email: claims.email.clone(),
        },
    );
    let created = state.gateway.create_order(&order).await?;

    Ok(success(
        OrderCreated {
            order_id: created.id,
            amount: created.amount,
            currency: created.currency,
            event: OrderEvent {
                id: event.id,
                title: event.title,
                price: event.price,
                date: event.date,
                location: event.location,
            },
        },
        "Order created",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
    pub event_id: Uuid,
    /// Rupees.
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<i32>,
}

#[derive(Serialize)]
struct BookingPayload {
    booking: BookingRecord,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Caller(claims): Caller,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(payload)?;
    require("orderId", &request.order_id)?;
    require("paymentId", &request.payment_id)?;
    require("signature", &request.signature)?;
    let quantity = check_quantity(request.quantity)?;
    let amount = request.amount.unwrap_or(Decimal::ZERO);
    if amount.is_sign_negative() {
        return Err(AppError::ValidationError("amount must not be negative".to_string()));
    }

    state
        .signatures
        .verify_checkout(&request.order_id, &request.payment_id, &request.signature)
        .map_err(|err| {
            tracing::warn!(order_id = %request.order_id, error = %err, "checkout signature rejected");
            AppError::InvalidSignature
        })?;

    let issuance = state
        .pipeline
        .issue(IssueRequest {
            payer_id: claims.id,
            event_id: request.event_id,
            payment_id: request.payment_id,
            order_id: request.order_id,
            amount,
            quantity,
        })
        .await?;

    let message = if issuance.is_fresh() {
        "Payment verified and booking confirmed. Ticket has been emailed."
    } else {
        "Payment already processed. Returning the existing booking."
    };
    Ok(success(
        BookingPayload {
            booking: issuance.into_booking(),
        },
        message,
    ))
}
