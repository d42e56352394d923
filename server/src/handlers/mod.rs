use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod admin;
pub mod bookings;
pub mod payments;
pub mod webhook;

pub const MAX_QUANTITY: i32 = 10;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "nagpur-events-api",
    };

    success(payload, "Health check successful")
}

/// Turns a JSON extraction failure into a 400 in the API error envelope.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

pub(crate) fn check_quantity(quantity: Option<i32>) -> Result<i32, AppError> {
    let quantity = quantity.unwrap_or(1);
    if !(1..=MAX_QUANTITY).contains(&quantity) {
        return Err(AppError::ValidationError(format!(
            "Quantity must be between 1 and {MAX_QUANTITY}"
        )));
    }
    Ok(quantity)
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{field} is required")));
    }
    Ok(())
}
