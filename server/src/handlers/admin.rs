use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_body, require};
use crate::auth::Admin;
use crate::models::BookingRecord;
use crate::services::{EntryError, EntryOutcome};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{rejected, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTicketRequest {
    pub ticket_id: String,
}

#[derive(Serialize)]
struct Attendee {
    name: String,
    email: String,
}

#[derive(Serialize)]
struct EventSummary {
    title: String,
    date: DateTime<Utc>,
    time: Option<String>,
    location: String,
}

#[derive(Serialize)]
struct Admitted {
    booking: BookingRecord,
    attendee: Option<Attendee>,
    event: Option<EventSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyUsed {
    used_at: Option<DateTime<Utc>>,
    booking: BookingRecord,
}

#[derive(Serialize)]
struct Empty {}

pub async fn verify_ticket(
    State(state): State<AppState>,
    Admin(admin): Admin,
    payload: Result<Json<VerifyTicketRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(payload)?;
    require("ticketId", &request.ticket_id)?;

    let outcome = match state.entry.verify(&request.ticket_id).await {
        Ok(outcome) => outcome,
        Err(EntryError::NotFound(ticket_id)) => {
            tracing::warn!(%ticket_id, admin = %admin.email, "unknown ticket scanned");
            return Ok(rejected(
                Empty {},
                "Invalid Ticket ID. Booking not found.",
                StatusCode::NOT_FOUND,
            ));
        }
        Err(err) => return Err(err.into()),
    };

    match outcome {
        EntryOutcome::Admitted {
            booking,
            attendee,
            event,
        } => Ok(success(
            Admitted {
                booking,
                attendee: attendee.map(|user| Attendee {
                    name: user.name,
                    email: user.email,
                }),
                event: event.map(|event| EventSummary {
                    title: event.title,
                    date: event.date,
                    time: event.time,
                    location: event.location,
                }),
            },
            "Entry verified successfully! Welcome to the event.",
        )),
        EntryOutcome::AlreadyUsed { booking } => {
            let used_at = booking.used_at;
            let when = used_at
                .map(|at| at.format("%d %b %Y, %I:%M %p UTC").to_string())
                .unwrap_or_else(|| "an earlier scan".to_string());
            Ok(rejected(
                AlreadyUsed { used_at, booking },
                format!("Ticket already used at {when}"),
                StatusCode::OK,
            ))
        }
    }
}
