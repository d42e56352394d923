use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_body;
use crate::auth::{Caller, Claims};
use crate::models::{BookingRecord, Event, NewReservation, Reservation};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
struct BookingPayload {
    booking: BookingRecord,
}

#[derive(Serialize)]
struct BookingList {
    bookings: Vec<BookingRecord>,
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayLaterRequest {
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub custom_booking: bool,
}

#[derive(Serialize)]
struct ReservationPayload {
    booking: Reservation,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<Event>,
}

/// Loads a booking the caller may see: their own, or any for an admin.
async fn visible_booking(
    state: &AppState,
    claims: &Claims,
    booking_id: &str,
) -> Result<BookingRecord, AppError> {
    let booking = state
        .ledger
        .find_booking_by_reference(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.user_id != claims.id && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "This booking belongs to another user".to_string(),
        ));
    }
    Ok(booking)
}

pub async fn get_booking(
    State(state): State<AppState>,
    Caller(claims): Caller,
    Path(booking_id): Path<String>,
) -> Result<Response, AppError> {
    let booking = visible_booking(&state, &claims, &booking_id).await?;
    Ok(success(BookingPayload { booking }, "Booking retrieved"))
}

pub async fn list_user_bookings(
    State(state): State<AppState>,
    Caller(claims): Caller,
) -> Result<Response, AppError> {
    let bookings = state.ledger.list_bookings_for_user(claims.id).await?;
    let reservations = state.ledger.list_reservations_for_user(claims.id).await?;
    Ok(success(
        BookingList {
            bookings,
            reservations,
        },
        "Bookings retrieved",
    ))
}

/// Reserves a seat to be paid offline. For an event the amount is its current
/// price; a custom booking is priced later.
pub async fn request_pay_later(
    State(state): State<AppState>,
    Caller(claims): Caller,
    payload: Result<Json<PayLaterRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(payload)?;

    let event = match (request.event_id, request.custom_booking) {
        (Some(event_id), _) => Some(
            state
                .ledger
                .find_event(event_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?,
        ),
        (None, true) => None,
        (None, false) => {
            return Err(AppError::ValidationError(
                "eventId or customBooking is required".to_string(),
            ))
        }
    };

    let reservation = state
        .ledger
        .insert_reservation(NewReservation {
            user_id: claims.id,
            event_id: event.as_ref().map(|e| e.id),
            amount: event.as_ref().map_or(Decimal::ZERO, |e| e.price),
        })
        .await?;
    tracing::info!(
        reservation_id = %reservation.id,
        user_id = %claims.id,
        custom = reservation.is_custom,
        "pay-later booking requested"
    );

    Ok(success(
        ReservationPayload {
            booking: reservation,
            event,
        },
        "Booking requested successfully",
    ))
}

#[derive(Debug, Clone, Copy)]
enum Document {
    Ticket,
    Invoice,
}

impl Document {
    fn label(self) -> &'static str {
        match self {
            Self::Ticket => "Ticket",
            Self::Invoice => "Invoice",
        }
    }
}

async fn download(
    state: &AppState,
    claims: &Claims,
    booking_id: &str,
    document: Document,
) -> Result<Response, AppError> {
    let booking = visible_booking(state, claims, booking_id).await?;
    let (bucket, name) = match document {
        Document::Ticket => (&state.buckets.tickets, &booking.ticket_pdf_path),
        Document::Invoice => (&state.buckets.invoices, &booking.invoice_pdf_path),
    };
    let bytes = state.store.get(bucket, name).await?;

    let disposition = format!(
        "attachment; filename=\"{}-{}.pdf\"",
        document.label(),
        booking.booking_id
    );
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn download_ticket(
    State(state): State<AppState>,
    Caller(claims): Caller,
    Path(booking_id): Path<String>,
) -> Result<Response, AppError> {
    download(&state, &claims, &booking_id, Document::Ticket).await
}

pub async fn download_invoice(
    State(state): State<AppState>,
    Caller(claims): Caller,
    Path(booking_id): Path<String>,
) -> Result<Response, AppError> {
    download(&state, &claims, &booking_id, Document::Invoice).await
}
