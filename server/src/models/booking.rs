use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    NotUsed,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Requested without payment, awaiting offline settlement.
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: Uuid,
    pub booking_id: String,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub payment_ref: Uuid,
    pub payment_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub ticket_id: String,
    pub qr_code_path: String,
    pub qr_code_url: String,
    pub ticket_pdf_path: String,
    pub ticket_pdf_url: String,
    pub invoice_pdf_path: String,
    pub invoice_pdf_url: String,
    pub entry_status: EntryStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Location of an uploaded artifact: its object name inside the bucket and
/// the public URL it is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_id: String,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub payment_ref: Uuid,
    pub payment_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub ticket_id: String,
    pub qr_code: ArtifactRef,
    pub ticket_pdf: ArtifactRef,
    pub invoice_pdf: ArtifactRef,
    pub status: BookingStatus,
}
