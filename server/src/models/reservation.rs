use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{BookingStatus, PaymentStatus};

pub const PAY_LATER_METHOD: &str = "cod";

/// A pay-later request. No payment or ticket exists for it until an organiser
/// settles it offline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` for custom bookings, whose event and price are agreed later.
    pub event_id: Option<Uuid>,
    pub is_custom: bool,
    pub amount: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub amount: Decimal,
}

impl NewReservation {
    pub fn is_custom(&self) -> bool {
        self.event_id.is_none()
    }
}
