//! Venue entry verification.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{BookingRecord, Event, User};
use crate::store::{EntryMark, Ledger, LedgerError};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("no booking carries ticket {0}")]
    NotFound(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone)]
pub enum EntryOutcome {
    /// This scan performed the NOT_USED -> USED transition.
    Admitted {
        booking: BookingRecord,
        attendee: Option<User>,
        event: Option<Event>,
    },
    /// The ticket was already used; `booking.used_at` says when.
    AlreadyUsed { booking: BookingRecord },
}

#[derive(Clone)]
pub struct EntryVerifier {
    ledger: Arc<dyn Ledger>,
}

impl EntryVerifier {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn verify(&self, ticket_id: &str) -> Result<EntryOutcome, EntryError> {
        let ticket_id = ticket_id.trim();
        match self.ledger.mark_entry_used(ticket_id, Utc::now()).await? {
            EntryMark::Marked(booking) => {
                let attendee = self.ledger.find_user(booking.user_id).await?;
                let event = self.ledger.find_event(booking.event_id).await?;
                tracing::info!(ticket_id, booking_id = %booking.booking_id, "ticket admitted");
                Ok(EntryOutcome::Admitted {
                    booking,
                    attendee,
                    event,
                })
            }
            EntryMark::AlreadyUsed(booking) => {
                tracing::warn!(ticket_id, used_at = ?booking.used_at, "ticket scanned again");
                Ok(EntryOutcome::AlreadyUsed { booking })
            }
            EntryMark::Unknown => Err(EntryError::NotFound(ticket_id.to_string())),
        }
    }
}
