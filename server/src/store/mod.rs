//! Durable payment and booking ledgers.
//!
//! The [`Ledger`] trait is the only way the rest of the server touches
//! persistent state. Uniqueness on the external payment id, the ticket id and
//! the booking id is enforced by the store itself, and a violation surfaces as
//! [`LedgerError::Duplicate`] so callers can tell a lost race from a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BookingRecord, Event, NewBooking, NewPayment, NewReservation, PaymentRecord, Reservation,
    User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

/// The unique constraint a rejected insert collided with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueKey {
    PaymentPaymentId,
    BookingPaymentId,
    TicketId,
    BookingId,
    Other(String),
}

impl UniqueKey {
    pub fn from_constraint(name: Option<&str>) -> Self {
        match name {
            Some("payments_payment_id_key") => Self::PaymentPaymentId,
            Some("bookings_payment_id_key") => Self::BookingPaymentId,
            Some("bookings_ticket_id_key") => Self::TicketId,
            Some("bookings_booking_id_key") => Self::BookingId,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other("unknown".to_string()),
        }
    }

    /// True when the collision is on the external payment id, i.e. another
    /// invocation already recorded this payment.
    pub fn is_payment_id(&self) -> bool {
        matches!(self, Self::PaymentPaymentId | Self::BookingPaymentId)
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentPaymentId => f.write_str("payments.payment_id"),
            Self::BookingPaymentId => f.write_str("bookings.payment_id"),
            Self::TicketId => f.write_str("bookings.ticket_id"),
            Self::BookingId => f.write_str("bookings.booking_id"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unique constraint violated: {0}")]
    Duplicate(UniqueKey),

    #[error("database error")]
    Database(#[source] sqlx::Error),
}

impl LedgerError {
    pub fn is_duplicate_payment(&self) -> bool {
        matches!(self, Self::Duplicate(key) if key.is_payment_id())
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Duplicate(UniqueKey::from_constraint(db_err.constraint()));
            }
        }
        Self::Database(err)
    }
}

/// Outcome of the conditional NOT_USED -> USED update.
#[derive(Debug, Clone)]
pub enum EntryMark {
    /// This call performed the transition.
    Marked(BookingRecord),
    /// The ticket had already been used; nothing changed.
    AlreadyUsed(BookingRecord),
    /// No booking carries this ticket id.
    Unknown,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, LedgerError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, LedgerError>;

    async fn find_booking_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError>;

    async fn find_booking_by_reference(
        &self,
        booking_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError>;

    async fn find_booking_by_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError>;

    /// Bookings owned by `user_id`, newest first.
    async fn list_bookings_for_user(&self, user_id: Uuid)
        -> Result<Vec<BookingRecord>, LedgerError>;

    /// Records a pay-later request. It stands alone: no payment row and no
    /// artifacts are involved.
    async fn insert_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, LedgerError>;

    /// Pay-later requests made by `user_id`, newest first.
    async fn list_reservations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Reservation>, LedgerError>;

    /// Opens a unit of work. Nothing written through it is visible to other
    /// readers until [`UnitOfWork::commit`] succeeds.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LedgerError>;

    /// Atomically flips `entry_status` from NOT_USED to USED for `ticket_id`.
    async fn mark_entry_used(
        &self,
        ticket_id: &str,
        at: DateTime<Utc>,
    ) -> Result<EntryMark, LedgerError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<PaymentRecord, LedgerError>;

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<BookingRecord, LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}
